//! Bounded exponential backoff with jitter for transient token endpoint failures.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Retry budget and pacing applied by [`TokenExchanger::exchange_with_retry`](crate::exchange::TokenExchanger::exchange_with_retry).
///
/// Delays double per attempt from [`Self::DEFAULT_BASE_DELAY`] up to
/// [`Self::DEFAULT_MAX_DELAY`], with half-to-full jitter so synchronized clients
/// spread out. An upstream `Retry-After` hint wins whenever it asks for a longer
/// pause than the computed backoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	max_attempts: u32,
	base_delay: Duration,
	max_delay: Duration,
}
impl RetryPolicy {
	/// Attempts made before the last error surfaces.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Backoff before the second attempt.
	pub const DEFAULT_BASE_DELAY: Duration = Duration::milliseconds(500);
	/// Upper bound on any computed backoff.
	pub const DEFAULT_MAX_DELAY: Duration = Duration::seconds(8);

	/// Creates the default policy.
	pub fn new() -> Self {
		Self {
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			base_delay: Self::DEFAULT_BASE_DELAY,
			max_delay: Self::DEFAULT_MAX_DELAY,
		}
	}

	/// Sets the attempt budget; values below `1` are raised to `1`.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);

		self
	}

	/// Sets the backoff applied before the second attempt.
	pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
		self.base_delay = base_delay;

		self
	}

	/// Sets the cap no computed backoff exceeds.
	pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
		self.max_delay = max_delay;

		self
	}

	/// Attempt budget.
	pub fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	/// Pause to take after failed attempt number `attempt` (1-based).
	///
	/// An upstream `retry_after` hint overrides the jittered backoff when it is longer;
	/// it is never used to shorten the pause.
	pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> std::time::Duration {
		// Clamped so the multiplier stays within `i32`.
		let shift = attempt.saturating_sub(1).min(16);
		let backoff = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
		let jittered = jitter(backoff);
		let chosen = match retry_after {
			Some(hint) if hint > jittered => hint,
			_ => jittered,
		};

		chosen.try_into().unwrap_or(std::time::Duration::ZERO)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new()
	}
}

fn jitter(delay: Duration) -> Duration {
	let millis = delay.whole_milliseconds().max(0) as u64;

	if millis == 0 {
		return Duration::ZERO;
	}

	Duration::milliseconds(rand::rng().random_range(millis / 2..=millis) as i64)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn first_retry_stays_near_the_base_delay() {
		let policy = RetryPolicy::new();

		for _ in 0..32 {
			let delay = policy.delay_for(1, None);

			assert!(delay >= std::time::Duration::from_millis(250));
			assert!(delay <= std::time::Duration::from_millis(500));
		}
	}

	#[test]
	fn backoff_doubles_then_hits_the_cap() {
		let policy = RetryPolicy::new();

		for _ in 0..32 {
			// Attempt 4 backs off by 4s; attempt 40 would overflow without the cap.
			assert!(policy.delay_for(4, None) <= std::time::Duration::from_secs(4));
			assert!(policy.delay_for(40, None) <= std::time::Duration::from_secs(8));
			assert!(policy.delay_for(40, None) >= std::time::Duration::from_secs(4));
		}
	}

	#[test]
	fn longer_upstream_hints_win() {
		let policy = RetryPolicy::new();

		assert_eq!(
			policy.delay_for(1, Some(Duration::seconds(30))),
			std::time::Duration::from_secs(30)
		);
	}

	#[test]
	fn shorter_upstream_hints_are_ignored() {
		let policy = RetryPolicy::new();

		// The jittered floor for a capped attempt is 4s, far above the 1ms hint.
		assert!(
			policy.delay_for(40, Some(Duration::milliseconds(1)))
				>= std::time::Duration::from_secs(4)
		);
	}

	#[test]
	fn attempt_budget_never_drops_below_one() {
		assert_eq!(RetryPolicy::new().with_max_attempts(0).max_attempts(), 1);
		assert_eq!(RetryPolicy::new().with_max_attempts(5).max_attempts(), 5);
	}

	#[test]
	fn zero_base_delay_yields_zero_pause() {
		let policy = RetryPolicy::new().with_base_delay(Duration::ZERO);

		assert_eq!(policy.delay_for(1, None), std::time::Duration::ZERO);
	}
}
