//! Optional observability helpers for token acquisition.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `backend_auth.token` with the `stage`
//!   (acquire/exchange/refresh) and `op` (call site) fields.
//! - Enable `metrics` to increment the `backend_auth_token_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.
//!
//! Neither layer ever records assertion or token values; identifiers and stages only.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Token acquisition stages observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthStage {
	/// Cache-level token lookup serving callers.
	Acquire,
	/// A single signed-assertion exchange against the token endpoint.
	Exchange,
	/// Cache miss path driving a fresh exchange under the single-flight guard.
	Refresh,
}
impl AuthStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthStage::Acquire => "acquire",
			AuthStage::Exchange => "exchange",
			AuthStage::Refresh => "refresh",
		}
	}
}
impl Display for AuthStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthOutcome {
	/// Entry to an acquisition stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl AuthOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AuthOutcome::Attempt => "attempt",
			AuthOutcome::Success => "success",
			AuthOutcome::Failure => "failure",
		}
	}
}
impl Display for AuthOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
