//! In-process token reuse with singleflight refresh.
//!
//! [`TokenCache`] keeps the one current [`AccessToken`] for an identity behind a read
//! lock. Callers share it until it enters the expiry skew window; the first caller to
//! miss takes an async guard and performs the exchange while everyone else piggy-backs
//! on the landed result. [`TokenCache::invalidate`] drops the slot so the next call
//! exchanges unconditionally, which is the recovery move when a resource server answers
//! 401 despite an unexpired token.

mod metrics;

pub use metrics::CacheMetrics;

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	exchange::TokenExchanger,
	http::TokenHttpClient,
	identity::ClientIdentity,
	obs::{self, AuthOutcome, AuthSpan, AuthStage},
	retry::RetryPolicy,
};

/// Skew-aware cache in front of a [`TokenExchanger`].
pub struct TokenCache<C>
where
	C: TokenHttpClient + ?Sized,
{
	exchanger: TokenExchanger<C>,
	retry_policy: RetryPolicy,
	skew: Duration,
	slot: RwLock<Option<AccessToken>>,
	refresh_guard: AsyncMutex<()>,
	metrics: CacheMetrics,
}
impl<C> TokenCache<C>
where
	C: TokenHttpClient + ?Sized,
{
	/// Tokens are treated as expired this long before their `expires_at`.
	pub const DEFAULT_SKEW: Duration = Duration::seconds(30);

	/// Creates an empty cache over the provided exchanger.
	pub fn new(exchanger: TokenExchanger<C>) -> Self {
		Self {
			exchanger,
			retry_policy: RetryPolicy::default(),
			skew: Self::DEFAULT_SKEW,
			slot: RwLock::new(None),
			refresh_guard: AsyncMutex::new(()),
			metrics: CacheMetrics::default(),
		}
	}

	/// Sets the expiry skew.
	pub fn with_skew(mut self, skew: Duration) -> Self {
		self.skew = skew;

		self
	}

	/// Sets the retry policy the refresh path applies.
	pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
		self.retry_policy = retry_policy;

		self
	}

	/// Identity this cache authenticates as.
	pub fn identity(&self) -> &ClientIdentity {
		self.exchanger.identity()
	}

	/// Expiry skew in effect.
	pub fn skew(&self) -> Duration {
		self.skew
	}

	/// Counters describing cache traffic so far.
	pub fn metrics(&self) -> &CacheMetrics {
		&self.metrics
	}

	/// Returns a token valid for at least the configured skew.
	///
	/// Fresh cached tokens are cloned out under a read lock. On a miss, an async guard
	/// serializes the refresh; waiters re-check the slot after acquiring it, so any
	/// number of concurrent cold calls produce exactly one exchange.
	pub async fn get_token(&self) -> Result<AccessToken> {
		const STAGE: AuthStage = AuthStage::Acquire;

		let span = AuthSpan::new(STAGE, "get_token");

		obs::record_auth_outcome(STAGE, AuthOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.metrics.record_request();

				if let Some(token) = self.read_fresh(OffsetDateTime::now_utc()) {
					self.metrics.record_hit();

					return Ok(token);
				}

				let _singleflight = self.refresh_guard.lock().await;

				// A waiter may find the leader's token already landed.
				if let Some(token) = self.read_fresh(OffsetDateTime::now_utc()) {
					self.metrics.record_hit();

					return Ok(token);
				}

				self.refresh_locked().await
			})
			.await;

		match &result {
			Ok(_) => obs::record_auth_outcome(STAGE, AuthOutcome::Success),
			Err(_) => obs::record_auth_outcome(STAGE, AuthOutcome::Failure),
		}

		result
	}

	/// Drops the cached token; the next [`Self::get_token`] exchanges unconditionally.
	pub fn invalidate(&self) {
		self.metrics.record_invalidation();

		*self.slot.write() = None;
	}

	/// Runs `op` with a bearer token, retrying once on a reported 401.
	///
	/// When the closure's error answers [`BearerFailure::is_unauthorized`], the cached
	/// token is assumed revoked server-side: the slot is invalidated and `op` runs once
	/// more with a freshly exchanged token. Any other downstream error passes through.
	pub async fn with_bearer<T, E, F, Fut>(&self, mut op: F) -> Result<T, BearerCallError<E>>
	where
		E: 'static + StdError + BearerFailure,
		F: FnMut(AccessToken) -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		let token = self.get_token().await?;

		match op(token).await {
			Ok(value) => Ok(value),
			Err(err) if err.is_unauthorized() => {
				self.invalidate();

				let token = self.get_token().await?;

				op(token).await.map_err(BearerCallError::Downstream)
			},
			Err(err) => Err(BearerCallError::Downstream(err)),
		}
	}

	fn read_fresh(&self, now: OffsetDateTime) -> Option<AccessToken> {
		self.slot.read().as_ref().filter(|token| token.is_fresh_at(now, self.skew)).cloned()
	}

	// Caller must hold `refresh_guard`.
	async fn refresh_locked(&self) -> Result<AccessToken> {
		const STAGE: AuthStage = AuthStage::Refresh;

		let span = AuthSpan::new(STAGE, "refresh");

		obs::record_auth_outcome(STAGE, AuthOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.metrics.record_exchange();

				let token = self
					.exchanger
					.exchange_with_retry(&self.retry_policy)
					.await
					.inspect_err(|_| self.metrics.record_failure())?;

				*self.slot.write() = Some(token.clone());

				Ok(token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_auth_outcome(STAGE, AuthOutcome::Success),
			Err(_) => obs::record_auth_outcome(STAGE, AuthOutcome::Failure),
		}

		result
	}
}
impl<C> Debug for TokenCache<C>
where
	C: TokenHttpClient + ?Sized,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache")
			.field("identity", self.exchanger.identity())
			.field("skew", &self.skew)
			.field("retry_policy", &self.retry_policy)
			.finish()
	}
}

/// Hook through which downstream errors report an HTTP 401.
pub trait BearerFailure {
	/// True when the downstream call was rejected as unauthorized.
	fn is_unauthorized(&self) -> bool;
}

/// Error surface of [`TokenCache::with_bearer`].
#[derive(Debug, ThisError)]
pub enum BearerCallError<E>
where
	E: 'static + StdError,
{
	/// Acquiring a bearer token failed.
	#[error(transparent)]
	Token(#[from] Error),
	/// The downstream call failed, for unauthorized errors after one forced refresh.
	#[error(transparent)]
	Downstream(E),
}
