//! Issued access token model with skew-aware freshness helpers.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Errors produced by [`AccessTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum AccessTokenBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Immutable record describing an access token issued by the token endpoint.
///
/// Expiry is tracked as an absolute instant derived from the response's `expires_in` at receipt
/// time, so freshness checks stay correct regardless of when the record is inspected.
#[derive(Clone)]
pub struct AccessToken {
	/// Bearer value; callers must avoid logging it.
	pub value: TokenSecret,
	/// Token type reported by the endpoint, usually `bearer`.
	pub token_type: String,
	/// Scopes granted by the endpoint, when echoed in the response.
	pub scope: Option<ScopeSet>,
	/// Instant the token response was received.
	pub issued_at: OffsetDateTime,
	/// Expiry instant derived from issued_at plus expires_in.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Returns a builder for constructing token records.
	pub fn builder() -> AccessTokenBuilder {
		AccessTokenBuilder::new()
	}

	/// Returns `true` if the token is still usable at `instant`, treating anything within
	/// `skew` of the expiry instant as already expired.
	///
	/// The boundary itself counts as expired, so a token never survives into the skew window.
	pub fn is_fresh_at(&self, instant: OffsetDateTime, skew: Duration) -> bool {
		instant < self.expires_at - skew
	}

	/// Convenience helper that checks freshness against the current UTC instant.
	pub fn is_fresh(&self, skew: Duration) -> bool {
		self.is_fresh_at(OffsetDateTime::now_utc(), skew)
	}

	/// Remaining validity at `instant`; negative once the expiry instant has passed.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}

	/// Total validity window granted by the endpoint.
	pub fn lifetime(&self) -> Duration {
		self.expires_at - self.issued_at
	}

	/// Renders the `Authorization` header value for this token.
	pub fn bearer_header(&self) -> String {
		format!("Bearer {}", self.value.expose())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AccessToken")
			.field("value", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`AccessToken`].
#[derive(Clone, Debug)]
pub struct AccessTokenBuilder {
	value: Option<TokenSecret>,
	token_type: Option<String>,
	scope: Option<ScopeSet>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl AccessTokenBuilder {
	fn new() -> Self {
		Self {
			value: None,
			token_type: None,
			scope: None,
			issued_at: None,
			expires_at: None,
			expires_in: None,
		}
	}

	/// Provides the bearer token value.
	pub fn value(mut self, token: impl Into<String>) -> Self {
		self.value = Some(TokenSecret::new(token));

		self
	}

	/// Sets the reported token type; defaults to `bearer` when unset.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Records the scopes echoed by the endpoint.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = Some(scope);

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Convenience helper that stamps `issued_at` with the current clock.
	pub fn issued_now(self) -> Self {
		self.issued_at(OffsetDateTime::now_utc())
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces an [`AccessToken`].
	pub fn build(self) -> Result<AccessToken, AccessTokenBuilderError> {
		let value = self.value.ok_or(AccessTokenBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(AccessTokenBuilderError::MissingExpiry),
		};

		Ok(AccessToken {
			value,
			token_type: self.token_type.unwrap_or_else(|| "bearer".to_owned()),
			scope: self.scope,
			issued_at,
			expires_at,
		})
	}
}
