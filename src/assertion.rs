//! Signed JWT client assertions for the backend services grant.
//!
//! Every exchange builds a fresh assertion: `iss` and `sub` carry the client id, `aud` the
//! token endpoint, `jti` a random UUID, and the `iat`/`exp` pair a short validity window.
//! Assertions are single-use by construction; nothing in the crate ever re-sends one.

// crates.io
use jsonwebtoken::Header;
use uuid::Uuid;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ClockError, ConfigError},
	identity::ClientIdentity,
};

/// Claim set stamped into each client assertion.
///
/// `nbf` is deliberately absent: the assertion is valid from `iat`, and omitting `nbf` avoids
/// spurious rejections from endpoints with modest clock drift.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Issuer; the client id for this grant profile.
	pub iss: String,
	/// Subject; identical to `iss` for this grant profile.
	pub sub: String,
	/// Audience; the token endpoint URL the assertion is addressed to.
	pub aud: String,
	/// Unique token identifier guarding against replay.
	pub jti: String,
	/// Issued-at instant as a Unix timestamp.
	pub iat: i64,
	/// Expiry instant as a Unix timestamp.
	pub exp: i64,
}

/// A signed, ready-to-send client assertion plus the metadata needed to reason about it.
#[derive(Clone, Debug)]
pub struct Assertion {
	/// Compact JWS; callers must avoid logging it.
	pub jwt: TokenSecret,
	/// The `jti` claim embedded in the payload.
	pub jti: String,
	/// Instant the assertion was stamped.
	pub issued_at: OffsetDateTime,
	/// Instant the assertion stops being accepted.
	pub expires_at: OffsetDateTime,
}
impl Assertion {
	/// Validity window of this assertion.
	pub fn lifetime(&self) -> Duration {
		self.expires_at - self.issued_at
	}
}

/// Builds signed client assertions from a validated [`ClientIdentity`].
pub struct AssertionBuilder;
impl AssertionBuilder {
	/// Builds and signs an assertion stamped at `now`.
	///
	/// Fails with a clock error when `now` precedes the Unix epoch or the expiry instant is
	/// unrepresentable, and with a config error when signing itself fails.
	pub fn build(identity: &ClientIdentity, now: OffsetDateTime) -> Result<Assertion> {
		let timestamp = now.unix_timestamp();

		if timestamp <= 0 {
			return Err(ClockError::NonPositiveTimestamp { timestamp }.into());
		}

		let expires_at = now
			.checked_add(identity.assertion_lifetime)
			.ok_or(ClockError::ExpiryOutOfRange)?;
		let jti = Uuid::new_v4().to_string();
		let claims = AssertionClaims {
			iss: identity.client_id.to_string(),
			sub: identity.client_id.to_string(),
			aud: identity.token_endpoint.as_str().to_owned(),
			jti: jti.clone(),
			iat: timestamp,
			exp: expires_at.unix_timestamp(),
		};
		let mut header = Header::new(identity.signing_key.algorithm().as_jwt_algorithm());

		header.kid = identity.signing_key.key_id().map(|kid| kid.to_string());

		let jwt = jsonwebtoken::encode(&header, &claims, identity.signing_key.encoding_key())
			.map_err(|source| ConfigError::Sign { source })?;

		Ok(Assertion { jwt: TokenSecret::new(jwt), jti, issued_at: now, expires_at })
	}

	/// Convenience helper that stamps the assertion with the current UTC instant.
	pub fn build_now(identity: &ClientIdentity) -> Result<Assertion> {
		Self::build(identity, OffsetDateTime::now_utc())
	}
}
