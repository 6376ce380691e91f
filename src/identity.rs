//! Backend client identity: registration data (client id, token endpoint, scopes) plus the
//! private key used to sign client assertions.
//!
//! `key` loads PEM material into signing keys and derives log-safe fingerprints. `builder`
//! validates the assembled identity (HTTPS-only endpoint, bounded assertion lifetime) before
//! any assertion is ever signed with it.

/// Builder API for assembling client identities.
pub mod builder;
/// Key material loading, algorithm selection, and fingerprinting.
pub mod key;

pub use builder::*;
pub use key::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet},
	error::ConfigError,
};

/// Environment variable names consumed by [`ClientIdentity::from_env`].
pub mod env {
	/// OAuth client identifier.
	pub const CLIENT_ID: &str = "SMART_CLIENT_ID";
	/// JWK `kid` hint advertised in assertion headers.
	pub const KEY_ID: &str = "SMART_KEY_ID";
	/// Inline PEM-encoded private key; takes precedence over the file variant.
	pub const PRIVATE_KEY: &str = "SMART_PRIVATE_KEY";
	/// Path to a PEM-encoded private key file.
	pub const PRIVATE_KEY_FILE: &str = "SMART_PRIVATE_KEY_FILE";
	/// Space-delimited scope list.
	pub const SCOPE: &str = "SMART_SCOPE";
	/// Signing algorithm label (RS384 or ES384); defaults to RS384.
	pub const SIGNING_ALGORITHM: &str = "SMART_SIGNING_ALGORITHM";
	/// Token endpoint URL.
	pub const TOKEN_ENDPOINT: &str = "SMART_TOKEN_ENDPOINT";
}

/// Immutable, validated identity of a registered backend client.
#[derive(Clone, Debug)]
pub struct ClientIdentity {
	/// Client identifier; doubles as the assertion `iss` and `sub` claims.
	pub client_id: ClientId,
	/// Token endpoint the assertion is addressed to (`aud` claim).
	pub token_endpoint: Url,
	/// Private key and algorithm used to sign assertions.
	pub signing_key: SigningKey,
	/// Scopes requested during exchanges; empty sets omit the `scope` parameter.
	pub scope: ScopeSet,
	/// Validity window stamped into each assertion.
	pub assertion_lifetime: Duration,
}
impl ClientIdentity {
	/// Default assertion validity window.
	pub const DEFAULT_ASSERTION_LIFETIME: Duration = Duration::seconds(60);
	/// Upper bound accepted for assertion lifetimes, per SMART Backend Services guidance.
	pub const MAX_ASSERTION_LIFETIME: Duration = Duration::seconds(300);

	/// Creates a new builder seeded with the provided client identifier.
	///
	/// The identifier is validated when the builder is finalized.
	pub fn builder(client_id: impl Into<String>) -> ClientIdentityBuilder {
		ClientIdentityBuilder::new(client_id)
	}

	/// Assembles an identity from `SMART_*` environment variables.
	///
	/// `SMART_CLIENT_ID`, `SMART_TOKEN_ENDPOINT`, and one of `SMART_PRIVATE_KEY` or
	/// `SMART_PRIVATE_KEY_FILE` are required; the remaining variables are optional.
	pub fn from_env() -> Result<Self, ConfigError> {
		let client_id = require_env(env::CLIENT_ID)?;
		let endpoint = Url::parse(&require_env(env::TOKEN_ENDPOINT)?)
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;
		let algorithm = match optional_env(env::SIGNING_ALGORITHM) {
			Some(label) => label.parse()?,
			None => SigningAlgorithm::Rs384,
		};
		let pem = if let Some(pem) = optional_env(env::PRIVATE_KEY) {
			pem
		} else if let Some(path) = optional_env(env::PRIVATE_KEY_FILE) {
			std::fs::read_to_string(&path)
				.map_err(|source| ConfigError::KeyFile { path, source })?
		} else {
			return Err(ConfigError::MissingEnv { name: env::PRIVATE_KEY });
		};
		let mut builder =
			Self::builder(client_id).token_endpoint(endpoint).private_key_pem(&pem, algorithm);

		if let Some(scope) = optional_env(env::SCOPE) {
			builder = builder.scope(scope.split_whitespace());
		}
		if let Some(kid) = optional_env(env::KEY_ID) {
			builder = builder.key_id(kid);
		}

		builder.build()
	}
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
	optional_env(name).ok_or(ConfigError::MissingEnv { name })
}

fn optional_env(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
