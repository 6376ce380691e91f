//! Crate-level error types shared across assertion building, token exchange, and caching.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or credential problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// System clock produced an unusable instant.
	#[error(transparent)]
	Clock(#[from] ClockError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Network(#[from] NetworkError),
	/// Token endpoint violated the expected wire contract.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),

	/// Token endpoint rejected the client assertion with a 4xx status.
	#[error("Token endpoint rejected the client assertion ({status}): {reason}.")]
	AuthRejected {
		/// HTTP status code of the rejection.
		status: u16,
		/// OAuth `error`/`error_description` pair when present, otherwise a body preview.
		reason: String,
	},
	/// Token endpoint failed with a 5xx status.
	#[error("Token endpoint failed with status {status}.")]
	ServerError {
		/// HTTP status code of the failure.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl Error {
	/// Classifies this error into a [`RetryDisposition`] so callers and the retry driver agree on
	/// what a retry may accomplish.
	pub fn retry_disposition(&self) -> RetryDisposition {
		match self {
			Self::Config(_) | Self::Clock(_) | Self::Protocol(_) => RetryDisposition::Never,
			Self::Network(_) | Self::ServerError { .. } => RetryDisposition::Backoff,
			Self::AuthRejected { .. } => RetryDisposition::FreshAssertion,
		}
	}

	/// Upstream Retry-After hint carried by this error, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::ServerError { retry_after, .. } => *retry_after,
			_ => None,
		}
	}
}

/// What retrying a failed exchange may accomplish.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryDisposition {
	/// Retrying cannot help; surface the error to the caller.
	Never,
	/// Retrying may help, but only with a freshly signed assertion.
	FreshAssertion,
	/// Retrying after a backoff delay may help.
	Backoff,
}

/// Configuration and validation failures raised while assembling credentials.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Client identifier failed validation.
	#[error(transparent)]
	ClientId(#[from] crate::auth::IdentifierError),
	/// Key identifier failed validation.
	#[error("Key identifier is invalid.")]
	KeyId(#[source] crate::auth::IdentifierError),
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),

	/// Identity builder was finalized without a token endpoint.
	#[error("Client identity is missing a token endpoint.")]
	MissingTokenEndpoint,
	/// Identity builder was finalized without a signing key.
	#[error("Client identity is missing a signing key.")]
	MissingSigningKey,
	/// Token endpoint URL does not use HTTPS.
	#[error("Token endpoint `{endpoint}` must use HTTPS.")]
	InsecureEndpoint {
		/// Offending endpoint URL.
		endpoint: String,
	},
	/// Token endpoint URL cannot be parsed.
	#[error("Token endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Assertion lifetime falls outside the accepted range.
	#[error("Assertion lifetime of {requested} is outside the accepted range.")]
	AssertionLifetimeOutOfRange {
		/// Requested lifetime.
		requested: Duration,
	},
	/// Private key PEM could not be parsed for the selected algorithm.
	#[error("Private key could not be parsed as {algorithm} material.")]
	Key {
		/// Algorithm the key was expected to serve.
		algorithm: crate::identity::SigningAlgorithm,
		/// Underlying parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Assertion signing failed.
	#[error("Client assertion could not be signed.")]
	Sign {
		/// Underlying signing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Signing algorithm label is not recognized.
	#[error("Unknown signing algorithm `{value}`; expected RS384 or ES384.")]
	UnknownAlgorithm {
		/// Offending label.
		value: String,
	},
	/// Required environment variable is missing or empty.
	#[error("Environment variable `{name}` is missing or empty.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// Private key file could not be read.
	#[error("Private key file `{path}` could not be read.")]
	KeyFile {
		/// Offending path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// System clock failures surfaced while stamping assertion claims.
#[derive(Debug, ThisError)]
pub enum ClockError {
	/// Clock reported a non-positive Unix timestamp.
	#[error("System clock reported a non-positive Unix timestamp ({timestamp}).")]
	NonPositiveTimestamp {
		/// Reported timestamp.
		timestamp: i64,
	},
	/// Expiry instant cannot be represented.
	#[error("Computed expiry instant is outside the representable range.")]
	ExpiryOutOfRange,
}

/// Transport-level failures (network, IO); retryable with backoff.
#[derive(Debug, ThisError)]
pub enum NetworkError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Transport {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Exchange timed out before the endpoint responded.
	#[error("Token exchange timed out before the endpoint responded.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl NetworkError {
	/// Wraps a transport-specific network error.
	pub fn transport(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Transport { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for NetworkError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::transport(e) }
	}
}

/// Wire contract violations in otherwise successful token endpoint responses.
#[derive(Debug, ThisError)]
pub enum ProtocolError {
	/// Successful response carried malformed JSON.
	#[error("Token endpoint returned malformed JSON.")]
	Json {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Successful response carried an empty `access_token`.
	#[error("Token endpoint response carries an empty access_token.")]
	EmptyAccessToken,
	/// Successful response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned a non-positive `expires_in`.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint echoed a scope value that cannot be normalized.
	#[error("Token endpoint echoed an invalid scope value.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token endpoint answered with a status outside the expected 2xx/4xx/5xx classes.
	#[error("Token endpoint answered with unexpected status {status}.")]
	UnexpectedStatus {
		/// Offending status code.
		status: u16,
	},
}
