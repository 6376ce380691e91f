//! Transport primitives for token endpoint exchanges.
//!
//! [`TokenHttpClient`] is the crate's only dependency on an HTTP stack. Implementations
//! submit a single form-encoded POST and hand back the raw status, body, and Retry-After
//! hint as a [`TokenWireResponse`]; classification into the error taxonomy happens in the
//! exchange layer so custom transports never re-implement it.

// std
use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::NetworkError};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`TokenHttpClient::post_form`].
pub type TokenHttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TokenWireResponse, NetworkError>> + 'a + Send>>;

/// Form fields submitted to the token endpoint, in submission order.
pub type TokenRequestForm = Vec<(&'static str, String)>;

/// Abstraction over HTTP transports capable of executing token exchanges.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can sit behind the
/// cache and serve concurrent callers, and the returned future must be `Send` so exchange
/// futures can hop executors. Transport-level failures map into [`NetworkError`]; every HTTP
/// status, including 4xx and 5xx, is surfaced as an `Ok` wire response for the exchange layer
/// to classify.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Submits `form` to `endpoint` as an `application/x-www-form-urlencoded` POST.
	///
	/// Implementations must not follow redirects; token endpoints return results directly
	/// instead of delegating to another URI.
	fn post_form(&self, endpoint: Url, form: TokenRequestForm) -> TokenHttpFuture<'_>;
}

/// Raw result of a token endpoint POST before classification.
#[derive(Clone)]
pub struct TokenWireResponse {
	/// HTTP status code returned by the token endpoint.
	pub status: u16,
	/// Response body as text; may be empty.
	pub body: String,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl Debug for TokenWireResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		// Successful bodies carry bearer material, so only the length is printed.
		f.debug_struct("TokenWireResponse")
			.field("status", &self.status)
			.field("body", &format_args!("<{} bytes>", self.body.len()))
			.field("retry_after", &self.retry_after)
			.finish()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Default per-request timeout applied by [`new`](Self::new).
	pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

	/// Builds a client with the crate defaults: bounded request timeout, redirects disabled.
	pub fn new() -> Result<Self, ConfigError> {
		Self::with_timeout(Self::DEFAULT_TIMEOUT)
	}

	/// Builds a client with a custom request timeout; redirects stay disabled.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self(client))
	}

	/// Wraps an existing [`ReqwestClient`].
	///
	/// Configure custom clients to disable redirect following; token endpoints return
	/// results directly instead of delegating to another URI.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	fn post_form(&self, endpoint: Url, form: TokenRequestForm) -> TokenHttpFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.post(endpoint).form(&form).send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.text().await?;

			Ok(TokenWireResponse { status, body, retry_after })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	fn headers_with_retry_after(value: &str) -> HeaderMap {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, value.parse().expect("Header fixture should be valid."));

		headers
	}

	#[test]
	fn delta_seconds_hints_parse() {
		assert_eq!(
			parse_retry_after(&headers_with_retry_after("5")),
			Some(Duration::seconds(5))
		);
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}

	#[test]
	fn http_date_hints_parse_relative_to_now() {
		let future = parse_retry_after(&headers_with_retry_after("Sat, 01 Jan 2100 00:00:00 +0000"))
			.expect("Future dates should yield a positive delta.");

		assert!(future.is_positive());
		assert_eq!(
			parse_retry_after(&headers_with_retry_after("Mon, 01 Jan 2001 00:00:00 +0000")),
			None,
			"Past dates must be discarded."
		);
	}

	#[test]
	fn garbage_hints_are_ignored() {
		assert_eq!(parse_retry_after(&headers_with_retry_after("soon")), None);
	}

	#[test]
	fn wire_response_debug_hides_the_body() {
		let wire = TokenWireResponse {
			status: 200,
			body: "{\"access_token\":\"secret-value\"}".into(),
			retry_after: None,
		};
		let rendered = format!("{wire:?}");

		assert!(!rendered.contains("secret-value"));
		assert!(rendered.contains("200"));
	}
}
