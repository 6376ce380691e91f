//! Token endpoint exchange: a signed assertion goes in, a classified outcome comes out.
//!
//! The exchanger owns the wire contract of the backend services grant. It builds the
//! form-encoded POST (`grant_type`, `client_assertion_type`, `client_assertion`, optional
//! `scope`), hands it to the configured [`TokenHttpClient`], and maps every response into
//! the crate taxonomy: 2xx bodies are decoded strictly, 4xx becomes [`Error::AuthRejected`],
//! 5xx becomes [`Error::ServerError`] with any Retry-After hint attached.

// self
use crate::{
	_prelude::*,
	assertion::{Assertion, AssertionBuilder},
	auth::{AccessToken, ScopeSet, TokenSecret},
	error::{ProtocolError, RetryDisposition},
	http::{TokenHttpClient, TokenRequestForm, TokenWireResponse},
	identity::ClientIdentity,
	obs::{self, AuthOutcome, AuthSpan, AuthStage},
	retry::RetryPolicy,
};

/// Assertion type URN identifying the JWT-bearer client authentication scheme.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

const BODY_PREVIEW_LIMIT: usize = 256;

/// Stateless driver for client-credentials exchanges against one token endpoint.
pub struct TokenExchanger<C>
where
	C: TokenHttpClient + ?Sized,
{
	identity: ClientIdentity,
	http_client: Arc<C>,
}
impl<C> TokenExchanger<C>
where
	C: TokenHttpClient + ?Sized,
{
	/// Creates an exchanger for the provided identity and transport.
	pub fn new(identity: ClientIdentity, http_client: impl Into<Arc<C>>) -> Self {
		Self { identity, http_client: http_client.into() }
	}

	/// Identity this exchanger authenticates as.
	pub fn identity(&self) -> &ClientIdentity {
		&self.identity
	}

	/// Performs a single exchange with the provided assertion.
	pub async fn exchange(&self, assertion: &Assertion) -> Result<AccessToken> {
		const STAGE: AuthStage = AuthStage::Exchange;

		let span = AuthSpan::new(STAGE, "exchange");

		obs::record_auth_outcome(STAGE, AuthOutcome::Attempt);

		let result = span
			.instrument(async move {
				let form = self.build_form(assertion);
				let wire =
					self.http_client.post_form(self.identity.token_endpoint.clone(), form).await?;

				classify(wire)
			})
			.await;

		match &result {
			Ok(_) => obs::record_auth_outcome(STAGE, AuthOutcome::Success),
			Err(_) => obs::record_auth_outcome(STAGE, AuthOutcome::Failure),
		}

		result
	}

	/// Drives exchanges under `policy`, signing a fresh assertion for every attempt.
	///
	/// Errors whose [`RetryDisposition`] is `Never` surface immediately; everything else
	/// retries until the attempt budget runs out, sleeping per the policy (or the upstream
	/// Retry-After hint) between attempts.
	pub async fn exchange_with_retry(&self, policy: &RetryPolicy) -> Result<AccessToken> {
		let mut attempt = 0;

		loop {
			attempt += 1;

			let assertion = AssertionBuilder::build_now(&self.identity)?;
			let err = match self.exchange(&assertion).await {
				Ok(token) => return Ok(token),
				Err(e) => e,
			};

			if err.retry_disposition() == RetryDisposition::Never
				|| attempt >= policy.max_attempts()
			{
				return Err(err);
			}

			tokio::time::sleep(policy.delay_for(attempt, err.retry_after())).await;
		}
	}

	fn build_form(&self, assertion: &Assertion) -> TokenRequestForm {
		let mut form = vec![
			("grant_type", "client_credentials".to_owned()),
			("client_assertion_type", CLIENT_ASSERTION_TYPE.to_owned()),
			("client_assertion", assertion.jwt.expose().to_owned()),
		];

		if !self.identity.scope.is_empty() {
			form.push(("scope", self.identity.scope.normalized()));
		}

		form
	}
}
impl<C> Clone for TokenExchanger<C>
where
	C: TokenHttpClient + ?Sized,
{
	fn clone(&self) -> Self {
		Self { identity: self.identity.clone(), http_client: Arc::clone(&self.http_client) }
	}
}
impl<C> Debug for TokenExchanger<C>
where
	C: TokenHttpClient + ?Sized,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenExchanger").field("identity", &self.identity).finish()
	}
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	token_type: Option<String>,
	expires_in: Option<i64>,
	scope: Option<String>,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: Option<String>,
	error_description: Option<String>,
}

fn classify(wire: TokenWireResponse) -> Result<AccessToken> {
	match wire.status {
		200..=299 => decode_success(&wire.body),
		400..=499 =>
			Err(Error::AuthRejected { status: wire.status, reason: rejection_reason(&wire.body) }),
		500..=599 =>
			Err(Error::ServerError { status: wire.status, retry_after: wire.retry_after }),
		status => Err(ProtocolError::UnexpectedStatus { status }.into()),
	}
}

fn decode_success(body: &str) -> Result<AccessToken> {
	let mut deserializer = serde_json::Deserializer::from_str(body);
	let parsed: TokenEndpointResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| ProtocolError::Json { source })?;

	if parsed.access_token.is_empty() {
		return Err(ProtocolError::EmptyAccessToken.into());
	}

	let expires_in = parsed.expires_in.ok_or(ProtocolError::MissingExpiresIn)?;

	if expires_in <= 0 {
		return Err(ProtocolError::NonPositiveExpiresIn.into());
	}

	let issued_at = OffsetDateTime::now_utc();
	let expires_at = issued_at
		.checked_add(Duration::seconds(expires_in))
		.ok_or(ProtocolError::ExpiresInOutOfRange)?;
	let scope = parsed
		.scope
		.as_deref()
		.map(ScopeSet::from_str)
		.transpose()
		.map_err(ProtocolError::InvalidScope)?;

	Ok(AccessToken {
		value: TokenSecret::new(parsed.access_token),
		token_type: parsed.token_type.unwrap_or_else(|| "bearer".to_owned()),
		scope,
		issued_at,
		expires_at,
	})
}

fn rejection_reason(body: &str) -> String {
	if let Ok(parsed) = serde_json::from_str::<OAuthErrorBody>(body) {
		match (parsed.error, parsed.error_description) {
			(Some(error), Some(description)) => return format!("{error}: {description}"),
			(Some(error), None) => return error,
			(None, Some(description)) => return description,
			(None, None) => (),
		}
	}

	let preview = truncate_preview(body.trim().to_owned());

	if preview.is_empty() { "(no response body)".to_owned() } else { preview }
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = String::new();

	for (idx, ch) in body.chars().enumerate() {
		if idx >= BODY_PREVIEW_LIMIT {
			buf.push('…');

			break;
		}
		buf.push(ch);
	}

	buf
}
