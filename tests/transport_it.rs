#![cfg(feature = "reqwest")]

// std
use std::collections::{HashSet, VecDeque};
// self
use smart_backend_auth::{
	_preludet::*,
	assertion::AssertionBuilder,
	error::{NetworkError, ProtocolError},
	exchange::{CLIENT_ASSERTION_TYPE, TokenExchanger},
	http::{TokenHttpClient, TokenHttpFuture, TokenRequestForm, TokenWireResponse},
	retry::RetryPolicy,
};

const ENDPOINT: &str = "https://auth.example.test/oauth2/token";

enum Scripted {
	Wire { status: u16, body: &'static str, retry_after: Option<Duration> },
	ConnectionLost,
}

/// Transport double that replays a scripted response per request and records every POST.
#[derive(Default)]
struct FakeHttpClient {
	script: Mutex<VecDeque<Scripted>>,
	requests: Mutex<Vec<(Url, TokenRequestForm)>>,
}
impl FakeHttpClient {
	fn scripted(responses: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
		Arc::new(Self {
			script: Mutex::new(responses.into_iter().collect()),
			requests: Mutex::new(Vec::new()),
		})
	}

	fn ok(status: u16, body: &'static str) -> Scripted {
		Scripted::Wire { status, body, retry_after: None }
	}

	fn recorded(&self) -> Vec<(Url, TokenRequestForm)> {
		self.requests.lock().clone()
	}
}
impl TokenHttpClient for FakeHttpClient {
	fn post_form(&self, endpoint: Url, form: TokenRequestForm) -> TokenHttpFuture<'_> {
		self.requests.lock().push((endpoint, form));

		let next = self.script.lock().pop_front().expect("Script exhausted; unexpected request.");

		Box::pin(async move {
			match next {
				Scripted::Wire { status, body, retry_after } =>
					Ok(TokenWireResponse { status, body: body.to_owned(), retry_after }),
				Scripted::ConnectionLost => Err(NetworkError::Io(std::io::Error::new(
					std::io::ErrorKind::ConnectionReset,
					"connection reset by peer",
				))),
			}
		})
	}
}

fn build_exchanger(client: Arc<FakeHttpClient>) -> TokenExchanger<FakeHttpClient> {
	TokenExchanger::new(test_identity(ENDPOINT), client)
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
	RetryPolicy::new().with_max_attempts(max_attempts).with_base_delay(Duration::ZERO)
}

fn form_value<'a>(form: &'a TokenRequestForm, field: &str) -> &'a str {
	form.iter()
		.find_map(|(name, value)| (*name == field).then_some(value.as_str()))
		.unwrap_or_else(|| panic!("Form should carry the `{field}` field."))
}

#[tokio::test]
async fn posted_form_carries_the_backend_services_grant() {
	let client = FakeHttpClient::scripted([FakeHttpClient::ok(
		200,
		r#"{"access_token":"T","token_type":"bearer","expires_in":300}"#,
	)]);
	let exchanger = build_exchanger(client.clone());
	let assertion = AssertionBuilder::build_now(exchanger.identity())
		.expect("Assertion should build with a valid clock.");

	exchanger.exchange(&assertion).await.expect("Scripted success should decode.");

	let recorded = client.recorded();

	assert_eq!(recorded.len(), 1);

	let (endpoint, form) = &recorded[0];

	assert_eq!(endpoint.as_str(), ENDPOINT);
	assert_eq!(form_value(form, "grant_type"), "client_credentials");
	assert_eq!(form_value(form, "client_assertion_type"), CLIENT_ASSERTION_TYPE);
	assert_eq!(form_value(form, "client_assertion"), assertion.jwt.expose());
	assert_eq!(form_value(form, "scope"), "system/Patient.read");
	assert_eq!(form.len(), 4, "No other fields belong in the exchange form.");
}

#[tokio::test]
async fn every_retry_attempt_signs_a_fresh_assertion() {
	let client = FakeHttpClient::scripted([
		FakeHttpClient::ok(503, "busy"),
		FakeHttpClient::ok(401, r#"{"error":"invalid_client"}"#),
		FakeHttpClient::ok(200, r#"{"access_token":"third-time","expires_in":600}"#),
	]);
	let exchanger = build_exchanger(client.clone());
	let token = exchanger
		.exchange_with_retry(&fast_policy(3))
		.await
		.expect("The third attempt should succeed.");

	assert_eq!(token.value.expose(), "third-time");

	let recorded = client.recorded();

	assert_eq!(recorded.len(), 3);

	let jtis = recorded
		.iter()
		.map(|(_, form)| {
			decode_claims_unverified(form_value(form, "client_assertion"))["jti"]
				.as_str()
				.expect("Every assertion should carry a jti claim.")
				.to_owned()
		})
		.collect::<HashSet<_>>();

	assert_eq!(jtis.len(), 3, "Assertions are single-use; no jti may repeat across attempts.");
}

#[tokio::test]
async fn network_failures_retry_until_the_endpoint_answers() {
	let client = FakeHttpClient::scripted([
		Scripted::ConnectionLost,
		FakeHttpClient::ok(200, r#"{"access_token":"after-reset","expires_in":600}"#),
	]);
	let exchanger = build_exchanger(client.clone());
	let token = exchanger
		.exchange_with_retry(&fast_policy(3))
		.await
		.expect("The retried exchange should succeed.");

	assert_eq!(token.value.expose(), "after-reset");
	assert_eq!(client.recorded().len(), 2);
}

#[tokio::test]
async fn protocol_errors_are_never_retried() {
	let client = FakeHttpClient::scripted([FakeHttpClient::ok(200, "<html>maintenance</html>")]);
	let exchanger = build_exchanger(client.clone());
	let err = exchanger
		.exchange_with_retry(&fast_policy(3))
		.await
		.expect_err("A malformed success body must surface immediately.");

	assert!(matches!(err, Error::Protocol(ProtocolError::Json { .. })));
	assert_eq!(client.recorded().len(), 1, "Retrying a protocol violation cannot help.");
}

#[tokio::test]
async fn exhausted_budgets_surface_the_last_error() {
	let client = FakeHttpClient::scripted([
		FakeHttpClient::ok(500, "boom"),
		Scripted::ConnectionLost,
	]);
	let exchanger = build_exchanger(client.clone());
	let err = exchanger
		.exchange_with_retry(&fast_policy(2))
		.await
		.expect_err("Two failing attempts must exhaust the budget.");

	assert!(matches!(err, Error::Network(NetworkError::Io(_))));
	assert_eq!(client.recorded().len(), 2);
}
