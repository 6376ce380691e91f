#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use smart_backend_auth::{
	_preludet::*,
	assertion::{Assertion, AssertionBuilder},
	error::ProtocolError,
	exchange::TokenExchanger,
	http::ReqwestHttpClient,
	retry::RetryPolicy,
};

fn build_exchanger(server: &MockServer) -> TokenExchanger<ReqwestHttpClient> {
	TokenExchanger::new(test_identity(&server.url("/token")), test_reqwest_http_client())
}

fn sign(exchanger: &TokenExchanger<ReqwestHttpClient>) -> Assertion {
	AssertionBuilder::build_now(exchanger.identity())
		.expect("Assertion should build with a valid clock.")
}

#[tokio::test]
async fn successful_exchange_decodes_the_token() {
	let server = MockServer::start_async().await;
	let exchanger = build_exchanger(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				r#"{"access_token":"wire-token","token_type":"bearer","expires_in":3600,"scope":"system/Patient.read"}"#,
			);
		})
		.await;
	let assertion = sign(&exchanger);
	let token = exchanger.exchange(&assertion).await.expect("Exchange should succeed.");

	assert_eq!(token.value.expose(), "wire-token");
	assert_eq!(token.token_type, "bearer");
	assert_eq!(token.lifetime(), Duration::seconds(3600));
	assert!(token.is_fresh(Duration::seconds(30)));
	assert!(
		token
			.scope
			.as_ref()
			.expect("Echoed scope should be present.")
			.contains("system/Patient.read")
	);

	mock.assert_async().await;
}

#[tokio::test]
async fn rejections_surface_status_and_reason() {
	let server = MockServer::start_async().await;
	let exchanger = build_exchanger(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_client","error_description":"unknown client"}"#);
		})
		.await;
	let assertion = sign(&exchanger);
	let err = exchanger
		.exchange(&assertion)
		.await
		.expect_err("Rejected assertions should surface to the caller.");

	assert!(matches!(
		err,
		Error::AuthRejected { status: 400, ref reason } if reason == "invalid_client: unknown client"
	));

	mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_carry_retry_after() {
	let server = MockServer::start_async().await;
	let exchanger = build_exchanger(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(503).header("retry-after", "7").body("upstream restarting");
		})
		.await;
	let assertion = sign(&exchanger);
	let err =
		exchanger.exchange(&assertion).await.expect_err("Server failures should surface as errors.");

	assert!(matches!(
		err,
		Error::ServerError { status: 503, retry_after: Some(hint) } if hint == Duration::seconds(7)
	));

	mock.assert_async().await;
}

#[tokio::test]
async fn malformed_success_bodies_are_protocol_errors() {
	let server = MockServer::start_async().await;
	let exchanger = build_exchanger(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "text/html").body("<html>maintenance</html>");
		})
		.await;
	let assertion = sign(&exchanger);
	let err = exchanger
		.exchange(&assertion)
		.await
		.expect_err("Non-JSON success bodies must be rejected.");

	assert!(matches!(err, Error::Protocol(ProtocolError::Json { .. })));

	mock.assert_async().await;
}

#[tokio::test]
async fn rejected_retries_stay_bounded() {
	let server = MockServer::start_async().await;
	let exchanger = build_exchanger(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_client"}"#);
		})
		.await;
	let policy = RetryPolicy::new().with_max_attempts(2).with_base_delay(Duration::ZERO);
	let err = exchanger
		.exchange_with_retry(&policy)
		.await
		.expect_err("Persistent rejections should exhaust the retry budget.");

	assert!(matches!(err, Error::AuthRejected { status: 401, .. }));

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn endpoint_recovers_after_transient_server_errors() {
	let server = MockServer::start_async().await;
	let exchanger = build_exchanger(&server);
	let mut unavailable = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(500).body("boom");
		})
		.await;
	let assertion = sign(&exchanger);
	let err = exchanger
		.exchange(&assertion)
		.await
		.expect_err("The first exchange should hit the failing endpoint.");

	assert!(matches!(err, Error::ServerError { status: 500, .. }));

	unavailable.delete_async().await;

	let recovered = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"recovered","token_type":"bearer","expires_in":600}"#);
		})
		.await;
	let assertion = sign(&exchanger);
	let token =
		exchanger.exchange(&assertion).await.expect("The retried exchange should succeed.");

	assert_eq!(token.value.expose(), "recovered");

	recovered.assert_async().await;
}

#[tokio::test]
async fn connection_failures_surface_as_network_errors() {
	// Discard port; nothing listens there.
	let exchanger = TokenExchanger::new(
		test_identity("https://127.0.0.1:9/token"),
		test_reqwest_http_client(),
	);
	let assertion = sign(&exchanger);
	let err =
		exchanger.exchange(&assertion).await.expect_err("Connecting to a dead port must fail.");

	assert!(matches!(err, Error::Network(_)));
}
