//! Demonstrates the full backend services loop against a local mock authorization server:
//! a signed client assertion is exchanged for an access token, cached, and reused.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use smart_backend_auth::{
	_preludet::{TEST_RSA_PRIVATE_KEY_PEM, test_reqwest_http_client},
	cache::TokenCache,
	exchange::TokenExchanger,
	identity::{ClientIdentity, SigningAlgorithm},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth2/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":3600,\"scope\":\"system/Patient.read\"}",
			);
		})
		.await;
	let identity = ClientIdentity::builder("demo-backend-client")
		.token_endpoint(Url::parse(&server.url("/oauth2/token"))?)
		.private_key_pem(TEST_RSA_PRIVATE_KEY_PEM, SigningAlgorithm::Rs384)
		.scope(["system/Patient.read"])
		.build()?;
	let cache = TokenCache::new(TokenExchanger::new(identity, test_reqwest_http_client()));
	let first = cache.get_token().await?;
	let second = cache.get_token().await?;

	println!("Authorization: {}.", first.bearer_header());
	println!(
		"Valid for another {}s.",
		first.remaining_at(time::OffsetDateTime::now_utc()).whole_seconds()
	);
	println!(
		"Endpoint calls: {}; cache hits: {}.",
		cache.metrics().exchanges(),
		cache.metrics().hits()
	);

	assert_eq!(second.value.expose(), first.value.expose());

	token_mock.assert_async().await;

	Ok(())
}
