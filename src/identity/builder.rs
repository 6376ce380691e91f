// self
use crate::{
	_prelude::*,
	auth::{ClientId, KeyId, ScopeSet, TokenSecret},
	error::ConfigError,
	identity::{ClientIdentity, SigningAlgorithm, SigningKey},
};

/// Key input accepted by the builder: raw PEM awaiting parsing, or an already-loaded key.
#[derive(Clone, Debug)]
enum KeyMaterial {
	Pem {
		pem: TokenSecret,
		algorithm: SigningAlgorithm,
	},
	Loaded(SigningKey),
}

/// Builder for [`ClientIdentity`] values.
///
/// All inputs are collected first and validated together in [`build`](Self::build), so error
/// reporting does not depend on call order.
#[derive(Clone, Debug)]
pub struct ClientIdentityBuilder {
	client_id: String,
	token_endpoint: Option<Url>,
	key_material: Option<KeyMaterial>,
	key_id: Option<String>,
	scope: Vec<String>,
	assertion_lifetime: Duration,
}
impl ClientIdentityBuilder {
	pub(crate) fn new(client_id: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			token_endpoint: None,
			key_material: None,
			key_id: None,
			scope: Vec::new(),
			assertion_lifetime: ClientIdentity::DEFAULT_ASSERTION_LIFETIME,
		}
	}

	/// Sets the token endpoint the identity authenticates against.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Provides PEM-encoded private key material for the selected algorithm.
	pub fn private_key_pem(mut self, pem: impl Into<String>, algorithm: SigningAlgorithm) -> Self {
		self.key_material = Some(KeyMaterial::Pem { pem: TokenSecret::new(pem), algorithm });

		self
	}

	/// Provides an already-loaded signing key.
	pub fn signing_key(mut self, key: SigningKey) -> Self {
		self.key_material = Some(KeyMaterial::Loaded(key));

		self
	}

	/// Attaches a JWK `kid` hint; overrides any hint carried by a preloaded key.
	pub fn key_id(mut self, kid: impl Into<String>) -> Self {
		self.key_id = Some(kid.into());

		self
	}

	/// Adds scopes to request during exchanges.
	pub fn scope<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scope.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Overrides the assertion validity window; must stay within
	/// [`ClientIdentity::MAX_ASSERTION_LIFETIME`].
	pub fn assertion_lifetime(mut self, lifetime: Duration) -> Self {
		self.assertion_lifetime = lifetime;

		self
	}

	/// Consumes the builder and validates the resulting identity.
	pub fn build(self) -> Result<ClientIdentity, ConfigError> {
		let client_id = ClientId::new(&self.client_id)?;
		let token_endpoint = self.token_endpoint.ok_or(ConfigError::MissingTokenEndpoint)?;

		validate_endpoint(&token_endpoint)?;
		validate_lifetime(self.assertion_lifetime)?;

		let mut signing_key = match self.key_material.ok_or(ConfigError::MissingSigningKey)? {
			KeyMaterial::Pem { pem, algorithm } => SigningKey::from_pem(pem.expose(), algorithm)?,
			KeyMaterial::Loaded(key) => key,
		};

		if let Some(kid) = self.key_id {
			signing_key = signing_key.with_key_id(KeyId::new(kid).map_err(ConfigError::KeyId)?);
		}

		Ok(ClientIdentity {
			client_id,
			token_endpoint,
			signing_key,
			scope: ScopeSet::new(self.scope)?,
			assertion_lifetime: self.assertion_lifetime,
		})
	}
}

fn validate_endpoint(url: &Url) -> Result<(), ConfigError> {
	if url.scheme() != "https" {
		Err(ConfigError::InsecureEndpoint { endpoint: url.to_string() })
	} else {
		Ok(())
	}
}

fn validate_lifetime(lifetime: Duration) -> Result<(), ConfigError> {
	if !lifetime.is_positive() || lifetime > ClientIdentity::MAX_ASSERTION_LIFETIME {
		Err(ConfigError::AssertionLifetimeOutOfRange { requested: lifetime })
	} else {
		Ok(())
	}
}
