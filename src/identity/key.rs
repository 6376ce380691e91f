// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey};
use sha2::{Digest, Sha256};
// self
use crate::{_prelude::*, auth::KeyId, error::ConfigError};

/// Supported assertion signing algorithms.
///
/// The algorithm is fixed by the key family at construction time, so no request path can
/// downgrade signing to a weaker or symmetric scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SigningAlgorithm {
	/// RSASSA-PKCS1-v1_5 with SHA-384, served by RSA private keys.
	Rs384,
	/// ECDSA with P-384 and SHA-384, served by EC private keys.
	Es384,
}
impl SigningAlgorithm {
	/// Canonical JOSE label for the algorithm.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Rs384 => "RS384",
			Self::Es384 => "ES384",
		}
	}

	/// Maps the algorithm onto the `jsonwebtoken` equivalent used for signing.
	pub const fn as_jwt_algorithm(&self) -> Algorithm {
		match self {
			Self::Rs384 => Algorithm::RS384,
			Self::Es384 => Algorithm::ES384,
		}
	}
}
impl Display for SigningAlgorithm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for SigningAlgorithm {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let label = s.trim();

		if label.eq_ignore_ascii_case("RS384") {
			Ok(Self::Rs384)
		} else if label.eq_ignore_ascii_case("ES384") {
			Ok(Self::Es384)
		} else {
			Err(ConfigError::UnknownAlgorithm { value: label.to_owned() })
		}
	}
}

/// Private signing key bound to its algorithm.
///
/// The key material never leaves this type; logs and diagnostics only ever see the algorithm,
/// the optional `kid`, and a SHA-256 fingerprint of the PEM input.
#[derive(Clone)]
pub struct SigningKey {
	algorithm: SigningAlgorithm,
	key_id: Option<KeyId>,
	encoding_key: Arc<EncodingKey>,
	fingerprint: String,
}
impl SigningKey {
	/// Parses PEM-encoded private key material for the selected algorithm.
	///
	/// RSA PEMs are rejected for [`SigningAlgorithm::Es384`] and vice versa, so a family
	/// mismatch surfaces here instead of at signing time.
	pub fn from_pem(pem: &str, algorithm: SigningAlgorithm) -> Result<Self, ConfigError> {
		let encoding_key = match algorithm {
			SigningAlgorithm::Rs384 => EncodingKey::from_rsa_pem(pem.as_bytes()),
			SigningAlgorithm::Es384 => EncodingKey::from_ec_pem(pem.as_bytes()),
		}
		.map_err(|source| ConfigError::Key { algorithm, source })?;

		Ok(Self {
			algorithm,
			key_id: None,
			encoding_key: Arc::new(encoding_key),
			fingerprint: fingerprint(pem),
		})
	}

	/// Attaches a JWK `kid` hint advertised in assertion headers.
	pub fn with_key_id(mut self, key_id: KeyId) -> Self {
		self.key_id = Some(key_id);

		self
	}

	/// Algorithm this key signs with.
	pub fn algorithm(&self) -> SigningAlgorithm {
		self.algorithm
	}

	/// JWK `kid` hint, if configured.
	pub fn key_id(&self) -> Option<&KeyId> {
		self.key_id.as_ref()
	}

	/// Log-safe fingerprint of the PEM input (base64, no padding, SHA-256).
	pub fn fingerprint(&self) -> &str {
		&self.fingerprint
	}

	pub(crate) fn encoding_key(&self) -> &EncodingKey {
		&self.encoding_key
	}
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningKey")
			.field("algorithm", &self.algorithm)
			.field("key_id", &self.key_id)
			.field("fingerprint", &self.fingerprint)
			.finish()
	}
}

fn fingerprint(pem: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(pem.trim().as_bytes());

	let digest = hasher.finalize();

	STANDARD_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn algorithm_labels_round_trip() {
		assert_eq!(SigningAlgorithm::Rs384.as_str(), "RS384");
		assert_eq!(SigningAlgorithm::Es384.to_string(), "ES384");
		assert_eq!(
			"rs384".parse::<SigningAlgorithm>().expect("Lowercase labels should parse."),
			SigningAlgorithm::Rs384
		);
		assert_eq!(
			" ES384 ".parse::<SigningAlgorithm>().expect("Padded labels should parse."),
			SigningAlgorithm::Es384
		);
	}

	#[test]
	fn unknown_algorithm_labels_error() {
		let err = "HS256".parse::<SigningAlgorithm>().expect_err("HMAC must be rejected.");

		assert!(matches!(err, ConfigError::UnknownAlgorithm { value } if value == "HS256"));
	}

	#[test]
	fn garbage_pem_is_rejected() {
		let err = SigningKey::from_pem("not a key", SigningAlgorithm::Rs384)
			.expect_err("Garbage PEM must be rejected.");

		assert!(matches!(err, ConfigError::Key { algorithm: SigningAlgorithm::Rs384, .. }));
	}
}
