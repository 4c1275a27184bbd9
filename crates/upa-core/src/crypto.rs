//! Ed25519 keys and certificates for signed calls
//!
//! Key types:
//! - `KeyPair`: a principal's signing key, held only by the calling side
//! - `PublicKey`: verification key extracted from a certificate
//! - `Certificate`: the name-bound public key served by the certificate authority

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UpaError};

/// Length of an Ed25519 signature in bytes
pub const SIGNATURE_LENGTH: usize = 64;

/// Ed25519 key pair for a named principal
#[derive(Clone)]
pub struct KeyPair {
    /// Principal name
    name: String,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("name", &self.name)
            .field("signing_key", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate(name: impl Into<String>) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(name, signing_key)
    }

    pub fn from_signing_key(name: impl Into<String>, signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            name: name.into(),
            signing_key,
            verifying_key,
        }
    }

    /// Create a key pair from raw secret key bytes
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8; 32]) -> Self {
        Self::from_signing_key(name, SigningKey::from_bytes(bytes))
    }

    /// Decode a base64-encoded secret key, as stored in `<name>.key` files
    pub fn from_base64(name: impl Into<String>, encoded: &str) -> Result<Self> {
        let name = name.into();
        let bytes = STANDARD.decode(encoded.trim()).map_err(|e| UpaError::PrivateKeyError {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| UpaError::PrivateKeyError {
            name: name.clone(),
            reason: "invalid key length".into(),
        })?;
        Ok(Self::from_bytes(name, &bytes))
    }

    /// Base64 encoding of the secret key
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.signing_key.to_bytes())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            name: self.name.clone(),
            verifying_key: self.verifying_key,
        }
    }

    /// Issue the certificate binding this principal's name to its public key
    pub fn certificate(&self) -> Certificate {
        Certificate::from(&self.public_key())
    }

    /// Sign arbitrary bytes
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing_key.sign(message).to_bytes()
    }
}

/// Ed25519 public key bound to a principal name
#[derive(Clone)]
pub struct PublicKey {
    name: String,
    verifying_key: VerifyingKey,
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey").field("name", &self.name).finish()
    }
}

impl PublicKey {
    /// Create a public key from raw bytes
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8; 32]) -> Result<Self> {
        let verifying_key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| UpaError::CryptoError(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            verifying_key,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Verify a detached signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature_bytes: [u8; SIGNATURE_LENGTH] = signature
            .try_into()
            .map_err(|_| UpaError::CryptoError("Invalid signature length".into()))?;
        let signature = Signature::from_bytes(&signature_bytes);

        self.verifying_key
            .verify(message, &signature)
            .map_err(|e| UpaError::CryptoError(e.to_string()))
    }
}

/// Certificate served by the certificate authority
///
/// Serialized as JSON; the key is base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Principal the key belongs to
    pub subject: String,
    /// Base64-encoded Ed25519 public key
    pub public_key: String,
}

impl Certificate {
    /// Encode as certificate bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode certificate bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl From<&PublicKey> for Certificate {
    fn from(pk: &PublicKey) -> Self {
        Self {
            subject: pk.name.clone(),
            public_key: STANDARD.encode(pk.to_bytes()),
        }
    }
}

impl TryFrom<&Certificate> for PublicKey {
    type Error = UpaError;

    fn try_from(cert: &Certificate) -> Result<Self> {
        let bytes = STANDARD.decode(&cert.public_key)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| UpaError::CryptoError("Invalid key length".into()))?;
        PublicKey::from_bytes(cert.subject.clone(), &bytes)
    }
}
