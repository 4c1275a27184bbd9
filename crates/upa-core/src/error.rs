//! Error types for the UPA core

use thiserror::Error;

/// Result type alias using UpaError
pub type Result<T> = std::result::Result<T, UpaError>;

/// Errors raised by the core building blocks (keys, certificates, encoding)
#[derive(Error, Debug)]
pub enum UpaError {
    /// Cryptographic error
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Certificate could not be read or parsed
    #[error("Certificate error for '{name}': {reason}")]
    CertificateError { name: String, reason: String },

    /// Private key could not be read or parsed
    #[error("Private key error for '{name}': {reason}")]
    PrivateKeyError { name: String, reason: String },

    /// Invalid region name
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
}

impl From<ed25519_dalek::SignatureError> for UpaError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        UpaError::CryptoError(err.to_string())
    }
}

impl From<serde_json::Error> for UpaError {
    fn from(err: serde_json::Error) -> Self {
        UpaError::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for UpaError {
    fn from(err: base64::DecodeError) -> Self {
        UpaError::CryptoError(format!("Invalid base64 encoding: {}", err))
    }
}

/// Reasons a signed call is rejected by the verifying side.
///
/// Every variant ends up as an `AuthenticationFault` on the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A required metadata entry was absent
    #[error("missing call metadata: {0}")]
    MissingMetadata(&'static str),

    /// No certificate is known for the claimed sender
    #[error("unknown sender: {0}")]
    UnknownSender(String),

    /// The signature did not verify against the sender's certificate
    #[error("bad signature from '{sender}'")]
    BadSignature { sender: String },

    /// The nonce was already accepted for this sender
    #[error("replay detected: nonce '{nonce}' already seen from '{sender}'")]
    ReplayDetected { sender: String, nonce: String },

    /// The nonce timestamp falls outside the freshness window
    #[error("stale nonce '{nonce}' from '{sender}'")]
    StaleNonce { sender: String, nonce: String },

    /// The nonce could not be parsed
    #[error("malformed nonce: {0}")]
    MalformedNonce(String),

    /// A validly signed call came from a different principal than expected
    #[error("unexpected sender: expected '{expected}', got '{actual}'")]
    UnexpectedSender { expected: String, actual: String },

    /// The nonce window is at capacity; the call is refused rather than
    /// forgetting nonces that could still be replayed
    #[error("nonce window full, call from '{sender}' refused")]
    WindowFull { sender: String },

    /// The sender's certificate exists but is unusable
    #[error("certificate error: {0}")]
    Certificate(String),
}
