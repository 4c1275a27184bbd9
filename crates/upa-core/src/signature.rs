//! Per-call authentication
//!
//! Outbound: sign the canonical call together with a fresh nonce and attach
//! `{sender, nonce, signature}` to the call metadata.
//!
//! Inbound: look up the claimed sender's certificate, verify the signature,
//! then check the nonce is fresh and unseen. Nonces are only recorded after
//! the signature verifies, so forged calls cannot burn a sender's nonces.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::canonical::canonical_call;
use crate::certs::CertificateStore;
use crate::crypto::KeyPair;
use crate::error::{AuthError, Result};
use crate::metadata::{CallMetadata, NONCE, SENDER, SIGNATURE};
use crate::nonce::{Nonce, NonceSource, NonceWindow, RandomNonceSource};

/// Tuning for the verifying side
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// Maximum distance between a nonce's timestamp and the verifier's clock
    pub freshness: Duration,
    /// Upper bound on remembered nonces
    pub window_capacity: u64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            freshness: Duration::from_secs(300),
            window_capacity: 100_000,
        }
    }
}

/// A call whose signature and nonce were accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSender {
    pub name: String,
    pub nonce: Nonce,
}

/// Signs outbound calls as one principal and verifies inbound calls from
/// any principal the certificate store knows.
#[derive(Debug)]
pub struct SignatureHandler {
    identity: KeyPair,
    certificates: Arc<dyn CertificateStore>,
    window: NonceWindow,
    nonce_source: Arc<dyn NonceSource>,
}

impl SignatureHandler {
    pub fn new(identity: KeyPair, certificates: Arc<dyn CertificateStore>) -> Self {
        Self::with_config(identity, certificates, SignatureConfig::default())
    }

    pub fn with_config(
        identity: KeyPair,
        certificates: Arc<dyn CertificateStore>,
        config: SignatureConfig,
    ) -> Self {
        Self {
            identity,
            certificates,
            window: NonceWindow::new(config.freshness, config.window_capacity),
            nonce_source: Arc::new(RandomNonceSource),
        }
    }

    /// Replace the nonce source. Only available to tests.
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_nonce_source(mut self, source: Arc<dyn NonceSource>) -> Self {
        self.nonce_source = source;
        self
    }

    /// Name of the signing principal
    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn certificates(&self) -> &Arc<dyn CertificateStore> {
        &self.certificates
    }

    pub fn nonce_window(&self) -> &NonceWindow {
        &self.window
    }

    /// Sign a call with a fresh nonce
    pub fn sign(&self, operation: &str, body: &Value) -> CallMetadata {
        let nonce = self.nonce_source.next_nonce();
        let message = signed_message(operation, body, &nonce);
        let signature = self.identity.sign(&message);

        debug!(sender = %self.name(), operation = %operation, nonce = %nonce, "Signed call");

        CallMetadata::new()
            .with(SENDER, self.name())
            .with(NONCE, nonce.to_string())
            .with(SIGNATURE, STANDARD.encode(signature))
    }

    /// Sign any serializable body
    pub fn sign_payload<T: Serialize>(&self, operation: &str, body: &T) -> Result<CallMetadata> {
        let value = serde_json::to_value(body)?;
        Ok(self.sign(operation, &value))
    }

    /// Authenticate an inbound call
    pub async fn verify(
        &self,
        metadata: &CallMetadata,
        operation: &str,
        body: &Value,
    ) -> std::result::Result<VerifiedSender, AuthError> {
        let sender = metadata
            .get(SENDER)
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::MissingMetadata(SENDER))?;
        let nonce: Nonce = metadata
            .get(NONCE)
            .ok_or(AuthError::MissingMetadata(NONCE))?
            .parse()?;
        let signature = metadata
            .get(SIGNATURE)
            .ok_or(AuthError::MissingMetadata(SIGNATURE))?;
        let signature = STANDARD.decode(signature).map_err(|_| AuthError::BadSignature {
            sender: sender.to_string(),
        })?;

        let key = self
            .certificates
            .public_key(sender)
            .await
            .map_err(|e| AuthError::Certificate(e.to_string()))?
            .ok_or_else(|| {
                warn!(sender = %sender, "Call from unknown sender");
                AuthError::UnknownSender(sender.to_string())
            })?;

        let message = signed_message(operation, body, &nonce);
        if let Err(e) = key.verify(&message, &signature) {
            warn!(sender = %sender, operation = %operation, error = %e, "SECURITY: bad signature");
            return Err(AuthError::BadSignature {
                sender: sender.to_string(),
            });
        }

        self.window
            .check_fresh(sender, &nonce, Utc::now().timestamp_millis())?;
        self.window.record(sender, &nonce).await?;

        debug!(sender = %sender, operation = %operation, "Verified call");

        Ok(VerifiedSender {
            name: sender.to_string(),
            nonce,
        })
    }
}

/// Bytes covered by the signature: canonical call followed by the nonce
fn signed_message(operation: &str, body: &Value, nonce: &Nonce) -> Vec<u8> {
    let mut message = canonical_call(operation, body);
    message.extend_from_slice(nonce.to_string().as_bytes());
    message
}
