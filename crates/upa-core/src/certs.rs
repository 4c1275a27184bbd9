//! Certificate store
//!
//! Resolves a principal name to its certificate. The file-backed store reads
//! `<dir>/<name>/<name>.cert` and caches the parsed keys; certificates are
//! assumed valid for the lifetime of the process.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use crate::crypto::{Certificate, KeyPair, PublicKey};
use crate::error::{Result, UpaError};

/// Extension of certificate files
pub const CERT_EXT: &str = "cert";
/// Extension of private key files
pub const KEY_EXT: &str = "key";

/// Name -> certificate lookup, read-only at runtime
#[async_trait]
pub trait CertificateStore: Send + Sync + Debug {
    /// Raw certificate bytes for `name`, or `None` if the name is unknown
    async fn certificate_bytes(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Public key for `name`, parsed from its certificate
    async fn public_key(&self, name: &str) -> Result<Option<PublicKey>> {
        match self.certificate_bytes(name).await? {
            Some(bytes) => parse_certificate(name, &bytes).map(Some),
            None => Ok(None),
        }
    }
}

/// Parse certificate bytes and check they were issued to `name`
fn parse_certificate(name: &str, bytes: &[u8]) -> Result<PublicKey> {
    let cert = Certificate::from_bytes(bytes).map_err(|e| UpaError::CertificateError {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    if cert.subject != name {
        return Err(UpaError::CertificateError {
            name: name.to_string(),
            reason: format!("certificate subject is '{}'", cert.subject),
        });
    }
    PublicKey::try_from(&cert)
}

/// Certificate store backed by a key directory on disk
#[derive(Debug)]
pub struct FileCertificateStore {
    base_dir: PathBuf,
    cache: RwLock<HashMap<String, PublicKey>>,
}

impl FileCertificateStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the certificate file for `name`
    pub fn certificate_path(&self, name: &str) -> PathBuf {
        principal_file(&self.base_dir, name, CERT_EXT)
    }
}

/// Path of `<dir>/<name>/<name>.<ext>`
fn principal_file(base_dir: &Path, name: &str, ext: &str) -> PathBuf {
    base_dir.join(name).join(format!("{}.{}", name, ext))
}

/// Names travel in call metadata, so they must not escape the key directory.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.')
}

#[async_trait]
impl CertificateStore for FileCertificateStore {
    async fn certificate_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if !is_safe_name(name) {
            return Ok(None);
        }
        let path = self.certificate_path(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(name = %name, path = %path.display(), "No certificate on disk");
                Ok(None)
            }
            Err(e) => Err(UpaError::CertificateError {
                name: name.to_string(),
                reason: format!("error reading {}: {}", path.display(), e),
            }),
        }
    }

    async fn public_key(&self, name: &str) -> Result<Option<PublicKey>> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(key) = cache.get(name) {
                return Ok(Some(key.clone()));
            }
        }

        let Some(bytes) = self.certificate_bytes(name).await? else {
            return Ok(None);
        };
        let key = parse_certificate(name, &bytes)?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(name.to_string(), key.clone());
        info!(name = %name, "Loaded certificate");
        Ok(Some(key))
    }
}

/// In-memory certificate store
#[derive(Debug, Default)]
pub struct MemoryCertificateStore {
    certificates: RwLock<HashMap<String, Certificate>>,
}

impl MemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the certificate for its subject
    pub fn register(&self, cert: Certificate) {
        let mut certificates = self.certificates.write().unwrap_or_else(PoisonError::into_inner);
        info!(subject = %cert.subject, "Registered certificate");
        certificates.insert(cert.subject.clone(), cert);
    }

    /// Builder-style registration of a key pair's certificate
    pub fn with_principal(self, key_pair: &KeyPair) -> Self {
        self.register(key_pair.certificate());
        self
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut certificates = self.certificates.write().unwrap_or_else(PoisonError::into_inner);
        certificates.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let certificates = self.certificates.read().unwrap_or_else(PoisonError::into_inner);
        certificates.keys().cloned().collect()
    }
}

#[async_trait]
impl CertificateStore for MemoryCertificateStore {
    async fn certificate_bytes(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let cert = {
            let certificates = self.certificates.read().unwrap_or_else(PoisonError::into_inner);
            certificates.get(name).cloned()
        };
        cert.map(|c| c.to_bytes()).transpose()
    }
}

/// Write a principal's certificate and private key into a key directory
pub async fn write_principal(base_dir: &Path, key_pair: &KeyPair) -> Result<()> {
    let name = key_pair.name();
    let io_err = |e: std::io::Error| UpaError::PrivateKeyError {
        name: name.to_string(),
        reason: e.to_string(),
    };

    tokio::fs::create_dir_all(base_dir.join(name)).await.map_err(io_err)?;
    tokio::fs::write(
        principal_file(base_dir, name, CERT_EXT),
        key_pair.certificate().to_bytes()?,
    )
    .await
    .map_err(io_err)?;
    tokio::fs::write(principal_file(base_dir, name, KEY_EXT), key_pair.to_base64())
        .await
        .map_err(io_err)?;
    Ok(())
}

/// Load a principal's private key from `<dir>/<name>/<name>.key`
pub async fn load_key_pair(base_dir: &Path, name: &str) -> Result<KeyPair> {
    let path = principal_file(base_dir, name, KEY_EXT);
    let encoded = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| UpaError::PrivateKeyError {
            name: name.to_string(),
            reason: format!("error reading {}: {}", path.display(), e),
        })?;
    KeyPair::from_base64(name, &encoded)
}
