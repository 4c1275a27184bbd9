//! Directory client
//!
//! The directory maps logical service names to endpoint addresses. Services
//! bind themselves at startup and unbind at shutdown; gateways look peers up
//! on first use.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use upa_core::DirectoryFault;

/// A name bound in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
struct BindRequest<'a> {
    address: &'a str,
}

/// Name -> address registry
#[async_trait]
pub trait DirectoryClient: Send + Sync + Debug {
    /// Resolve `name`, failing with `NotFound` if it is not bound
    async fn lookup(&self, name: &str) -> Result<String, DirectoryFault>;

    /// Bind `name` to `address`, replacing any previous binding
    async fn bind(&self, name: &str, address: &str) -> Result<(), DirectoryFault>;

    /// Remove the binding for `name`; unbinding an unknown name is not an error
    async fn unbind(&self, name: &str) -> Result<(), DirectoryFault>;

    /// All bindings whose name starts with `prefix`, sorted by name
    async fn list(&self, prefix: &str) -> Result<Vec<DirectoryEntry>, DirectoryFault>;
}

/// In-memory directory
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    names: RwLock<BTreeMap<String, String>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
    async fn lookup(&self, name: &str) -> Result<String, DirectoryFault> {
        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        names
            .get(name)
            .cloned()
            .ok_or_else(|| DirectoryFault::NotFound(name.to_string()))
    }

    async fn bind(&self, name: &str, address: &str) -> Result<(), DirectoryFault> {
        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        info!(name = %name, address = %address, "Bound name");
        names.insert(name.to_string(), address.to_string());
        Ok(())
    }

    async fn unbind(&self, name: &str) -> Result<(), DirectoryFault> {
        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        if names.remove(name).is_some() {
            info!(name = %name, "Unbound name");
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<DirectoryEntry>, DirectoryFault> {
        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        Ok(names
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, address)| DirectoryEntry {
                name: name.clone(),
                address: address.clone(),
            })
            .collect())
    }
}

/// Directory reached over HTTP
///
/// - `GET /v1/names/{name}` -> `{name, address}` or 404
/// - `PUT /v1/names/{name}` with `{address}`
/// - `DELETE /v1/names/{name}`
/// - `GET /v1/names?prefix=...` -> `[{name, address}]`
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    base_url: String,
    http: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn name_url(&self, name: &str) -> String {
        format!("{}/v1/names/{}", self.base_url, name)
    }
}

fn unavailable(err: reqwest::Error) -> DirectoryFault {
    DirectoryFault::Unavailable(err.to_string())
}

#[async_trait]
impl DirectoryClient for HttpDirectory {
    async fn lookup(&self, name: &str) -> Result<String, DirectoryFault> {
        debug!(name = %name, directory = %self.base_url, "Directory lookup");
        let response = self
            .http
            .get(self.name_url(name))
            .send()
            .await
            .map_err(unavailable)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DirectoryFault::NotFound(name.to_string()));
        }
        let entry: DirectoryEntry = response
            .error_for_status()
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;
        Ok(entry.address)
    }

    async fn bind(&self, name: &str, address: &str) -> Result<(), DirectoryFault> {
        self.http
            .put(self.name_url(name))
            .json(&BindRequest { address })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?;
        info!(name = %name, address = %address, "Bound name in directory");
        Ok(())
    }

    async fn unbind(&self, name: &str) -> Result<(), DirectoryFault> {
        let response = self
            .http
            .delete(self.name_url(name))
            .send()
            .await
            .map_err(unavailable)?;
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            response.error_for_status().map_err(unavailable)?;
        }
        info!(name = %name, "Unbound name in directory");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<DirectoryEntry>, DirectoryFault> {
        let mut entries: Vec<DirectoryEntry> = self
            .http
            .get(format!("{}/v1/names", self.base_url))
            .query(&[("prefix", prefix)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(unavailable)?
            .json()
            .await
            .map_err(unavailable)?;
        entries.retain(|e| e.name.starts_with(prefix));
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_lookup_unbind() {
        let dir = MemoryDirectory::new();
        dir.bind("UpaTransporter1", "http://localhost:8081").await.unwrap();

        assert_eq!(dir.lookup("UpaTransporter1").await.unwrap(), "http://localhost:8081");

        dir.unbind("UpaTransporter1").await.unwrap();
        assert_eq!(
            dir.lookup("UpaTransporter1").await,
            Err(DirectoryFault::NotFound("UpaTransporter1".into()))
        );
        // Unbinding twice is fine
        assert!(dir.unbind("UpaTransporter1").await.is_ok());
    }

    #[tokio::test]
    async fn test_rebind_replaces_address() {
        let dir = MemoryDirectory::new();
        dir.bind("UpaBroker", "http://a").await.unwrap();
        dir.bind("UpaBroker", "http://b").await.unwrap();
        assert_eq!(dir.lookup("UpaBroker").await.unwrap(), "http://b");
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let dir = MemoryDirectory::new();
        dir.bind("UpaTransporter2", "http://t2").await.unwrap();
        dir.bind("UpaBroker", "http://b").await.unwrap();
        dir.bind("UpaTransporter1", "http://t1").await.unwrap();

        let names: Vec<String> = dir
            .list("UpaTransporter")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["UpaTransporter1", "UpaTransporter2"]);
    }

    #[tokio::test]
    async fn test_http_directory_unreachable() {
        let dir = HttpDirectory::new("http://127.0.0.1:1/", reqwest::Client::new());
        assert_eq!(dir.base_url(), "http://127.0.0.1:1");
        assert!(matches!(
            dir.lookup("UpaTransporter1").await,
            Err(DirectoryFault::Unavailable(_))
        ));
    }
}
