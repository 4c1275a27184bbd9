//! Broker configuration
//!
//! Read from `UPA_*` environment variables, with defaults suitable for a
//! local run.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{var} has an invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Principal name; also the name bound in the directory
    pub name: String,
    pub port: u16,
    /// Address other services reach us at
    pub public_url: String,
    /// Directory service; without one only statically known Transporters are used
    pub directory_url: Option<String>,
    /// Name prefix identifying Transporters in the directory
    pub transporter_prefix: String,
    /// Holds `<name>/<name>.key` and the certificates of every principal
    pub keys_dir: PathBuf,
    /// Bound on every Transporter call
    pub call_timeout: Duration,
    /// Nonce freshness window
    pub nonce_window: Duration,
    pub require_signed_requests: bool,
    pub log_level: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: "UpaBroker".into(),
            port: 8080,
            public_url: "http://localhost:8080".into(),
            directory_url: None,
            transporter_prefix: "UpaTransporter".into(),
            keys_dir: PathBuf::from("keys"),
            call_timeout: Duration::from_millis(5000),
            nonce_window: Duration::from_secs(300),
            require_signed_requests: false,
            log_level: "info".into(),
        }
    }
}

impl BrokerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load from any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let name = lookup("UPA_BROKER_NAME").unwrap_or(defaults.name);
        let port: u16 = parse(&lookup, "UPA_BROKER_PORT", defaults.port)?;
        let public_url = lookup("UPA_BROKER_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port));
        let call_timeout_ms: u64 = parse(&lookup, "UPA_CALL_TIMEOUT_MS", 5000)?;
        let nonce_window_secs: u64 = parse(&lookup, "UPA_NONCE_WINDOW_SECS", 300)?;

        Ok(Self {
            name,
            port,
            public_url,
            directory_url: lookup("UPA_DIRECTORY_URL").filter(|url| !url.is_empty()),
            transporter_prefix: lookup("UPA_TRANSPORTER_PREFIX").unwrap_or(defaults.transporter_prefix),
            keys_dir: lookup("UPA_KEYS_DIR").map(PathBuf::from).unwrap_or(defaults.keys_dir),
            call_timeout: Duration::from_millis(call_timeout_ms),
            nonce_window: Duration::from_secs(nonce_window_secs),
            require_signed_requests: parse_bool(&lookup, "UPA_REQUIRE_SIGNED_REQUESTS", false)?,
            log_level: lookup("UPA_BROKER_LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match lookup(var).as_deref().map(str::trim) {
        None => Ok(default),
        Some("1") | Some("true") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError {
            var,
            value: other.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<BrokerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BrokerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.name, "UpaBroker");
        assert_eq!(config.port, 8080);
        assert_eq!(config.public_url, "http://localhost:8080");
        assert_eq!(config.transporter_prefix, "UpaTransporter");
        assert_eq!(config.keys_dir, PathBuf::from("keys"));
        assert_eq!(config.call_timeout, Duration::from_millis(5000));
        assert_eq!(config.nonce_window, Duration::from_secs(300));
        assert!(config.directory_url.is_none());
        assert!(!config.require_signed_requests);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("UPA_BROKER_NAME", "UpaBroker2"),
            ("UPA_BROKER_PORT", "9090"),
            ("UPA_DIRECTORY_URL", "http://localhost:9000"),
            ("UPA_CALL_TIMEOUT_MS", "250"),
            ("UPA_REQUIRE_SIGNED_REQUESTS", "true"),
        ])
        .unwrap();

        assert_eq!(config.name, "UpaBroker2");
        assert_eq!(config.public_url, "http://localhost:9090");
        assert_eq!(config.directory_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.call_timeout, Duration::from_millis(250));
        assert!(config.require_signed_requests);
    }

    #[test]
    fn test_invalid_values() {
        let err = config(&[("UPA_BROKER_PORT", "eighty")]).unwrap_err();
        assert_eq!(err.var, "UPA_BROKER_PORT");
        assert_eq!(err.value, "eighty");

        let err = config(&[("UPA_REQUIRE_SIGNED_REQUESTS", "maybe")]).unwrap_err();
        assert_eq!(err.var, "UPA_REQUIRE_SIGNED_REQUESTS");
    }
}
