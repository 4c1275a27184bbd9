//! Call metadata carried alongside every signed RPC

use crate::correlation::RequestId;

/// Name of the calling principal
pub const SENDER: &str = "x-upa-sender";
/// Single-use freshness token
pub const NONCE: &str = "x-upa-nonce";
/// Base64 Ed25519 signature over the canonical call and the nonce
pub const SIGNATURE: &str = "x-upa-signature";
/// Correlation identifier, for tracing only
pub const REQUEST_ID: &str = "x-upa-request-id";

/// Operation name of a call: `"<METHOD> <path>"`
pub fn operation(method: &str, path: &str) -> String {
    format!("{} {}", method.to_ascii_uppercase(), path)
}

/// Operation name under which the response to one call of `operation` is
/// signed. `binding` ties the response to that call, see
/// [`CallMetadata::response_binding`].
pub fn response_operation(operation: &str, binding: &str) -> String {
    format!("{} response {}", operation, binding)
}

/// Small ordered set of key/value pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMetadata {
    entries: Vec<(String, String)>,
}

impl CallMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary pairs, e.g. transport headers. Keys are
    /// compared case-insensitively; later duplicates replace earlier ones.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .fold(Self::new(), |md, (k, v)| md.with(k.as_ref(), v))
    }

    /// Return a copy with `key` set to `value`
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = key.to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any signing entry is present
    pub fn is_signed(&self) -> bool {
        self.get(SENDER).is_some() || self.get(NONCE).is_some() || self.get(SIGNATURE).is_some()
    }

    /// Value a response to this call is bound to: the call's nonce, or its
    /// request id when the call was not signed
    pub fn response_binding(&self) -> Option<&str> {
        self.get(NONCE)
            .filter(|n| !n.is_empty())
            .or_else(|| self.get(REQUEST_ID).filter(|id| !id.is_empty()))
    }

    /// Merge `other` into this metadata, `other` winning on conflicts
    pub fn merge(self, other: &CallMetadata) -> Self {
        other.iter().fold(self, |md, (k, v)| md.with(k, v))
    }
}

/// Everything attached to one outbound call. Built fresh for each call and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub request_id: RequestId,
    pub operation: String,
    pub metadata: CallMetadata,
}
