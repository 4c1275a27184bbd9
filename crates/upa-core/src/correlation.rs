//! Request correlation
//!
//! Correlation ids tie together the log lines of one logical call across
//! services. They carry no security meaning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::metadata::{CallMetadata, REQUEST_ID};

/// Correlation token carried end to end with a call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mints process-unique request ids and moves them in and out of metadata
#[derive(Debug)]
pub struct RequestCorrelator {
    instance: String,
    next: AtomicU64,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self {
            instance: uuid::Uuid::new_v4().simple().to_string(),
            next: AtomicU64::new(1),
        }
    }

    /// Mint a new id
    pub fn next_id(&self) -> RequestId {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        RequestId(format!("{}-{}", self.instance, seq))
    }

    /// Attach `id` to outbound metadata
    pub fn attach(&self, metadata: CallMetadata, id: &RequestId) -> CallMetadata {
        metadata.with(REQUEST_ID, id.as_str())
    }

    /// Read the id back on the receiving side
    pub fn read(metadata: &CallMetadata) -> Option<RequestId> {
        metadata
            .get(REQUEST_ID)
            .filter(|v| !v.is_empty())
            .map(RequestId::new)
    }

    /// Read the id, or mint one when the caller did not send any
    pub fn read_or_mint(&self, metadata: &CallMetadata) -> RequestId {
        Self::read(metadata).unwrap_or_else(|| self.next_id())
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_attach_and_read() {
        let correlator = RequestCorrelator::new();
        let id = correlator.next_id();
        let md = correlator.attach(CallMetadata::new(), &id);

        assert_eq!(RequestCorrelator::read(&md), Some(id));
        assert_eq!(RequestCorrelator::read(&CallMetadata::new()), None);
    }

    #[test]
    fn test_ids_unique_across_correlators() {
        let a = RequestCorrelator::new();
        let b = RequestCorrelator::new();
        assert_ne!(a.next_id(), b.next_id());
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let correlator = Arc::new(RequestCorrelator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = correlator.clone();
                std::thread::spawn(move || (0..500).map(|_| c.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
