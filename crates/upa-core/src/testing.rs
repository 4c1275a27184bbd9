//! Test seams for exercising the rejection paths of signed calls.
//!
//! Compiled only for tests or with the `test-seams` feature; nothing here is
//! reachable from a production build.

use std::sync::Mutex;

use crate::metadata::{CallMetadata, NONCE};
use crate::nonce::{Nonce, NonceSource};

/// Nonce source that always hands out the same nonce
#[derive(Debug)]
pub struct FixedNonceSource {
    nonce: Nonce,
}

impl FixedNonceSource {
    pub fn new(nonce: Nonce) -> Self {
        Self { nonce }
    }
}

impl NonceSource for FixedNonceSource {
    fn next_nonce(&self) -> Nonce {
        self.nonce.clone()
    }
}

/// Nonce source that replays a scripted sequence, then repeats the last one
#[derive(Debug)]
pub struct ScriptedNonceSource {
    remaining: Mutex<Vec<Nonce>>,
    last: Nonce,
}

impl ScriptedNonceSource {
    /// `nonces` must not be empty
    pub fn new(mut nonces: Vec<Nonce>) -> Self {
        let last = nonces.last().cloned().unwrap_or_else(|| Nonce::new(0, "0"));
        nonces.reverse();
        Self {
            remaining: Mutex::new(nonces),
            last,
        }
    }
}

impl NonceSource for ScriptedNonceSource {
    fn next_nonce(&self) -> Nonce {
        let mut remaining = self
            .remaining
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        remaining.pop().unwrap_or_else(|| self.last.clone())
    }
}

/// Copy of `metadata` with the nonce swapped after signing
pub fn with_nonce(metadata: &CallMetadata, nonce: &Nonce) -> CallMetadata {
    metadata.clone().with(NONCE, nonce.to_string())
}
