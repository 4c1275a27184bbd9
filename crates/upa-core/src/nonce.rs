//! Nonces and the seen-nonce window
//!
//! A nonce is `<issued-at unix millis>-<random hex>`. The verifier rejects
//! nonces whose timestamp is outside the freshness window, and remembers
//! accepted nonces for at least as long as they could still pass that check,
//! so a nonce is never accepted twice for the same sender.

use chrono::Utc;
use moka::future::Cache;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::AuthError;

/// Random bytes per nonce
const NONCE_RANDOM_BYTES: usize = 16;

/// Single-use freshness token bound to one signed call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce {
    issued_at_ms: i64,
    value: String,
}

impl Nonce {
    pub fn new(issued_at_ms: i64, value: impl Into<String>) -> Self {
        Self {
            issued_at_ms,
            value: value.into(),
        }
    }

    pub fn issued_at_ms(&self) -> i64 {
        self.issued_at_ms
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.issued_at_ms, self.value)
    }
}

impl FromStr for Nonce {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, value) = s
            .split_once('-')
            .ok_or_else(|| AuthError::MalformedNonce(s.to_string()))?;
        let issued_at_ms = ts
            .parse::<i64>()
            .map_err(|_| AuthError::MalformedNonce(s.to_string()))?;
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AuthError::MalformedNonce(s.to_string()));
        }
        Ok(Self::new(issued_at_ms, value))
    }
}

/// Source of nonces for outbound signing
pub trait NonceSource: Send + Sync + fmt::Debug {
    fn next_nonce(&self) -> Nonce;
}

/// Production nonce source: current time plus OS randomness
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomNonceSource;

impl NonceSource for RandomNonceSource {
    fn next_nonce(&self) -> Nonce {
        let mut bytes = [0u8; NONCE_RANDOM_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Nonce::new(Utc::now().timestamp_millis(), hex::encode(bytes))
    }
}

/// Nonces recently accepted, per sender
///
/// Entries leave only by expiry, never by size-based eviction. When the
/// window holds `capacity` nonces, new ones are refused until old ones
/// expire.
#[derive(Clone)]
pub struct NonceWindow {
    seen: Cache<(String, String), ()>,
    freshness: Duration,
    capacity: u64,
}

impl fmt::Debug for NonceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonceWindow")
            .field("freshness", &self.freshness)
            .field("capacity", &self.capacity)
            .field("entries", &self.seen.entry_count())
            .finish()
    }
}

impl NonceWindow {
    /// `freshness` bounds clock skew in either direction; entries are kept
    /// for twice that long, which covers the whole acceptance interval.
    pub fn new(freshness: Duration, capacity: u64) -> Self {
        Self {
            seen: Cache::builder().time_to_live(freshness * 2).build(),
            freshness,
            capacity,
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Reject nonces issued outside `now ± freshness`
    pub fn check_fresh(&self, sender: &str, nonce: &Nonce, now_ms: i64) -> Result<(), AuthError> {
        let window_ms = i64::try_from(self.freshness.as_millis()).unwrap_or(i64::MAX);
        let age = now_ms.saturating_sub(nonce.issued_at_ms());
        if age.saturating_abs() > window_ms {
            warn!(sender = %sender, nonce = %nonce, age_ms = age, "Stale nonce rejected");
            return Err(AuthError::StaleNonce {
                sender: sender.to_string(),
                nonce: nonce.to_string(),
            });
        }
        Ok(())
    }

    /// Record `nonce` for `sender`; fails if it was already recorded, or if
    /// the window is full.
    ///
    /// Check and insert are a single atomic step, so among concurrent
    /// callers presenting the same nonce exactly one succeeds.
    pub async fn record(&self, sender: &str, nonce: &Nonce) -> Result<(), AuthError> {
        let key = (sender.to_string(), nonce.to_string());

        if !self.seen.contains_key(&key) && !self.has_room().await {
            warn!(sender = %sender, capacity = self.capacity, "SECURITY: nonce window full, call refused");
            return Err(AuthError::WindowFull {
                sender: sender.to_string(),
            });
        }

        let entry = self.seen.entry(key).or_insert(()).await;
        if entry.is_fresh() {
            Ok(())
        } else {
            warn!(sender = %sender, nonce = %nonce, "SECURITY: replayed nonce rejected");
            Err(AuthError::ReplayDetected {
                sender: sender.to_string(),
                nonce: nonce.to_string(),
            })
        }
    }

    /// The entry count lags behind inserts and expiries; settle it before
    /// refusing.
    async fn has_room(&self) -> bool {
        if self.seen.entry_count() < self.capacity {
            return true;
        }
        self.seen.run_pending_tasks().await;
        self.seen.entry_count() < self.capacity
    }

    /// Current number of remembered nonces (approximate)
    pub fn len(&self) -> u64 {
        self.seen.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
