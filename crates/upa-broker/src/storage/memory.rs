//! In-memory job store
//!
//! Data is lost on restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use upa_core::TransportState;

use super::{JobRecord, JobStore};

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, record: JobRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        info!(
            id = %record.id,
            transporter = %record.transporter,
            job_id = %record.job_id,
            price = record.price,
            "Recording transport"
        );
        records.insert(record.id.clone(), record);
    }

    async fn get(&self, id: &str) -> Option<JobRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(id).cloned()
    }

    async fn update_state(&self, id: &str, state: TransportState) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(id) {
            Some(record) => {
                if record.state != state {
                    debug!(id = %id, from = %record.state, to = %state, "Transport state changed");
                    record.state = state;
                }
                true
            }
            None => false,
        }
    }

    async fn list(&self) -> Vec<JobRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<JobRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| r.seq);
        all
    }

    async fn clear(&self) -> usize {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let dropped = records.len();
        records.clear();
        info!(count = dropped, "Cleared transports");
        dropped
    }

    async fn count(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
