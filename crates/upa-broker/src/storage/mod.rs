//! Storage of brokered jobs
//!
//! The Broker's only durable state is the mapping from its own transport ids
//! to the Transporter that carries each job. Records are inserted when an
//! offer is confirmed and removed only by a bulk clear.

pub mod memory;

pub use memory::MemoryJobStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use upa_core::{Region, TransportState, TransportView};

/// A transport the Broker booked on a client's behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    /// Broker-side identifier handed to the client
    pub id: String,
    /// Allocation order, used to list records by creation
    pub seq: u64,
    /// Transporter carrying out the job
    pub transporter: String,
    /// Transporter-side job identifier
    pub job_id: String,
    pub origin: Region,
    pub destination: Region,
    /// Agreed price
    pub price: i64,
    /// Last state observed
    pub state: TransportState,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// Client-facing view of this record
    pub fn view(&self) -> TransportView {
        TransportView {
            id: self.id.clone(),
            origin: self.origin,
            destination: self.destination,
            price: self.price,
            transporter: self.transporter.clone(),
            state: self.state,
        }
    }
}

/// Backend for job records
///
/// Implementations must be safe for concurrent use.
#[async_trait]
pub trait JobStore: Send + Sync + Debug {
    /// Store a new record, replacing any record with the same id
    async fn insert(&self, record: JobRecord);

    async fn get(&self, id: &str) -> Option<JobRecord>;

    /// Update the cached state of a record. Returns false if it is gone.
    async fn update_state(&self, id: &str, state: TransportState) -> bool;

    /// All records, oldest first
    async fn list(&self) -> Vec<JobRecord>;

    /// Remove every record, returning how many were dropped
    async fn clear(&self) -> usize;

    async fn count(&self) -> usize;
}
