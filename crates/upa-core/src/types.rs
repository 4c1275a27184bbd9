//! Job and transport types shared by the Broker and its Transporter clients

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::region::Region;

/// State of a job as reported by a Transporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Proposed,
    Rejected,
    Accepted,
    Heading,
    Ongoing,
    Completed,
}

/// State of a transport as seen by Broker clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportState {
    Requested,
    Budgeted,
    Failed,
    Booked,
    Heading,
    Ongoing,
    Completed,
}

impl From<JobState> for TransportState {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Proposed => TransportState::Budgeted,
            JobState::Rejected => TransportState::Failed,
            JobState::Accepted => TransportState::Booked,
            JobState::Heading => TransportState::Heading,
            JobState::Ongoing => TransportState::Ongoing,
            JobState::Completed => TransportState::Completed,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportState::Requested => "REQUESTED",
            TransportState::Budgeted => "BUDGETED",
            TransportState::Failed => "FAILED",
            TransportState::Booked => "BOOKED",
            TransportState::Heading => "HEADING",
            TransportState::Ongoing => "ONGOING",
            TransportState::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// A job as exchanged with a Transporter service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    /// Name of the Transporter company that owns the job
    pub company: String,
    /// Transporter-side job identifier
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub price: i64,
    pub state: JobState,
}

/// An offer produced by a Transporter for one job request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOffer {
    /// Transporter that issued the offer
    pub transporter: String,
    /// Transporter-side job identifier
    pub job_id: String,
    pub price: i64,
}

impl JobOffer {
    /// Build an offer from the job a Transporter returned
    pub fn from_view(transporter: impl Into<String>, view: &JobView) -> Self {
        Self {
            transporter: transporter.into(),
            job_id: view.id.clone(),
            price: view.price,
        }
    }
}

/// Client-facing view of a brokered transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportView {
    /// Broker-side identifier
    pub id: String,
    pub origin: Region,
    pub destination: Region,
    pub price: i64,
    /// Transporter company carrying out the job
    pub transporter: String,
    pub state: TransportState,
}

/// Body of a job request sent to a Transporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub origin: String,
    pub destination: String,
    pub price: i64,
}

/// Body of a job decision sent to a Transporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDecision {
    pub accept: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_mapping() {
        assert_eq!(TransportState::from(JobState::Proposed), TransportState::Budgeted);
        assert_eq!(TransportState::from(JobState::Rejected), TransportState::Failed);
        assert_eq!(TransportState::from(JobState::Accepted), TransportState::Booked);
        assert_eq!(TransportState::from(JobState::Completed), TransportState::Completed);
    }

    #[test]
    fn test_job_view_wire_format() {
        let view = JobView {
            company: "UpaTransporter1".into(),
            id: "UpaTransporter1-3".into(),
            origin: "Lisboa".into(),
            destination: "Porto".into(),
            price: 42,
            state: JobState::Proposed,
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "PROPOSED");

        let offer = JobOffer::from_view("UpaTransporter1", &view);
        assert_eq!(offer.job_id, "UpaTransporter1-3");
        assert_eq!(offer.price, 42);
    }
}
