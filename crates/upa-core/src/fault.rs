//! Client-visible fault kinds
//!
//! Faults are plain values: every failure builds its own instance carrying
//! the input that caused it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AuthError;

/// Faults raised by a Transporter service for a single call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransporterFault {
    #[error("bad location: {location}")]
    BadLocation { location: String },

    #[error("bad price: {price}")]
    BadPrice { price: i64 },

    #[error("bad job: {id}")]
    BadJob { id: String },
}

/// Faults raised by the directory service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryFault {
    #[error("name not found in directory: {0}")]
    NotFound(String),

    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Faults returned by the Broker to its clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerFault {
    /// Origin or destination is not a known region, or they are the same
    #[error("unknown location: {location}")]
    UnknownLocation { location: String },

    /// Negative price, or no offer fits under the ceiling
    #[error("invalid price: {price}")]
    InvalidPrice { price: i64 },

    /// No Transporter replied at all
    #[error("no transport available from {origin} to {destination}")]
    UnavailableTransport { origin: String, destination: String },

    /// The selected offer could not be confirmed
    #[error("selected transport at price {price} is no longer available")]
    UnavailableTransportPrice { price: i64 },

    #[error("unknown transport: {id}")]
    UnknownTransport { id: String },

    #[error("authentication fault: {0}")]
    Authentication(#[from] AuthError),

    /// Discovery failed and no Transporter was known to fall back on
    #[error("directory fault: {0}")]
    Directory(#[from] DirectoryFault),

    /// Wire code only. The Broker itself answers for unreachable
    /// Transporters with `UnavailableTransport`, `UnavailableTransportPrice`
    /// or the cached transport state.
    #[error("transporter '{transporter}' unreachable: {reason}")]
    TransporterUnreachable { transporter: String, reason: String },
}

impl BrokerFault {
    /// Stable wire code for this fault kind
    pub fn code(&self) -> &'static str {
        match self {
            BrokerFault::UnknownLocation { .. } => "UNKNOWN_LOCATION",
            BrokerFault::InvalidPrice { .. } => "INVALID_PRICE",
            BrokerFault::UnavailableTransport { .. } => "UNAVAILABLE_TRANSPORT",
            BrokerFault::UnavailableTransportPrice { .. } => "UNAVAILABLE_TRANSPORT_PRICE",
            BrokerFault::UnknownTransport { .. } => "UNKNOWN_TRANSPORT",
            BrokerFault::Authentication(_) => "AUTHENTICATION",
            BrokerFault::Directory(_) => "DIRECTORY",
            BrokerFault::TransporterUnreachable { .. } => "TRANSPORTER_UNREACHABLE",
        }
    }
}
