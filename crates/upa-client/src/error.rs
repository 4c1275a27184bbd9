//! Error types for the Transporter gateway

use thiserror::Error;
use upa_core::{AuthError, DirectoryFault, TransporterFault};

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors a gateway call can end in
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Business fault raised by the Transporter, propagated unchanged
    #[error(transparent)]
    Remote(#[from] TransporterFault),

    /// Timeout, refused connection or unresolvable address
    #[error("transporter '{transporter}' unreachable: {reason}")]
    Unreachable { transporter: String, reason: String },

    /// The response was not signed by the Transporter we called
    #[error("response authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// The Transporter answered with something outside the contract
    #[error("protocol error from '{transporter}': {reason}")]
    Protocol { transporter: String, reason: String },
}

impl GatewayError {
    /// Whether the Transporter produced a reply at all
    pub fn is_reply(&self) -> bool {
        matches!(self, GatewayError::Remote(_))
    }

    pub(crate) fn unreachable(transporter: &str, reason: impl ToString) -> Self {
        GatewayError::Unreachable {
            transporter: transporter.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn protocol(transporter: &str, reason: impl ToString) -> Self {
        GatewayError::Protocol {
            transporter: transporter.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<(&str, DirectoryFault)> for GatewayError {
    fn from((transporter, fault): (&str, DirectoryFault)) -> Self {
        GatewayError::unreachable(transporter, fault)
    }
}
