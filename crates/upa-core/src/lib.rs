//! # UPA Core
//!
//! Shared building blocks for the UPA transport broker and the services it
//! talks to.
//!
//! ## Key Concepts
//!
//! - **Region**: closed set of locations goods can travel between
//! - **Faults**: the small, stable set of failure kinds clients see
//! - **SignatureHandler**: signs outbound calls and authenticates inbound ones
//! - **Nonce window**: per-sender memory of accepted nonces that defeats replay
//! - **RequestCorrelator**: correlation ids for tracing a call across services
//!
//! ## Call authentication
//!
//! 1. The caller signs `canonical(operation, body) ‖ nonce` with its private key
//! 2. The callee fetches the caller's certificate by the claimed name
//! 3. The callee verifies the signature, then rejects stale or repeated nonces

pub mod canonical;
pub mod certs;
pub mod correlation;
pub mod crypto;
pub mod error;
pub mod fault;
pub mod metadata;
pub mod nonce;
pub mod region;
pub mod signature;
#[cfg(any(test, feature = "test-seams"))]
pub mod testing;
pub mod types;

pub use certs::{CertificateStore, FileCertificateStore, MemoryCertificateStore};
pub use correlation::{RequestCorrelator, RequestId};
pub use crypto::{Certificate, KeyPair, PublicKey};
pub use error::{AuthError, Result, UpaError};
pub use fault::{BrokerFault, DirectoryFault, TransporterFault};
pub use metadata::{CallContext, CallMetadata};
pub use nonce::{Nonce, NonceSource, NonceWindow, RandomNonceSource};
pub use region::{Region, Zone};
pub use signature::{SignatureConfig, SignatureHandler, VerifiedSender};
pub use types::{JobDecision, JobOffer, JobRequest, JobState, JobView, TransportState, TransportView};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
