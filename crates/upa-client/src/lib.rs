//! # UPA Client
//!
//! Outbound side of the UPA services:
//!
//! - [`DirectoryClient`]: name -> address registry, over HTTP or in memory
//! - [`TransporterGateway`]: signed, correlated calls to one Transporter,
//!   with lazy address resolution and response authentication
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use upa_client::{HttpDirectory, TransporterGateway, TransporterPort};
//!
//! let directory = Arc::new(HttpDirectory::new("http://localhost:9000", http.clone()));
//! let gateway = TransporterGateway::with_directory("UpaTransporter1", directory, signer, http);
//!
//! let offer = gateway.request_job("Lisboa", "Porto", 50).await?;
//! ```

pub mod directory;
pub mod error;
pub mod gateway;

pub use directory::{DirectoryClient, DirectoryEntry, HttpDirectory, MemoryDirectory};
pub use error::{GatewayError, Result};
pub use gateway::{GatewayConnector, TransporterConnector, TransporterGateway, TransporterPort};
