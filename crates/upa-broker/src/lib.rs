//! UPA Broker Server
//!
//! The Broker books transports on behalf of its clients:
//! - Validates the route and price ceiling before contacting anyone
//! - Asks every known Transporter for a quote, concurrently
//! - Books the cheapest offer under the ceiling and declines the rest
//! - Tracks booked transports and refreshes their state on demand
//!
//! Every call between services is signed, and every response is signed by
//! the service that produced it.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with known Transporters
//! - `GET /v1/ping/{name}` - Greeting plus a ping of every Transporter
//! - `POST /v1/transports` - Book a transport
//! - `GET /v1/transports/{id}` - View a booked transport
//! - `GET /v1/transports` - List booked transports
//! - `DELETE /v1/transports` - Forget all booked transports

pub mod api;
pub mod config;
pub mod core;
pub mod storage;

pub use api::auth::CallAuth;
pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{BrokerConfig, ConfigError};
pub use crate::core::Broker;
pub use storage::{JobRecord, JobStore, MemoryJobStore};
