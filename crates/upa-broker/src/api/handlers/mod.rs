//! API request handlers

pub mod ping;
pub mod transports;

pub use ping::{ping, PingResponse};
pub use transports::{
    clear_transports, list_transports, request_transport, view_transport, ClearTransportsResponse,
    RequestTransportRequest, RequestTransportResponse,
};

use std::sync::Arc;

use crate::api::auth::CallAuth;
use crate::config::BrokerConfig;
use crate::core::Broker;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    pub broker: Arc<Broker>,
    /// Signing identity and inbound call policy
    pub auth: Arc<CallAuth>,
    pub config: BrokerConfig,
}
