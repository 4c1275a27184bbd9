//! Ping Handler

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::handlers::AppState;

#[derive(Debug, Deserialize, Serialize)]
pub struct PingResponse {
    pub message: String,
}

/// Greet the caller and report on every known Transporter
///
/// GET /v1/ping/{name}
pub async fn ping(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Json<PingResponse> {
    Json(PingResponse {
        message: state.broker.ping(&name).await,
    })
}
