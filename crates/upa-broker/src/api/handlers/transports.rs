//! Transport Handlers
//!
//! Booking, viewing, listing and clearing brokered transports.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use upa_core::{RequestId, TransportView};

use crate::api::error::ApiError;
use crate::api::handlers::AppState;

/// Request to book a transport
#[derive(Debug, Deserialize, Serialize)]
pub struct RequestTransportRequest {
    pub origin: String,
    pub destination: String,
    /// Highest price the client accepts
    pub price: i64,
}

/// Response to a booking
#[derive(Debug, Deserialize, Serialize)]
pub struct RequestTransportResponse {
    /// Broker-side transport id
    pub id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClearTransportsResponse {
    pub cleared: usize,
}

/// Book the cheapest transport under the requested price
///
/// POST /v1/transports
pub async fn request_transport(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<RequestTransportRequest>, JsonRejection>,
) -> Result<Json<RequestTransportResponse>, ApiError> {
    let Json(request) = payload?;

    let id = state
        .broker
        .request_transport(&request.origin, &request.destination, request.price)
        .await?;

    info!(
        request_id = %request_id,
        id = %id,
        origin = %request.origin,
        destination = %request.destination,
        "Transport booked"
    );

    Ok(Json(RequestTransportResponse { id }))
}

/// GET /v1/transports/{id}
pub async fn view_transport(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TransportView>, ApiError> {
    Ok(Json(state.broker.view_transport(&id).await?))
}

/// GET /v1/transports
pub async fn list_transports(State(state): State<Arc<AppState>>) -> Json<Vec<TransportView>> {
    Json(state.broker.list_transports().await)
}

/// DELETE /v1/transports
pub async fn clear_transports(State(state): State<Arc<AppState>>) -> Json<ClearTransportsResponse> {
    let cleared = state.broker.clear_transports().await;
    Json(ClearTransportsResponse { cleared })
}
