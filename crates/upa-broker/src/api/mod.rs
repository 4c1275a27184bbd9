//! API module for the Broker server

pub mod auth;
pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use handlers::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub broker: String,
    pub public_url: String,
    pub transporters: Vec<String>,
    pub transport_count: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        broker: state.broker.name().to_string(),
        public_url: state.config.public_url.clone(),
        transporters: state.broker.known_transporters(),
        transport_count: state.broker.transport_count().await,
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Signed call protocol; sign_response is outermost so rejections are
    // signed as well
    let v1 = Router::new()
        .route("/v1/ping/{name}", get(handlers::ping))
        .route(
            "/v1/transports",
            get(handlers::list_transports)
                .post(handlers::request_transport)
                .delete(handlers::clear_transports),
        )
        .route("/v1/transports/{id}", get(handlers::view_transport))
        .route_layer(from_fn_with_state(state.auth.clone(), auth::verify_request))
        .route_layer(from_fn_with_state(state.auth.clone(), auth::sign_response));

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .merge(v1)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
