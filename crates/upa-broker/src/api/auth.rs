//! Call authentication middleware
//!
//! `verify_request` authenticates signed inbound calls before any handler
//! runs. `sign_response` signs every reply so the caller can check it came
//! from us. Both can be mounted on any router that speaks the signed call
//! protocol.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

use upa_core::metadata::{operation, response_operation, REQUEST_ID};
use upa_core::{CallMetadata, RequestCorrelator, SignatureHandler};

use crate::api::error::ApiError;

/// Largest request or response body buffered for signing
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Identity and policy used by the middleware
#[derive(Debug)]
pub struct CallAuth {
    pub signer: Arc<SignatureHandler>,
    pub correlator: Arc<RequestCorrelator>,
    /// Reject calls that carry no signature at all
    pub require_signed_requests: bool,
}

impl CallAuth {
    pub fn new(signer: Arc<SignatureHandler>, require_signed_requests: bool) -> Self {
        Self {
            signer,
            correlator: Arc::new(RequestCorrelator::new()),
            require_signed_requests,
        }
    }
}

fn header_metadata(headers: &HeaderMap) -> CallMetadata {
    CallMetadata::from_pairs(
        headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v.to_string()))),
    )
}

fn json_body(bytes: &Bytes) -> Result<Value, serde_json::Error> {
    if bytes.is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_slice(bytes)
    }
}

/// Authenticate the inbound call
///
/// Calls carrying signature metadata are always verified. Unsigned calls are
/// let through unless signatures are required. The verified sender and the
/// request id are stored in the request extensions.
pub async fn verify_request(
    State(auth): State<Arc<CallAuth>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let metadata = header_metadata(request.headers());
    let request_id = auth.correlator.read_or_mint(&metadata);
    let op = operation(request.method().as_str(), request.uri().path());
    let span = info_span!(
        "call",
        request_id = %request_id,
        operation = %op,
        sender = tracing::field::Empty
    );

    let (mut parts, body) = request.into_parts();
    parts.extensions.insert(request_id);

    if !metadata.is_signed() && !auth.require_signed_requests {
        let request = Request::from_parts(parts, body);
        return Ok(next.run(request).instrument(span).await);
    }

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Unreadable body: {}", e)))?;
    let payload =
        json_body(&bytes).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;

    let verified = auth
        .signer
        .verify(&metadata, &op, &payload)
        .instrument(span.clone())
        .await
        .map_err(|e| {
            warn!(parent: &span, error = %e, "SECURITY: rejected call");
            ApiError::from(e)
        })?;

    span.record("sender", verified.name.as_str());
    debug!(parent: &span, sender = %verified.name, "Authenticated call");
    parts.extensions.insert(verified);

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).instrument(span).await)
}

/// Sign the response under `"<METHOD> <path> response <binding>"` and echo
/// the request id. The binding is the request's nonce, or the request id for
/// unsigned calls.
pub async fn sign_response(State(auth): State<Arc<CallAuth>>, mut request: Request, next: Next) -> Response {
    let metadata = header_metadata(request.headers());
    let request_id = auth.correlator.read_or_mint(&metadata);
    let binding = metadata
        .with(REQUEST_ID, request_id.as_str())
        .response_binding()
        .unwrap_or_default()
        .to_string();
    let op = response_operation(
        &operation(request.method().as_str(), request.uri().path()),
        &binding,
    );
    // Inner layers and handlers see the same id
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        request.headers_mut().insert(REQUEST_ID, value);
    }

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::Internal(format!("Unreadable response body: {}", e)).into_response();
        }
    };
    let payload = match json_body(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            return ApiError::Internal(format!("Response is not JSON: {}", e)).into_response();
        }
    };

    let signed = auth
        .signer
        .sign(&op, &payload)
        .with(REQUEST_ID, request_id.as_str());
    for (key, value) in signed.iter() {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) {
            parts.headers.insert(name, value);
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}
