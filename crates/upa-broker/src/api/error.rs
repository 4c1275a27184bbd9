//! API error types and responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use upa_core::{AuthError, BrokerFault};

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Fault(#[from] BrokerFault),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<serde_json::Value>) {
        let fault = match self {
            ApiError::BadRequest(_) => return (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::Internal(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None),
            ApiError::Fault(fault) => fault,
        };

        let (status, details) = match fault {
            BrokerFault::UnknownLocation { location } => {
                (StatusCode::BAD_REQUEST, Some(json!({ "location": location })))
            }
            BrokerFault::InvalidPrice { price } => {
                (StatusCode::BAD_REQUEST, Some(json!({ "price": price })))
            }
            BrokerFault::UnavailableTransport { origin, destination } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Some(json!({ "origin": origin, "destination": destination })),
            ),
            BrokerFault::UnavailableTransportPrice { price } => {
                (StatusCode::CONFLICT, Some(json!({ "price": price })))
            }
            BrokerFault::UnknownTransport { id } => {
                (StatusCode::NOT_FOUND, Some(json!({ "id": id })))
            }
            BrokerFault::Authentication(_) => (StatusCode::UNAUTHORIZED, None),
            BrokerFault::Directory(_) => (StatusCode::BAD_GATEWAY, None),
            BrokerFault::TransporterUnreachable { transporter, .. } => {
                (StatusCode::BAD_GATEWAY, Some(json!({ "transporter": transporter })))
            }
        };
        (status, fault.code(), details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = self.parts();

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Fault(BrokerFault::Authentication(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_status_and_code() {
        let err = ApiError::from(BrokerFault::UnknownTransport { id: "UpaBroker-9".into() });
        let (status, code, details) = err.parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "UNKNOWN_TRANSPORT");
        assert_eq!(details.unwrap()["id"], "UpaBroker-9");
    }

    #[test]
    fn test_auth_error_is_unauthorized() {
        let err = ApiError::from(AuthError::MissingMetadata("x-upa-nonce"));
        let (status, code, _) = err.parts();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "AUTHENTICATION");
    }

    #[test]
    fn test_bad_request_code() {
        let (status, code, details) = ApiError::BadRequest("missing field".into()).parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
        assert!(details.is_none());
    }
}
