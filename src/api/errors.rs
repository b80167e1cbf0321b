//! API Error Handling
//!
//! Protocol errors keep the provider's body shape; the request id travels in
//! the `x-request-id` header only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::protocol::ProtocolError;

/// API error types with request tracking
#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    /// Rejected before reaching the engine
    Protocol(ProtocolError),
    InternalError(String),
}

/// Body used for operator endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub request_id: String,
    pub message: String,
}

impl ApiError {
    pub fn protocol(request_id: String, err: ProtocolError) -> Self {
        Self {
            kind: ApiErrorKind::Protocol(err),
            request_id,
        }
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::InternalError(message),
            request_id,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::Protocol(err) => write!(f, "[{}] {}", self.request_id, err),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.kind {
            ApiErrorKind::Protocol(err) => {
                let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
                (status, Json(err.body())).into_response()
            }
            ApiErrorKind::InternalError(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    request_id: self.request_id,
                    message,
                }),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_keep_their_status() {
        let response = ApiError::protocol("req-1".to_string(), ProtocolError::InvalidSignature).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::protocol("req-2".to_string(), ProtocolError::MissingSignature).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::protocol("req-3".to_string(), ProtocolError::MalformedBody("eof".to_string()))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_error_is_500() {
        let response = ApiError::internal_error("req-4".to_string(), "encoder".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
