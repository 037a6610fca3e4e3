//! Error types for every layer of the fan-out system.
//!
//! [`RealtimeError`] is the server-side error and maps to an HTTP status
//! and structured JSON body. The remaining enums belong to the client side
//! and never reach UI code directly: they are logged or surfaced through
//! the dispatcher's `connect_error` channel.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: unknown audience",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category       | HTTP Status               |
/// |-----------|----------------|---------------------------|
/// | 1000–1999 | Validation     | 400 Bad Request           |
/// | 2000–2999 | Authentication | 401 / 403                 |
/// | 3000–3999 | Server         | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Envelope in a request body could not be decoded.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] DecodeError),

    /// Missing or unknown bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Token is valid but does not grant the requested client type.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Interaction log failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RealtimeError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidEnvelope(_) => 1002,
            Self::Unauthorized(_) => 2001,
            Self::Forbidden(_) => 2002,
            Self::PersistenceError(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidEnvelope(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RealtimeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Failure to turn a wire frame into a typed envelope.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Frame is not valid JSON or has the wrong top-level shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame has no `type` field.
    #[error("frame has no type")]
    MissingType,

    /// Payload does not match the shape its type requires.
    #[error("invalid payload for {event_type}: {reason}")]
    InvalidPayload {
        /// Wire type of the rejected frame.
        event_type: String,
        /// Why validation failed.
        reason: String,
    },
}

/// Failure of the client's persisted key-value storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document is not valid JSON of the expected shape.
    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to open a client transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Endpoint URL or handshake headers are unusable.
    #[error("invalid endpoint: {0}")]
    InvalidUrl(String),

    /// Server refused or broke the handshake (includes auth rejection).
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Handshake did not complete within the configured timeout.
    #[error("connection timed out after {0} ms")]
    Timeout(u64),

    /// No connector is configured for any preferred transport.
    #[error("no transport available")]
    NoConnector,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            RealtimeError::Unauthorized("no token".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            RealtimeError::Forbidden("not admin".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            RealtimeError::InvalidEnvelope(DecodeError::MissingType).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn error_codes_are_distinct() {
        let codes = [
            RealtimeError::InvalidRequest(String::new()).error_code(),
            RealtimeError::InvalidEnvelope(DecodeError::MissingType).error_code(),
            RealtimeError::Unauthorized(String::new()).error_code(),
            RealtimeError::Forbidden(String::new()).error_code(),
            RealtimeError::PersistenceError(String::new()).error_code(),
            RealtimeError::Internal(String::new()).error_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn transport_error_messages() {
        assert_eq!(
            TransportError::Timeout(20_000).to_string(),
            "connection timed out after 20000 ms"
        );
    }
}
