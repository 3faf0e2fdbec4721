//! Error types for the hub
//!
//! Store outages never surface here: they degrade to misses inside the
//! store layer. What remains are caller mistakes and startup failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Hub Error Enum ==
/// Unified error type for the cache and notification core.
#[derive(Error, Debug)]
pub enum HubError {
    /// Raw cache key rejected before any I/O
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Malformed request data (pattern, audience, payload)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A connection id was registered twice
    #[error("Connection already registered: {0}")]
    DuplicateConnection(String),

    /// Value could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Store could not be reached while building a client
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = match &self {
            HubError::InvalidKey(_) | HubError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            HubError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HubError::DuplicateConnection(_) => StatusCode::CONFLICT,
            HubError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HubError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the hub.
pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_is_bad_request() {
        let response = HubError::InvalidKey("empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_duplicate_connection_is_conflict() {
        let response = HubError::DuplicateConnection("abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_serde_error_converts() {
        let err = serde_json::from_str::<u32>("not a number").unwrap_err();
        assert!(matches!(HubError::from(err), HubError::Serialization(_)));
    }
}
