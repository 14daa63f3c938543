//! Error types for the cache node
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache node.
///
/// Store-level variants are returned synchronously to callers. Replication
/// variants (`PeerConnect`, `RemoteOperation`, `Transport`) are logged and
/// absorbed by the replication layer and never surface through the store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Missing or invalid key/value on a mutation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Store built with a capacity its policy cannot honor
    #[error("Invalid capacity {0}: capacity must be at least 1")]
    InvalidCapacity(usize),

    /// Outbound peer connection attempt failed
    #[error("Failed to connect to peer {address}: {reason}")]
    PeerConnect { address: String, reason: String },

    /// Malformed or inapplicable operation received from a peer
    #[error("Remote operation rejected: {0}")]
    RemoteOperation(String),

    /// Underlying peer connection failure
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::InvalidCapacity(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::PeerConnect { .. }
            | CacheError::RemoteOperation(_)
            | CacheError::Transport(_) => StatusCode::BAD_GATEWAY,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache node.
pub type Result<T> = std::result::Result<T, CacheError>;
