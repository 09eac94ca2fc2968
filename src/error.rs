//! Error types for the coordination primitives
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Store Error Enum ==
/// Failures reported by a [`Store`](crate::store::Store) implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store could not be reached or refused the call
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within the configured deadline
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    /// The stored value has the wrong shape for the command (e.g. INCR on text)
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The command itself was rejected (key too long, value too large, bad script args)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == Coordination Error Enum ==
/// Unified error type for the lock, limiter and cache components.
#[derive(Error, Debug)]
pub enum CoordError {
    /// Malformed call-site configuration (empty key, zero TTL, zero limit)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Store failure that the calling component does not absorb
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A value could not be encoded for, or decoded from, the store
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoordError {
    fn from(err: serde_json::Error) -> Self {
        CoordError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CoordError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoordError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            CoordError::Store(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            CoordError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            CoordError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the coordination components.
pub type Result<T> = std::result::Result<T, CoordError>;

/// Rejects empty keys and zero TTLs at the call site.
pub(crate) fn ensure_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CoordError::InvalidConfig("key cannot be empty".to_string()));
    }
    Ok(())
}

/// Rejects zero-second TTLs; the store has no notion of "forever" for coordination keys.
pub(crate) fn ensure_ttl(what: &str, ttl_secs: u64) -> Result<()> {
    if ttl_secs == 0 {
        return Err(CoordError::InvalidConfig(format!(
            "{} must be a positive number of seconds",
            what
        )));
    }
    Ok(())
}
