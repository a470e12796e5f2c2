//! Progress tracker error types.

use thiserror::Error;

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Not connected to the render backend")]
    NotConnected,

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
