//! Avatar client error types.

use thiserror::Error;

/// Result type for avatar client operations.
pub type AvatarResult<T> = Result<T, AvatarError>;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Unrecognized response shape: {raw}")]
    InvalidResponse { raw: serde_json::Value },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
