//! Ledger error types.

use std::path::PathBuf;

use thiserror::Error;

use reel_models::SegmentStatus;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger and identifier-map operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No ledger found at {0}")]
    NotFound(PathBuf),

    #[error("File does not exist: {0}")]
    FileMissing(PathBuf),

    #[error("Identifier conflict: {short} already maps to {existing}")]
    IdConflict { short: String, existing: String },

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("File {path} is already claimed by {segment_id}")]
    DuplicateFilePath { path: String, segment_id: String },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SegmentStatus,
        to: SegmentStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to replace ledger file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
