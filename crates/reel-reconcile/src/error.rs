//! Reconciliation error types.

use thiserror::Error;

use reel_ledger::LedgerError;
use reel_models::RollKind;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Segment {segment_id} is not tracked in the {stream} stream")]
    SegmentNotFound { stream: RollKind, segment_id: String },

    #[error("Segment {0} has no job id to reconcile against")]
    MissingPromptId(String),

    #[error("Segment id {0} does not carry an index")]
    MalformedSegmentId(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
