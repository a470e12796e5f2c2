//! Shared data models for the Reelsmith pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Segment records and the per-project content status ledger
//! - Progress events from push-based generation backends
//! - Project settings supplied by the front end

pub mod progress;
pub mod segment;
pub mod settings;

// Re-export common types
pub use progress::ProgressEvent;
pub use segment::{
    segment_id, segment_index, ContentStatus, ParseRollKindError, RollKind, SegmentPatch,
    SegmentRecord, SegmentStatus,
};
pub use settings::ProjectSettings;
