//! Segment records and the per-project content status ledger shape.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which footage stream a segment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RollKind {
    /// Primary narration stream, produced by the talking-avatar backend.
    Aroll,
    /// Supplementary footage stream, produced by the diffusion backend.
    Broll,
}

impl RollKind {
    /// Get string representation (matches the ledger's stream keys).
    pub fn as_str(&self) -> &'static str {
        match self {
            RollKind::Aroll => "aroll",
            RollKind::Broll => "broll",
        }
    }

    /// Subdirectory of the media root holding this stream's artifacts.
    pub fn media_subdir(&self) -> &'static str {
        match self {
            RollKind::Aroll => "a-roll",
            RollKind::Broll => "b-roll",
        }
    }

    /// Filename prefix the generation backend uses for downloaded artifacts.
    pub fn backend_prefix(&self) -> &'static str {
        match self {
            RollKind::Aroll => "avatar",
            RollKind::Broll => "render",
        }
    }

    /// Both streams, in ledger order.
    pub fn all() -> [RollKind; 2] {
        [RollKind::Aroll, RollKind::Broll]
    }
}

impl std::fmt::Display for RollKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error parsing a stream name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stream: {0}")]
pub struct ParseRollKindError(String);

impl std::str::FromStr for RollKind {
    type Err = ParseRollKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aroll" => Ok(RollKind::Aroll),
            "broll" => Ok(RollKind::Broll),
            other => Err(ParseRollKindError(other.to_string())),
        }
    }
}

/// Generation lifecycle of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// No generation job exists for the segment yet
    #[default]
    Unassigned,
    /// A job identifier has been assigned
    Assigned,
    /// The backend is generating the segment
    Processing,
    /// Generation finished and the artifact is available
    Complete,
    /// Generation failed; the segment may be retried
    Failed,
}

impl SegmentStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Unassigned => "unassigned",
            SegmentStatus::Assigned => "assigned",
            SegmentStatus::Processing => "processing",
            SegmentStatus::Complete => "complete",
            SegmentStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentStatus::Complete | SegmentStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            SegmentStatus::Unassigned => 0,
            SegmentStatus::Assigned => 1,
            SegmentStatus::Processing => 2,
            SegmentStatus::Complete => 3,
            SegmentStatus::Failed => 3,
        }
    }

    /// Whether moving to `next` respects the lifecycle.
    ///
    /// Transitions are forward-only, with one exception: a failed segment may
    /// be moved back to `Assigned` for a retry.
    pub fn can_transition_to(&self, next: SegmentStatus) -> bool {
        if *self == next {
            return true;
        }
        if *self == SegmentStatus::Failed && next == SegmentStatus::Assigned {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl std::fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked segment of a stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentRecord {
    /// Backend job identifier; may be the short or the full form.
    #[serde(default)]
    pub prompt_id: String,
    /// Current generation status.
    #[serde(default)]
    pub status: SegmentStatus,
    /// Absolute path of the reconciled artifact; empty until reconciliation succeeds.
    #[serde(default)]
    pub file_path: String,
    /// Fields written by other tools; preserved across a load/save round trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Partial update applied to a segment record. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct SegmentPatch {
    pub prompt_id: Option<String>,
    pub status: Option<SegmentStatus>,
    pub file_path: Option<String>,
}

impl SegmentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt_id(mut self, id: impl Into<String>) -> Self {
        self.prompt_id = Some(id.into());
        self
    }

    pub fn status(mut self, status: SegmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Merge the supplied fields into `record`, returning whether anything changed.
    pub fn apply(&self, record: &mut SegmentRecord) -> bool {
        let mut changed = false;
        if let Some(id) = &self.prompt_id {
            if record.prompt_id != *id {
                record.prompt_id = id.clone();
                changed = true;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                record.status = status;
                changed = true;
            }
        }
        if let Some(path) = &self.file_path {
            if record.file_path != *path {
                record.file_path = path.clone();
                changed = true;
            }
        }
        changed
    }
}

/// Aggregate ledger document for a project: stream -> segment id -> record.
///
/// Persisted as a single JSON file; both stream keys are always present after
/// normalization, even when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentStatus {
    #[serde(default)]
    pub aroll: BTreeMap<String, SegmentRecord>,
    #[serde(default)]
    pub broll: BTreeMap<String, SegmentRecord>,
}

impl ContentStatus {
    /// Get the segment map for a stream.
    pub fn stream(&self, kind: RollKind) -> &BTreeMap<String, SegmentRecord> {
        match kind {
            RollKind::Aroll => &self.aroll,
            RollKind::Broll => &self.broll,
        }
    }

    /// Get the mutable segment map for a stream.
    pub fn stream_mut(&mut self, kind: RollKind) -> &mut BTreeMap<String, SegmentRecord> {
        match kind {
            RollKind::Aroll => &mut self.aroll,
            RollKind::Broll => &mut self.broll,
        }
    }

    /// Look up a single segment record.
    pub fn segment(&self, kind: RollKind, segment_id: &str) -> Option<&SegmentRecord> {
        self.stream(kind).get(segment_id)
    }
}

/// Build the stable local key for a segment (`segment_0`, `segment_1`, ...).
pub fn segment_id(index: usize) -> String {
    format!("segment_{}", index)
}

/// Parse the zero-based index out of a segment id.
pub fn segment_index(segment_id: &str) -> Option<usize> {
    segment_id.strip_prefix("segment_")?.parse().ok()
}
