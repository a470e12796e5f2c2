//! Progress events from push-based generation backends.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single progress update for a generation job.
///
/// Transient: events only exist for the lifetime of the connection that
/// produced them and are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    /// Backend job identifier the event is addressed to.
    pub job_id: String,
    /// Fractional completion in `[0, 1]`, when the backend reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Human-readable status text, when the backend reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ProgressEvent {
    /// Create a progress update. The fraction is clamped into `[0, 1]`.
    pub fn progress(job_id: impl Into<String>, fraction: f64) -> Self {
        Self {
            job_id: job_id.into(),
            progress: Some(fraction.clamp(0.0, 1.0)),
            status: None,
        }
    }

    /// Create a status-only update.
    pub fn status(job_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            progress: None,
            status: Some(status.into()),
        }
    }

    /// Create a completion event (fraction 1.0, status "complete").
    pub fn complete(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            progress: Some(1.0),
            status: Some("complete".into()),
        }
    }

    /// Whether this event marks the job as finished.
    pub fn is_complete(&self) -> bool {
        self.progress == Some(1.0) || self.status.as_deref() == Some("complete")
    }
}
