//! Status query result types and response normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Uniform result of a status query, regardless of response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Whether the artifact is ready to download.
    pub ready: bool,
    /// Canonical lowercase status string reported by the backend.
    pub status: String,
    /// Artifact URL, present once the job is ready.
    pub artifact_url: Option<String>,
}

/// Status values the backend uses for a finished, downloadable job.
const READY_STATUSES: &[&str] = &["completed", "ready", "done", "success"];

/// The backend is inconsistent about nesting: depending on API version the
/// payload sits either at the top level or one level under `data`. Each rule
/// extracts from one location; rules are tried in order.
fn extraction_rules(raw: &Value) -> [Option<&Value>; 2] {
    [raw.get("data").filter(|v| v.is_object()), Some(raw)]
}

/// Normalize a raw status response into a `StatusSnapshot`.
///
/// Returns `None` when no rule finds a status field, so the caller can
/// surface the raw payload for diagnostics.
pub fn normalize_response(raw: &Value) -> Option<StatusSnapshot> {
    for candidate in extraction_rules(raw).into_iter().flatten() {
        let Some(status) = candidate.get("status").and_then(Value::as_str) else {
            continue;
        };
        let mut status = status.to_lowercase();
        // Older API versions report "success" where newer ones say "ready".
        if status == "success" {
            status = "ready".to_string();
        }

        let artifact_url = candidate
            .get("video_url")
            .or_else(|| candidate.get("url"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        return Some(StatusSnapshot {
            ready: READY_STATUSES.contains(&status.as_str()),
            status,
            artifact_url,
        });
    }
    None
}
