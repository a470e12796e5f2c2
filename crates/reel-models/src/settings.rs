//! Project settings supplied by the front end.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Settings for one short-video project.
///
/// Produced by the interactive settings page and passed explicitly to the
/// core components; none of them read ambient global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectSettings {
    /// Display name of the project.
    pub project_name: String,
    /// Target duration of the finished video in seconds.
    pub target_duration: u32,
    /// Number of A-Roll (narration) segments.
    pub aroll_segments: u32,
    /// Number of B-Roll (footage) segments.
    pub broll_segments: u32,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            project_name: "my_project".to_string(),
            target_duration: 60,
            aroll_segments: 4,
            broll_segments: 4,
        }
    }
}

impl ProjectSettings {
    /// Filesystem-safe project key used for per-project directories.
    pub fn slug(&self) -> String {
        self.project_name.to_lowercase().replace(' ', "_")
    }
}
