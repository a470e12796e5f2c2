//! Project directory layout and first-use scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use reel_models::{ProjectSettings, RollKind};

use crate::error::{LedgerError, LedgerResult};

/// Filesystem context for one project.
///
/// All per-project paths derive from a root directory and the project key;
/// nothing here reads ambient global state, so the core components stay
/// testable against a temp directory.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    root: PathBuf,
    project: String,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            project: project.into(),
        }
    }

    /// Build a context from loaded settings, using the settings slug as the
    /// project key.
    pub fn from_settings(root: impl Into<PathBuf>, settings: &ProjectSettings) -> Self {
        Self::new(root, settings.slug())
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-project configuration directory.
    pub fn config_dir(&self) -> PathBuf {
        self.root
            .join("config")
            .join("user_data")
            .join(&self.project)
    }

    /// Path of the project's status ledger file.
    pub fn ledger_path(&self) -> PathBuf {
        self.config_dir().join("content_status.json")
    }

    /// Directory holding a stream's downloaded and reconciled artifacts.
    pub fn media_dir(&self, kind: RollKind) -> PathBuf {
        self.root.join("media").join(kind.media_subdir())
    }

    /// Path of the shared (project-independent) settings file.
    pub fn settings_path(root: impl AsRef<Path>) -> PathBuf {
        root.as_ref()
            .join("config")
            .join("user_data")
            .join("project_settings.json")
    }

    /// Load project settings from the shared settings file.
    pub fn load_settings(root: impl AsRef<Path>) -> LedgerResult<ProjectSettings> {
        let path = Self::settings_path(&root);
        if !path.exists() {
            return Err(LedgerError::NotFound(path));
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Create the configuration and media directories for first use.
    ///
    /// Safe to call repeatedly.
    pub fn scaffold(&self) -> LedgerResult<()> {
        fs::create_dir_all(self.config_dir())?;
        for kind in RollKind::all() {
            fs::create_dir_all(self.media_dir(kind))?;
        }
        info!(project = %self.project, "Project directories ready");
        Ok(())
    }
}
