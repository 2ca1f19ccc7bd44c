//! Session configuration
//!
//! Loaded from a JSON file; every field is optional.
//!
//! ```json
//! {
//!   "patch_suffix": ".patches",
//!   "legacy_patch_suffix": ".patch.json",
//!   "backup_suffix": ".bak",
//!   "scenario_definition": "/data/scenario.xml",
//!   "incremental_replay": false
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::patch_file::PatchPaths;

use super::errors::{SessionError, SessionResult};

/// Where patch files live and how overlays replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Appended to the log path to name the patch file
    #[serde(default = "default_patch_suffix")]
    pub patch_suffix: String,

    /// Appended to the log path to name the legacy patch file
    #[serde(default = "default_legacy_patch_suffix")]
    pub legacy_patch_suffix: String,

    /// Appended to the legacy path when it is moved aside
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,

    /// Scenario definition handed to the roll-up engine
    #[serde(default)]
    pub scenario_definition: Option<PathBuf>,

    /// Extend the last patched view for single edits instead of replaying
    #[serde(default)]
    pub incremental_replay: bool,
}

fn default_patch_suffix() -> String {
    ".patches".to_string()
}
fn default_legacy_patch_suffix() -> String {
    ".patch.json".to_string()
}
fn default_backup_suffix() -> String {
    ".bak".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            patch_suffix: default_patch_suffix(),
            legacy_patch_suffix: default_legacy_patch_suffix(),
            backup_suffix: default_backup_suffix(),
            scenario_definition: None,
            incremental_replay: false,
        }
    }
}

impl SessionConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> SessionResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SessionError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: SessionConfig = serde_json::from_str(&content)
            .map_err(|e| SessionError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Suffixes must be non-empty and pairwise distinct.
    pub fn validate(&self) -> SessionResult<()> {
        let suffixes = [
            ("patch_suffix", &self.patch_suffix),
            ("legacy_patch_suffix", &self.legacy_patch_suffix),
            ("backup_suffix", &self.backup_suffix),
        ];
        for (name, value) in suffixes {
            if value.trim().is_empty() {
                return Err(SessionError::Config(format!("{} must not be empty", name)));
            }
        }
        if self.patch_suffix == self.legacy_patch_suffix {
            return Err(SessionError::Config(
                "patch_suffix and legacy_patch_suffix must differ".to_string(),
            ));
        }
        // The backup path is derived from the legacy one.
        if format!("{}{}", self.legacy_patch_suffix, self.backup_suffix) == self.patch_suffix {
            return Err(SessionError::Config(
                "backup path would collide with the patch file".to_string(),
            ));
        }
        Ok(())
    }

    /// Patch file locations for the log at `log_path`
    pub fn patch_paths(&self, log_path: &Path) -> PatchPaths {
        PatchPaths::new(
            log_path,
            &self.patch_suffix,
            &self.legacy_patch_suffix,
            &self.backup_suffix,
        )
    }
}
