//! Patch file locations
//!
//! Every path is derived from the log path by appending a suffix.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The files one session's patches may live in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchPaths {
    patch: PathBuf,
    legacy: PathBuf,
    backup: PathBuf,
    temp: PathBuf,
}

impl PatchPaths {
    /// Paths for the log at `log_path`
    pub fn new(log_path: &Path, patch_suffix: &str, legacy_suffix: &str, backup_suffix: &str) -> Self {
        let patch = with_suffix(log_path, patch_suffix);
        let legacy = with_suffix(log_path, legacy_suffix);
        Self {
            temp: with_suffix(&patch, ".tmp"),
            backup: with_suffix(&legacy, backup_suffix),
            patch,
            legacy,
        }
    }

    /// Current record-format patch file
    pub fn patch(&self) -> &Path {
        &self.patch
    }

    /// Legacy JSON-lines patch file, read when the current one is absent
    pub fn legacy(&self) -> &Path {
        &self.legacy
    }

    /// Where the legacy file is moved once superseded
    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Scratch file for atomic writes
    pub fn temp(&self) -> &Path {
        &self.temp
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
