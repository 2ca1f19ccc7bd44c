//! Patch file store
//!
//! Reads and writes the per-log patch file.
//!
//! - The current format is the session log record format
//! - When the current file is absent, the legacy JSON-lines file is read
//! - Writes go to a temp file, are fsynced, then renamed into place
//! - A superseded legacy file is moved to its backup path, never overwritten

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;

use crate::observability::{Event, Logger};
use crate::session_log::{write_entries, LogEntry, SequencePolicy, SessionLogReader};

use super::errors::{PatchFileError, PatchFileResult};
use super::paths::PatchPaths;

/// Which file the patches came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSource {
    /// No patch file exists
    Absent,
    /// The current record-format file
    Current,
    /// The legacy JSON-lines file
    Legacy,
}

impl PatchSource {
    /// Name for log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchSource::Absent => "absent",
            PatchSource::Current => "current",
            PatchSource::Legacy => "legacy",
        }
    }
}

/// Patched entries read from disk, ascending by timestamp
#[derive(Debug, Clone)]
pub struct LoadedPatches {
    /// Persisted patched views
    pub entries: Vec<LogEntry>,
    /// Where they came from
    pub source: PatchSource,
}

/// Reads and writes one session's patch file on behalf of one user.
#[derive(Debug, Clone)]
pub struct PatchStore {
    paths: PatchPaths,
    actor: String,
    logger: Logger,
}

impl PatchStore {
    /// Store for `paths`, acting as `actor`
    pub fn new(paths: PatchPaths, actor: impl Into<String>, logger: Logger) -> Self {
        Self {
            paths,
            actor: actor.into(),
            logger,
        }
    }

    /// File locations
    pub fn paths(&self) -> &PatchPaths {
        &self.paths
    }

    /// Reads the persisted patched entries.
    ///
    /// # Errors
    ///
    /// - `AERO_PATCH_READ_FAILED` if a present file cannot be read
    /// - `AERO_PATCH_DECODE_FAILED` if it decodes under neither format
    pub fn load(&self) -> PatchFileResult<LoadedPatches> {
        let (mut entries, source) = if self.paths.patch().exists() {
            (self.load_current()?, PatchSource::Current)
        } else if self.paths.legacy().exists() {
            let text = fs::read_to_string(self.paths.legacy()).map_err(|e| {
                PatchFileError::read_failed(self.paths.legacy(), e).with_actor(&self.actor)
            })?;
            let entries = parse_json_lines(&text).map_err(|reason| {
                PatchFileError::legacy_decode_failed(self.paths.legacy(), reason)
                    .with_actor(&self.actor)
            })?;
            (entries, PatchSource::Legacy)
        } else {
            (Vec::new(), PatchSource::Absent)
        };

        entries.sort_by_key(|e| e.timestamp());
        if source != PatchSource::Absent {
            self.logger.event(
                Event::PatchFileLoaded,
                &[
                    ("actor", &self.actor),
                    ("entries", &entries.len().to_string()),
                    ("source", source.as_str()),
                ],
            );
        }
        Ok(LoadedPatches { entries, source })
    }

    /// Atomically replaces the patch file with `entries`.
    ///
    /// Entries are de-duplicated by `(timestamp, kind, sequence)`, keeping the
    /// last, so entries recorded at the same time stay distinct.
    /// With nothing to write, the patch file is removed instead. Returns the
    /// number of entries written.
    pub fn persist<I>(&self, entries: I) -> PatchFileResult<usize>
    where
        I: IntoIterator<Item = LogEntry>,
    {
        let mut unique: BTreeMap<(i64, u8, u64), LogEntry> = BTreeMap::new();
        for entry in entries {
            unique.insert(
                (entry.timestamp(), entry.kind().as_u8(), entry.sequence()),
                entry,
            );
        }
        let entries: Vec<LogEntry> = unique.into_values().collect();

        if entries.is_empty() {
            self.delete()?;
            return Ok(0);
        }

        let temp = self.paths.temp();
        if let Err(e) = write_entries(temp, &entries) {
            let _ = fs::remove_file(temp);
            return Err(PatchFileError::write_failed("write", temp, e).with_actor(&self.actor));
        }
        fs::rename(temp, self.paths.patch()).map_err(|e| {
            let _ = fs::remove_file(temp);
            PatchFileError::write_failed("commit", self.paths.patch(), e).with_actor(&self.actor)
        })?;
        sync_parent(self.paths.patch());

        self.back_up_legacy()?;
        self.logger.event(
            Event::PatchFileWritten,
            &[
                ("actor", &self.actor),
                ("entries", &entries.len().to_string()),
                ("path", &self.paths.patch().display().to_string()),
            ],
        );
        Ok(entries.len())
    }

    /// Removes the patch file and moves any legacy file to its backup.
    /// Returns whether a file was removed or moved.
    pub fn delete(&self) -> PatchFileResult<bool> {
        let removed = match fs::remove_file(self.paths.patch()) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(
                    PatchFileError::write_failed("delete", self.paths.patch(), e).with_actor(&self.actor)
                )
            }
        };
        let backed_up = self.back_up_legacy()?;
        if removed || backed_up {
            self.logger.event(
                Event::PatchFileDeleted,
                &[
                    ("actor", &self.actor),
                    ("path", &self.paths.patch().display().to_string()),
                ],
            );
        }
        Ok(removed || backed_up)
    }

    fn load_current(&self) -> PatchFileResult<Vec<LogEntry>> {
        let path = self.paths.patch();
        let record_error = match SessionLogReader::open(path, SequencePolicy::Relaxed)
            .and_then(|mut reader| reader.read_all())
        {
            Ok(entries) => return Ok(entries),
            Err(e) => e,
        };

        // A file written by an older build under the current name.
        let text = match fs::read(path) {
            Ok(bytes) => String::from_utf8(bytes).ok(),
            Err(e) => return Err(PatchFileError::read_failed(path, e).with_actor(&self.actor)),
        };
        match text.map(|t| parse_json_lines(&t)) {
            Some(Ok(entries)) => Ok(entries),
            Some(Err(legacy_error)) => {
                Err(PatchFileError::decode_failed(path, record_error, legacy_error).with_actor(&self.actor))
            }
            None => Err(PatchFileError::decode_failed(
                path,
                record_error,
                "not UTF-8 text".to_string(),
            )
            .with_actor(&self.actor)),
        }
    }

    fn back_up_legacy(&self) -> PatchFileResult<bool> {
        if !self.paths.legacy().exists() {
            return Ok(false);
        }
        fs::rename(self.paths.legacy(), self.paths.backup()).map_err(|e| {
            PatchFileError::write_failed("back up", self.paths.legacy(), e).with_actor(&self.actor)
        })?;
        self.logger.event(
            Event::LegacyPatchFileBackedUp,
            &[
                ("actor", &self.actor),
                ("backup", &self.paths.backup().display().to_string()),
            ],
        );
        Ok(true)
    }
}

/// Parses one JSON-encoded entry per non-blank line.
fn parse_json_lines(text: &str) -> Result<Vec<LogEntry>, String> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str::<LogEntry>(line).map_err(|e| format!("line {}: {}", number + 1, e))
        })
        .collect()
}

/// fsync the parent directory so a rename survives a crash. Best effort.
fn sync_parent(path: &std::path::Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
