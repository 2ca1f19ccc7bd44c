//! Session log writer
//!
//! Writes framed records sequentially. Nothing is considered written until
//! [`SessionLogWriter::sync`] has flushed and fsynced the file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::entry::LogEntry;
use super::errors::{SessionLogError, SessionLogResult};
use super::record::SessionRecord;

/// Sequential record writer.
pub struct SessionLogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records_written: u64,
}

impl SessionLogWriter {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path) -> SessionLogResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| {
                SessionLogError::write_failed(format!("Failed to create log: {}", path.display()), e)
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            records_written: 0,
        })
    }

    /// Returns the path being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Appends one entry.
    pub fn append(&mut self, entry: &LogEntry) -> SessionLogResult<()> {
        let bytes = SessionRecord::from_entry(entry)?.serialize();
        self.writer.write_all(&bytes).map_err(|e| {
            SessionLogError::write_failed(
                format!(
                    "Failed to write record at sequence {} to {}",
                    entry.sequence(),
                    self.path.display()
                ),
                e,
            )
        })?;
        self.records_written += 1;
        Ok(())
    }

    /// Appends every entry in order, then syncs.
    pub fn append_all(&mut self, entries: &[LogEntry]) -> SessionLogResult<()> {
        for entry in entries {
            self.append(entry)?;
        }
        self.sync()
    }

    /// Flushes buffered bytes and fsyncs the file.
    pub fn sync(&mut self) -> SessionLogResult<()> {
        self.writer.flush().map_err(|e| {
            SessionLogError::write_failed(format!("Failed to flush {}", self.path.display()), e)
        })?;
        self.writer.get_ref().sync_all().map_err(|e| {
            SessionLogError::write_failed(format!("fsync failed for {}", self.path.display()), e)
        })
    }
}

/// Writes `entries` to a fresh file at `path` and syncs it.
pub fn write_entries(path: &Path, entries: &[LogEntry]) -> SessionLogResult<()> {
    SessionLogWriter::create(path)?.append_all(entries)
}
