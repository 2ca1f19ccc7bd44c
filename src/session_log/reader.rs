//! Session log reader with strict corruption detection
//!
//! - Records are read strictly in file order
//! - Timestamps must never decrease
//! - Any corruption halts the read; no skipping, no repair
//!
//! Recorded logs also require strictly increasing sequence numbers. Patch
//! files do not: a synthetic entry shares the sequence number of the entry it
//! was cloned from.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use super::entry::LogEntry;
use super::errors::{SessionLogError, SessionLogResult};
use super::record::{SessionRecord, MIN_RECORD_SIZE};

/// How sequence numbers are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePolicy {
    /// Sequence numbers strictly increase (recorded logs)
    Strict,
    /// Sequence numbers are not checked (patch files)
    Relaxed,
}

/// Sequential reader for session log files.
pub struct SessionLogReader {
    path: PathBuf,
    reader: BufReader<File>,
    current_offset: u64,
    file_size: u64,
    policy: SequencePolicy,
    last_sequence: Option<u64>,
    last_timestamp: Option<i64>,
}

impl SessionLogReader {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns `AERO_LOG_READ_FAILED` if the file cannot be opened; the
    /// underlying `io::ErrorKind` is preserved as the source.
    pub fn open(path: &Path, policy: SequencePolicy) -> SessionLogResult<Self> {
        let file = File::open(path).map_err(|e| {
            SessionLogError::read_failed(format!("Failed to open log: {}", path.display()), e)
        })?;

        let file_size = file
            .metadata()
            .map_err(|e| {
                SessionLogError::read_failed(
                    format!("Failed to read log metadata: {}", path.display()),
                    e,
                )
            })?
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            current_offset: 0,
            file_size,
            policy,
            last_sequence: None,
            last_timestamp: None,
        })
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the current byte offset in the file.
    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    /// Returns whether there are more bytes to read.
    pub fn has_more(&self) -> bool {
        self.current_offset < self.file_size
    }

    /// Reads and decodes the next entry.
    ///
    /// - `Ok(Some(entry))` if a record was read
    /// - `Ok(None)` at a clean end of file
    /// - `Err` on any corruption, decode failure, or read error
    pub fn read_next(&mut self) -> SessionLogResult<Option<LogEntry>> {
        if self.current_offset >= self.file_size {
            return Ok(None);
        }

        let remaining = self.file_size - self.current_offset;
        if remaining < MIN_RECORD_SIZE as u64 {
            return Err(self.located(SessionLogError::corruption_at_offset(
                self.current_offset,
                format!(
                    "Truncated log: {} bytes remaining, minimum record size is {}",
                    remaining, MIN_RECORD_SIZE
                ),
            )));
        }

        let mut len_buf = [0u8; 4];
        self.reader
            .read_exact(&mut len_buf)
            .map_err(|e| self.read_error("Failed to read record length", e))?;
        let record_length = u32::from_le_bytes(len_buf) as u64;

        if record_length < MIN_RECORD_SIZE as u64 || record_length > remaining {
            return Err(self.located(SessionLogError::corruption_at_offset(
                self.current_offset,
                format!(
                    "Invalid record length {} ({} bytes remaining)",
                    record_length, remaining
                ),
            )));
        }

        let mut record_buf = vec![0u8; record_length as usize];
        record_buf[0..4].copy_from_slice(&len_buf);
        self.reader
            .read_exact(&mut record_buf[4..])
            .map_err(|e| self.read_error("Failed to read record body", e))?;

        let offset = self.current_offset;
        let (record, consumed) = SessionRecord::deserialize(&record_buf)
            .map_err(|e| self.located(e.with_context(format!("byte_offset: {}", offset))))?;

        self.check_ordering(&record)?;

        let entry = record
            .into_entry()
            .map_err(|e| self.located(e.with_context(format!("byte_offset: {}", offset))))?;

        self.current_offset += consumed as u64;
        self.last_sequence = Some(entry.sequence());
        self.last_timestamp = Some(entry.timestamp());
        Ok(Some(entry))
    }

    /// Reads every remaining entry.
    pub fn read_all(&mut self) -> SessionLogResult<Vec<LogEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.read_next()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    fn check_ordering(&self, record: &SessionRecord) -> SessionLogResult<()> {
        if let Some(last_ts) = self.last_timestamp {
            if record.timestamp < last_ts {
                return Err(self.located(SessionLogError::corruption_at_sequence(
                    record.sequence_number,
                    format!(
                        "Timestamp went backwards: {} after {}",
                        record.timestamp, last_ts
                    ),
                )));
            }
        }

        if self.policy == SequencePolicy::Strict {
            if let Some(last_seq) = self.last_sequence {
                if record.sequence_number <= last_seq {
                    return Err(self.located(SessionLogError::corruption_at_sequence(
                        record.sequence_number,
                        format!(
                            "Non-increasing sequence number: {} after {}",
                            record.sequence_number, last_seq
                        ),
                    )));
                }
            }
        }
        Ok(())
    }

    fn located(&self, err: SessionLogError) -> SessionLogError {
        err.with_context(format!("file: {}", self.path.display()))
    }

    fn read_error(&self, what: &str, e: io::Error) -> SessionLogError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            self.located(SessionLogError::corruption_at_offset(
                self.current_offset,
                format!("{}: {}", what, e),
            ))
        } else {
            SessionLogError::read_failed(format!("{}: {}", what, self.path.display()), e)
        }
    }
}

/// Iterator adapter: yields entries until end of file or the first error.
impl Iterator for SessionLogReader {
    type Item = SessionLogResult<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => None,
            Err(e) => {
                // Poison the reader so iteration stops after an error.
                self.current_offset = self.file_size;
                Some(Err(e))
            }
        }
    }
}
