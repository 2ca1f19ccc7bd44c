//! Recorded session logs
//!
//! A session log is an ordered, append-only file of length-delimited,
//! checksummed records. It is read once when a session is opened; patch files
//! reuse the same framing.
//!
//! # Invariants Enforced
//!
//! - Checksums on every record
//! - Halt on corruption: no skipping, no repair
//! - Timestamps never decrease
//! - Entries are immutable once loaded

mod checksum;
mod entry;
mod errors;
mod reader;
mod record;
mod writer;

pub use checksum::compute_checksum;
pub use entry::{LogEntry, MessageKind, Payload};
pub use errors::{SessionLogError, SessionLogErrorCode, SessionLogResult, Severity};
pub use reader::{SequencePolicy, SessionLogReader};
pub use record::{SessionRecord, MIN_RECORD_SIZE};
pub use writer::{write_entries, SessionLogWriter};
