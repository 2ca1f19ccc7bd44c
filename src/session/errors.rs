//! # Session Errors

use thiserror::Error;

use crate::patch_file::PatchFileError;
use crate::rollup::RollupError;
use crate::session_log::SessionLogError;
use crate::span::SpanError;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Session construction and operation failures
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Message filter must name at least one kind")]
    EmptyFilter,

    #[error("Invalid time window: start {start} is after end {end}")]
    InvertedWindow { start: i64, end: i64 },

    #[error("Username must not be blank")]
    BlankUsername,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read session log as {actor}: {source}")]
    Log {
        actor: String,
        #[source]
        source: SessionLogError,
    },

    #[error(transparent)]
    PatchFile(#[from] PatchFileError),

    #[error(transparent)]
    Rollup(#[from] RollupError),

    #[error(transparent)]
    Span(#[from] SpanError),
}

impl SessionError {
    /// Returns true if the error leaves the session unusable
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Log { source, .. } => source.is_fatal(),
            SessionError::PatchFile(e) => e.is_fatal(),
            _ => false,
        }
    }
}
