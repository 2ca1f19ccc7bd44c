//! # Span Resolution Errors

use thiserror::Error;

use crate::overlay::OverlayError;

/// Result type for span operations
pub type SpanResult<T> = Result<T, SpanError>;

/// Reasons an apply, edit or remove request is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpanError {
    #[error("Apply request names no target")]
    NoTargets,

    #[error("Target name must not be blank")]
    BlankTarget,

    #[error("No performance assessment at or before {0}")]
    NoAnchor(i64),

    #[error("Target {target} is not assessed in the entry at {timestamp}")]
    UnknownTarget { target: String, timestamp: i64 },

    #[error("No entry carries a published score")]
    NoScoreEntry,

    #[error("Invalid edit: {0}")]
    InvalidEdit(String),

    #[error(transparent)]
    Overlay(#[from] OverlayError),
}
