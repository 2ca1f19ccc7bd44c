//! # Overlay Errors

use thiserror::Error;

/// Result type for overlay operations
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Reasons an overlay refuses a patch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    #[error("Patch time {patch_time} is after entry time {entry_time}")]
    PatchAfterEntry { patch_time: i64, entry_time: i64 },

    #[error("Target node not present in entry at {timestamp}: {target}")]
    UnknownTarget { target: String, timestamp: i64 },

    #[error("Entry at {0} carries no performance tree")]
    NotAnAssessment(i64),

    #[error("Entry at {0} carries no lesson score")]
    NotAScore(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_context() {
        let err = OverlayError::UnknownTarget {
            target: "Task9".into(),
            timestamp: 40,
        };
        let msg = err.to_string();
        assert!(msg.contains("Task9"));
        assert!(msg.contains("40"));
    }
}
