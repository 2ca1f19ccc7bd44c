//! Session log error types
//!
//! Error codes:
//! - AERO_LOG_READ_FAILED (ERROR severity)
//! - AERO_LOG_WRITE_FAILED (ERROR severity)
//! - AERO_LOG_CORRUPTION (FATAL severity)
//! - AERO_LOG_DECODE_FAILED (FATAL severity)

use std::fmt;
use std::io;

/// Severity levels for session log errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, caller may retry or report
    Error,
    /// The log cannot be trusted; the session must not be opened
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Session log error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLogErrorCode {
    /// Opening or reading the file failed
    AeroLogReadFailed,
    /// Writing or syncing the file failed
    AeroLogWriteFailed,
    /// Record framing, checksum, or ordering is broken
    AeroLogCorruption,
    /// Payload could not be decoded by any known format
    AeroLogDecodeFailed,
}

impl SessionLogErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SessionLogErrorCode::AeroLogReadFailed => "AERO_LOG_READ_FAILED",
            SessionLogErrorCode::AeroLogWriteFailed => "AERO_LOG_WRITE_FAILED",
            SessionLogErrorCode::AeroLogCorruption => "AERO_LOG_CORRUPTION",
            SessionLogErrorCode::AeroLogDecodeFailed => "AERO_LOG_DECODE_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SessionLogErrorCode::AeroLogReadFailed => Severity::Error,
            SessionLogErrorCode::AeroLogWriteFailed => Severity::Error,
            SessionLogErrorCode::AeroLogCorruption => Severity::Fatal,
            SessionLogErrorCode::AeroLogDecodeFailed => Severity::Fatal,
        }
    }
}

impl fmt::Display for SessionLogErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Session log error with context
#[derive(Debug)]
pub struct SessionLogError {
    code: SessionLogErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl SessionLogError {
    /// Reading failed
    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SessionLogErrorCode::AeroLogReadFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Writing failed
    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SessionLogErrorCode::AeroLogWriteFailed,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Structural corruption
    pub fn corruption(message: impl Into<String>) -> Self {
        Self {
            code: SessionLogErrorCode::AeroLogCorruption,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Corruption with sequence number context
    pub fn corruption_at_sequence(sequence: u64, reason: impl Into<String>) -> Self {
        Self {
            code: SessionLogErrorCode::AeroLogCorruption,
            message: reason.into(),
            details: Some(format!("sequence_number: {}", sequence)),
            source: None,
        }
    }

    /// Corruption with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self {
            code: SessionLogErrorCode::AeroLogCorruption,
            message: reason.into(),
            details: Some(format!("byte_offset: {}", offset)),
            source: None,
        }
    }

    /// Payload decode failure for the record with the given sequence number
    pub fn decode_failed(sequence: u64, reason: impl Into<String>) -> Self {
        Self {
            code: SessionLogErrorCode::AeroLogDecodeFailed,
            message: reason.into(),
            details: Some(format!("sequence_number: {}", sequence)),
            source: None,
        }
    }

    /// Appends context to the details, keeping what was already there
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.details = Some(match self.details.take() {
            Some(existing) => format!("{}, {}", existing, context),
            None => context,
        });
        self
    }

    /// Returns the error code
    pub fn code(&self) -> SessionLogErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for SessionLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SessionLogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for session log operations
pub type SessionLogResult<T> = Result<T, SessionLogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SessionLogErrorCode::AeroLogReadFailed.code(), "AERO_LOG_READ_FAILED");
        assert_eq!(SessionLogErrorCode::AeroLogCorruption.code(), "AERO_LOG_CORRUPTION");
        assert_eq!(SessionLogErrorCode::AeroLogDecodeFailed.code(), "AERO_LOG_DECODE_FAILED");
    }

    #[test]
    fn test_corruption_is_fatal_io_is_not() {
        assert!(SessionLogError::corruption("bad").is_fatal());
        let io = SessionLogError::write_failed("w", io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(!io.is_fatal());
    }

    #[test]
    fn test_display_carries_context() {
        let err = SessionLogError::decode_failed(7, "unknown payload").with_context("file: a.log");
        let display = err.to_string();
        assert!(display.contains("AERO_LOG_DECODE_FAILED"));
        assert!(display.contains("sequence_number: 7"));
        assert!(display.contains("file: a.log"));
    }
}
