//! Patch file error types
//!
//! Error codes:
//! - AERO_PATCH_READ_FAILED (ERROR severity)
//! - AERO_PATCH_WRITE_FAILED (ERROR severity)
//! - AERO_PATCH_DECODE_FAILED (FATAL severity)
//!
//! A failed write never reports success; the previous patch file stays in
//! place.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::Path;

use crate::session_log::SessionLogError;

/// Severity levels for patch file errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation failed; the session stays usable
    Error,
    /// The patch file cannot be interpreted; the session must not open
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

/// Patch file error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchFileErrorCode {
    /// Reading an existing patch file failed
    AeroPatchReadFailed,
    /// Writing, syncing, renaming or deleting failed
    AeroPatchWriteFailed,
    /// Neither the record format nor the legacy format decodes
    AeroPatchDecodeFailed,
}

impl PatchFileErrorCode {
    /// Returns the string code
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchFileErrorCode::AeroPatchReadFailed => "AERO_PATCH_READ_FAILED",
            PatchFileErrorCode::AeroPatchWriteFailed => "AERO_PATCH_WRITE_FAILED",
            PatchFileErrorCode::AeroPatchDecodeFailed => "AERO_PATCH_DECODE_FAILED",
        }
    }

    /// Returns the severity level for this error code
    pub fn severity(&self) -> Severity {
        match self {
            PatchFileErrorCode::AeroPatchDecodeFailed => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for PatchFileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Patch file error with path and actor context
#[derive(Debug)]
pub struct PatchFileError {
    code: PatchFileErrorCode,
    message: String,
    details: Option<String>,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl PatchFileError {
    fn new(
        code: PatchFileErrorCode,
        message: impl Into<String>,
        source: Option<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source,
        }
    }

    /// Reading failed at `path`
    pub fn read_failed(path: &Path, source: io::Error) -> Self {
        Self::new(
            PatchFileErrorCode::AeroPatchReadFailed,
            format!("Failed to read patch file: {}", path.display()),
            Some(Box::new(source)),
        )
    }

    /// A write step (`operation`) failed at `path`
    pub fn write_failed(operation: &str, path: &Path, source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(
            PatchFileErrorCode::AeroPatchWriteFailed,
            format!("Failed to {} patch file: {}", operation, path.display()),
            Some(Box::new(source)),
        )
    }

    /// The file decodes under no known format
    pub fn decode_failed(path: &Path, record_error: SessionLogError, legacy_error: String) -> Self {
        let mut err = Self::new(
            PatchFileErrorCode::AeroPatchDecodeFailed,
            format!(
                "Undecodable patch file {} (legacy format: {})",
                path.display(),
                legacy_error
            ),
            None,
        );
        err.details = record_error.details().map(str::to_string);
        err.source = Some(Box::new(record_error));
        err
    }

    /// The legacy JSON-lines file does not parse
    pub fn legacy_decode_failed(path: &Path, reason: String) -> Self {
        Self::new(
            PatchFileErrorCode::AeroPatchDecodeFailed,
            format!("Undecodable legacy patch file {}: {}", path.display(), reason),
            None,
        )
    }

    /// Names the user on whose behalf the operation ran
    pub fn with_actor(mut self, actor: &str) -> Self {
        let context = format!("actor: {}", actor);
        self.details = Some(match self.details.take() {
            Some(existing) => format!("{}, {}", existing, context),
            None => context,
        });
        self
    }

    /// Returns the error code
    pub fn code(&self) -> PatchFileErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns the severity of this error
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for PatchFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl Error for PatchFileError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Result type for patch file operations
pub type PatchFileResult<T> = Result<T, PatchFileError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PatchFileErrorCode::AeroPatchReadFailed.as_str(),
            "AERO_PATCH_READ_FAILED"
        );
        assert_eq!(
            PatchFileErrorCode::AeroPatchDecodeFailed.as_str(),
            "AERO_PATCH_DECODE_FAILED"
        );
    }

    #[test]
    fn test_only_decode_is_fatal() {
        let path = PathBuf::from("/tmp/s.log.patches");
        let write = PatchFileError::write_failed(
            "rename",
            &path,
            io::Error::new(io::ErrorKind::Other, "busy"),
        );
        assert!(!write.is_fatal());

        let decode = PatchFileError::decode_failed(
            &path,
            SessionLogError::corruption_at_offset(12, "bad checksum"),
            "expected value".into(),
        );
        assert!(decode.is_fatal());
        assert_eq!(decode.details(), Some("byte_offset: 12"));
    }

    #[test]
    fn test_actor_in_display() {
        let err = PatchFileError::read_failed(
            Path::new("/tmp/x.patches"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        )
        .with_actor("reviewer");
        let shown = err.to_string();
        assert!(shown.contains("AERO_PATCH_READ_FAILED"));
        assert!(shown.contains("actor: reviewer"));
        assert!(err.source().is_some());
    }
}
