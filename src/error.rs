//! Unified error type for liftover operations.
//!
//! Subsystems keep their own narrow error enums (e.g. `FileError` in
//! `python::files`); everything is bridged into `LiftError` before it reaches
//! the caller. Expected execution outcomes (bad interpreter at runtime,
//! non-zero exit, timeout, resource kill) are *not* errors; they are carried
//! in `ExecutionResult` data.

use std::io;

use thiserror::Error;

use crate::python::files::FileError;

/// Unified error type for caller-facing failures.
#[derive(Debug, Error)]
pub enum LiftError {
    /// A required file or pairing does not exist yet (e.g. comparing a file
    /// that has no migrated counterpart). Never retried internally.
    #[error("precondition not met: {message}")]
    PreconditionNotMet { message: String },

    /// An interpreter failed its availability probe.
    #[error("interpreter unavailable: {interpreter}: {reason}")]
    InterpreterUnavailable { interpreter: String, reason: String },

    /// Project root or file missing.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type for liftover operations.
pub type LiftResult<T> = Result<T, LiftError>;

impl LiftError {
    /// Create a precondition-not-met error.
    pub fn precondition(message: impl Into<String>) -> Self {
        LiftError::PreconditionNotMet {
            message: message.into(),
        }
    }

    /// Create an interpreter-unavailable error.
    pub fn interpreter_unavailable(
        interpreter: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        LiftError::InterpreterUnavailable {
            interpreter: interpreter.into(),
            reason: reason.into(),
        }
    }

    /// Create a file-not-found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        LiftError::FileNotFound { path: path.into() }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        LiftError::Internal {
            message: message.into(),
        }
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<FileError> for LiftError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::RootNotFound { path } => LiftError::FileNotFound { path },
            FileError::Io(io_err) => LiftError::Io(io_err),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_display() {
        let err = LiftError::precondition("file a.py has not been transformed yet");
        assert_eq!(
            err.to_string(),
            "precondition not met: file a.py has not been transformed yet"
        );
    }

    #[test]
    fn interpreter_unavailable_display() {
        let err = LiftError::interpreter_unavailable("python2", "probe timed out");
        assert!(err.to_string().contains("python2"));
        assert!(err.to_string().contains("probe timed out"));
    }

    #[test]
    fn file_error_bridges_to_lift_error() {
        let err = LiftError::from(FileError::RootNotFound {
            path: "/missing".to_string(),
        });
        assert!(matches!(err, LiftError::FileNotFound { .. }));
    }
}
