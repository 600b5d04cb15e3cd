//! Error types for the preprocessing core.
//!
//! Stages report failures from their whole-file passes through
//! [`StageError`]; per-line transformation is infallible.

use std::io;
use thiserror::Error;

/// Errors a stage can raise from its pre-scan or finalize pass.
#[derive(Error, Debug)]
pub enum StageError {
    /// I/O error while the stage read its input file.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// The stage detected a condition it cannot recover from.
    #[error("{0}")]
    Failed(String),

    /// A stage option carried a value the stage cannot use.
    #[error("Invalid value for option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },
}

impl StageError {
    /// Shorthand for a [`StageError::Failed`] with a formatted message.
    pub fn failed(message: impl Into<String>) -> Self {
        StageError::Failed(message.into())
    }

    /// Shorthand for a [`StageError::InvalidOption`].
    pub fn invalid_option(name: impl Into<String>, reason: impl Into<String>) -> Self {
        StageError::InvalidOption {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for stage pass operations.
pub type StageResult<T> = Result<T, StageError>;
