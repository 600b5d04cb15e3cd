//! Error types for pipeline orchestration and stage registration.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use prepkit_core::StageError;

/// Pass in which a stage failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    /// Whole-file analysis before any line is rewritten.
    PreScan,
    /// Wrap-up after the last line, before commit.
    Finalize,
}

impl fmt::Display for PassPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassPhase::PreScan => write!(f, "pre-scan"),
            PassPhase::Finalize => write!(f, "finalize"),
        }
    }
}

/// Errors that abort a preprocessing run.
///
/// Every variant is raised before the commit rename, so the input file
/// is never modified by a failed run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input file does not exist.
    #[error("File not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// A stage failed in one of its whole-file passes.
    #[error("Stage '{stage}' failed during {phase}: {source}")]
    Stage {
        stage: String,
        phase: PassPhase,
        #[source]
        source: StageError,
    },

    /// I/O error while reading the input or writing the staged output.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Errors building a pipeline from configured stage names.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No factory is registered under the requested name.
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// The same stage name is configured more than once.
    #[error("Stage '{0}' configured more than once")]
    DuplicateStage(String),

    /// A factory rejected its stage options.
    #[error("Invalid configuration for stage '{stage}': {reason}")]
    InvalidConfig { stage: String, reason: String },
}

/// Errors loading or validating a settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings file could not be read or written.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// The settings file is not valid JSON.
    #[error("Invalid JSON settings: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The settings file is not valid TOML.
    #[error("Invalid TOML settings: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Settings could not be serialized back to TOML.
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// The settings path has an unsupported extension.
    #[error("Settings file must be .json or .toml: {}", .path.display())]
    UnknownFormat { path: PathBuf },

    /// The settings content failed validation.
    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::NotFound {
            path: PathBuf::from("/tmp/missing.gcode"),
        };
        assert_eq!(err.to_string(), "File not found: /tmp/missing.gcode");

        let err = PipelineError::Stage {
            stage: "metadata".to_string(),
            phase: PassPhase::PreScan,
            source: StageError::failed("boom"),
        };
        assert_eq!(
            err.to_string(),
            "Stage 'metadata' failed during pre-scan: boom"
        );
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::UnknownStage("mystery".to_string());
        assert_eq!(err.to_string(), "Unknown stage: mystery");

        let err = RegistryError::DuplicateStage("metadata".to_string());
        assert_eq!(err.to_string(), "Stage 'metadata' configured more than once");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::IoError(_)));
    }
}
