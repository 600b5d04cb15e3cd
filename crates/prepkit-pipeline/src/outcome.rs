//! Result summary of a preprocessing run.

use serde::{Deserialize, Serialize};

use prepkit_core::Metadata;

/// What a pipeline run did to a file.
///
/// A run that skips the file (disabled pipeline, already-carrying a
/// fingerprint, no applicable stages) reports `processed: false` with
/// the reason in `message`; skipping is not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outcome {
    /// True when the file was rewritten and committed.
    pub processed: bool,
    /// Human-readable summary of what happened.
    pub message: String,
    /// Names of the stages that ran, in execution order.
    pub applied_stages: Vec<String>,
    /// Metadata gathered during the run.
    pub metadata: Metadata,
}

impl Outcome {
    pub(crate) fn skipped(message: impl Into<String>) -> Self {
        Outcome {
            processed: false,
            message: message.into(),
            ..Default::default()
        }
    }
}
