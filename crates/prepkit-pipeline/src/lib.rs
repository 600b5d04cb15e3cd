//! # prepkit Pipeline
//!
//! Orchestration layer for G-code preprocessing: loads [`Settings`],
//! assembles the configured stages through the [`StageRegistry`], and
//! runs the three-pass [`Pipeline`] over files with idempotence and
//! atomic-commit guarantees.

pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod registry;
pub mod settings;

pub use error::{PassPhase, PipelineError, RegistryError, SettingsError};
pub use outcome::Outcome;
pub use pipeline::Pipeline;
pub use registry::{StageFactory, StageRegistry};
pub use settings::Settings;
