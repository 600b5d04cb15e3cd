//! # prepkit Core
//!
//! Core types, traits, and utilities for prepkit.
//! Provides the fundamental abstractions for the preprocessing
//! pipeline: line classification, file I/O, the shared per-file
//! context, stage configuration, and the stage trait itself.

pub mod config;
pub mod context;
pub mod error;
pub mod fileio;
pub mod gcode;
pub mod stage;

pub use config::StageConfig;
pub use context::{Context, Metadata};
pub use error::{StageError, StageResult};
pub use gcode::ToolId;
pub use stage::{BoxedStage, Stage};
