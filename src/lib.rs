//! # prepkit
//!
//! G-code preprocessing for multi-tool 3D printers:
//! - Idempotent three-pass pipeline with atomic in-place commits
//! - Slicer metadata extraction (PrusaSlicer, SuperSlicer, OrcaSlicer, BambuStudio)
//! - Placeholder substitution in custom start/end G-code
//! - End-of-use and predictive-idle tool shutdown scheduling
//!
//! ## Architecture
//!
//! prepkit is organized as a workspace with multiple crates:
//!
//! 1. **prepkit-core** - Stage trait, run context, G-code line helpers, file I/O
//! 2. **prepkit-stages** - The bundled preprocessing stages
//! 3. **prepkit-pipeline** - Settings, stage registry, three-pass orchestration
//! 4. **prepkit** - Command-line binary that integrates all crates

pub use prepkit_core::{
    Context, Metadata, Stage, StageConfig, StageError, StageResult, ToolId,
};
pub use prepkit_pipeline::{
    Outcome, PassPhase, Pipeline, PipelineError, RegistryError, Settings, SettingsError,
    StageRegistry,
};
pub use prepkit_stages::{
    EndOfUseShutdown, IdleShutdown, MetadataExtractor, PlaceholderReplacer,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output on stderr, keeping stdout for results
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
