//! The stage trait
//!
//! Stages are the pluggable units of the preprocessing pipeline. Every
//! run drives each participating stage through the same three passes:
//!
//! 1. `pre_scan` reads the whole file and gathers per-file state,
//! 2. `transform_line` maps each input line to zero or more output
//!    lines,
//! 3. `finalize` runs after the last line, before the output is
//!    committed.
//!
//! # Examples
//! - Slicer metadata extraction
//! - Placeholder substitution
//! - Tool shutdown scheduling

use std::path::Path;

use crate::context::Context;
use crate::error::StageResult;

/// A pluggable transformation over one G-code file.
///
/// Implementations carry per-file scan state between passes, so the
/// pipeline holds them mutably and `pre_scan` must reset anything left
/// over from a previous file.
pub trait Stage: Send {
    /// Registry name of this stage; unique within a configured pipeline.
    fn name(&self) -> &str;

    /// One-line description of what this stage does.
    fn description(&self) -> &str;

    /// Whether this stage should run on the given file.
    ///
    /// A stage that declines is excluded from all three passes of the
    /// run. The default accepts every file.
    fn can_process(&self, _path: &Path, _context: &Context) -> bool {
        true
    }

    /// Pass 1: whole-file analysis before any line is rewritten.
    ///
    /// A failure here aborts the run before the input is modified.
    fn pre_scan(&mut self, path: &Path, context: &mut Context) -> StageResult<()>;

    /// Pass 2: transform one candidate line into zero or more output lines.
    ///
    /// Most stages return the line unchanged or slightly rewritten; a
    /// stage may also inject extra lines around it or drop it by
    /// returning an empty vector.
    fn transform_line(&mut self, line: &str, context: &mut Context) -> Vec<String>;

    /// Pass 3: wrap-up after the last line, before the output is committed.
    ///
    /// A failure here aborts the run; the input file stays untouched.
    fn finalize(&mut self, _path: &Path, _context: &mut Context) -> StageResult<()> {
        Ok(())
    }
}

/// Boxed stage, as stored and driven by the pipeline.
pub type BoxedStage = Box<dyn Stage>;
