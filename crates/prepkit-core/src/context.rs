//! Shared per-file processing context
//!
//! One [`Context`] is built per preprocessing run and threaded through
//! all three passes of every stage. Stages communicate exclusively
//! through it: scan passes publish what they learned into the typed
//! [`Metadata`] record, later stages and the commit step read it back.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::gcode::ToolId;

/// Facts about a file gathered during pre-scan, one field per fact.
///
/// Producers fill in the fields they discovered; a field left at its
/// default means no stage produced it and consumers fall back to their
/// own defaults. When two stages produce the same field the later one
/// in pipeline order wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Slicer that generated the file, when recognized.
    pub slicer: Option<String>,

    /// Tools referenced by tool-change directives, ascending.
    pub tools_used: Vec<ToolId>,

    /// Number of tool-change directives in the file.
    pub total_toolchanges: u32,

    /// Filament/extruder colors, one entry per extruder slot.
    pub colors: Vec<String>,

    /// Filament material names (PLA, PETG, ...).
    pub materials: Vec<String>,

    /// Nozzle temperatures as written by the slicer.
    pub temperatures: Vec<String>,

    /// Flush/purge volume matrix entries, when the slicer emits them.
    pub purge_volumes: Vec<String>,

    /// Filament profile names, when the slicer emits them.
    pub filament_names: Vec<String>,

    /// Line number of the last tool-change directive per tool.
    pub tool_last_usage: BTreeMap<ToolId, usize>,
}

/// Mutable state for one preprocessing run over one file.
#[derive(Debug, Clone)]
pub struct Context {
    file_path: PathBuf,
    file_name: String,

    /// Zero-based number of the input line currently being transformed.
    /// Valid during the transform pass only.
    pub current_line: usize,

    /// Total number of input lines, set once the input is fully read.
    pub total_lines: usize,

    /// Tool roster supplied by the caller; empty when none is known.
    /// Absence never blocks a run.
    pub tools: Vec<ToolId>,

    /// Scan results shared between stages.
    pub metadata: Metadata,
}

impl Context {
    /// Create a context for one file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let file_path = path.as_ref().to_path_buf();
        let file_name = file_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        Self {
            file_path,
            file_name,
            current_line: 0,
            total_lines: 0,
            tools: Vec::new(),
            metadata: Metadata::default(),
        }
    }

    /// Path of the file being processed.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// File name component of the path, for log messages.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}
