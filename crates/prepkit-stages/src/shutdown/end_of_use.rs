//! End-of-use tool shutdown stage
//!
//! Shuts each managed tool down exactly once, immediately after the
//! tool-change that switches away from its last selection. The
//! shutdown is deferred by one line: the switch-away line flags the
//! tool and the next transformed line is preceded by the cooldown
//! pair.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info, warn};

use prepkit_core::gcode::{self, ToolId};
use prepkit_core::{fileio, Context, Stage, StageConfig, StageResult};

use super::{end_of_use_shutdown_lines, ToolUsage};

/// Inserts `M104 T<n> S0` after each tool's last use.
///
/// Tools listed in the `exclude_tools` option (comma-separated indices)
/// are never shut down. A tool whose last selection runs to the end of
/// the file has no switch-away line, so it gets no shutdown; finalize
/// logs it instead.
pub struct EndOfUseShutdown {
    excluded: BTreeSet<ToolId>,
    usage: ToolUsage,
    current_tool: Option<ToolId>,
    pending_cooldown: Option<ToolId>,
    cooled: BTreeSet<ToolId>,
}

impl EndOfUseShutdown {
    /// Registry name of this stage.
    pub const NAME: &'static str = "tool_shutdown";

    /// Create a stage with no excluded tools.
    pub fn new() -> Self {
        Self::from_config(&StageConfig::default())
    }

    /// Create a stage from stage options.
    pub fn from_config(config: &StageConfig) -> Self {
        let excluded: BTreeSet<ToolId> = gcode::parse_tool_list(config.get_or("exclude_tools", ""))
            .into_iter()
            .collect();
        Self {
            excluded,
            usage: ToolUsage::default(),
            current_tool: None,
            pending_cooldown: None,
            cooled: BTreeSet::new(),
        }
    }

    /// Flush a scheduled cooldown into the output, marking the tool.
    fn flush_pending(&mut self, output: &mut Vec<String>, context: &Context) {
        if let Some(tool) = self.pending_cooldown.take() {
            output.extend(end_of_use_shutdown_lines(tool));
            self.cooled.insert(tool);
            info!(
                "tool_shutdown: inserted cooldown for T{} at line {}",
                tool, context.current_line
            );
        }
    }

    /// Handle a switch away from `previous`: flag it for cooldown when
    /// its last selection is behind us.
    fn schedule_if_done(&mut self, previous: ToolId, current_line: usize) {
        if !self.usage.is_managed(previous) || self.cooled.contains(&previous) {
            return;
        }
        if self
            .usage
            .last_use_of(previous)
            .map_or(true, |last| current_line >= last)
        {
            self.pending_cooldown = Some(previous);
        }
    }
}

impl Default for EndOfUseShutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for EndOfUseShutdown {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Automatically shuts down tools after their last usage"
    }

    fn pre_scan(&mut self, path: &Path, context: &mut Context) -> StageResult<()> {
        self.usage = ToolUsage::new(self.excluded.clone());
        self.current_tool = None;
        self.pending_cooldown = None;
        self.cooled.clear();

        let lines = fileio::read_lines(path)?;
        for (line_number, line) in lines.iter().enumerate() {
            if let Some(tool) = gcode::extract_tool_number(line) {
                self.usage.record(tool, line_number);
            }
        }

        info!(
            "tool_shutdown: {} tools used, managing {:?}, excluded {:?}",
            self.usage.tool_count(),
            self.usage.managed_tools(),
            self.usage.excluded()
        );
        debug!("tool_shutdown: last usage map {:?}", self.usage.last_usage());

        context.metadata.tools_used = self.usage.tools().collect();
        context.metadata.tool_last_usage = self.usage.last_usage().clone();

        Ok(())
    }

    fn transform_line(&mut self, line: &str, context: &mut Context) -> Vec<String> {
        let mut output = Vec::with_capacity(1);

        self.flush_pending(&mut output, context);

        if let Some(tool) = gcode::extract_tool_number(line) {
            let previous = self.current_tool.replace(tool);
            if let Some(previous) = previous {
                if previous != tool {
                    self.schedule_if_done(previous, context.current_line);
                }
            }
        }

        output.push(line.to_string());
        output
    }

    fn finalize(&mut self, _path: &Path, _context: &mut Context) -> StageResult<()> {
        if let Some(tool) = self.pending_cooldown {
            warn!(
                "tool_shutdown: T{} still had a pending cooldown at end of file",
                tool
            );
        }
        for tool in self.usage.managed_tools() {
            if !self.cooled.contains(&tool) && self.pending_cooldown != Some(tool) {
                debug!("tool_shutdown: T{} reaches end of file without shutdown", tool);
            }
        }
        Ok(())
    }
}
