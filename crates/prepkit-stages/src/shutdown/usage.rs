//! Tool usage bookkeeping shared by the shutdown stages

use std::collections::{BTreeMap, BTreeSet};

use prepkit_core::ToolId;

/// Where (and when) each tool is selected across one file.
///
/// Built during pre-scan from tool-change directives. A tool is
/// "managed" when it appears in the file and is not excluded by
/// configuration; only managed tools are ever shut down.
#[derive(Debug, Default)]
pub(crate) struct ToolUsage {
    excluded: BTreeSet<ToolId>,
    usage_lines: BTreeMap<ToolId, Vec<usize>>,
    last_usage: BTreeMap<ToolId, usize>,
    timeline: BTreeMap<ToolId, Vec<(usize, f64)>>,
}

impl ToolUsage {
    pub fn new(excluded: BTreeSet<ToolId>) -> Self {
        Self {
            excluded,
            ..Self::default()
        }
    }

    /// Record a tool-change directive at the given line.
    pub fn record(&mut self, tool: ToolId, line: usize) {
        self.usage_lines.entry(tool).or_default().push(line);
        let last = self.last_usage.entry(tool).or_insert(line);
        if line > *last {
            *last = line;
        }
    }

    /// Record a tool-change directive with its estimated timestamp.
    pub fn record_timed(&mut self, tool: ToolId, line: usize, at_seconds: f64) {
        self.record(tool, line);
        self.timeline.entry(tool).or_default().push((line, at_seconds));
    }

    /// All tools referenced in the file, ascending.
    pub fn tools(&self) -> impl Iterator<Item = ToolId> + '_ {
        self.usage_lines.keys().copied()
    }

    /// Number of distinct tools referenced in the file.
    pub fn tool_count(&self) -> usize {
        self.usage_lines.len()
    }

    /// Line of the last tool-change directive per tool.
    pub fn last_usage(&self) -> &BTreeMap<ToolId, usize> {
        &self.last_usage
    }

    /// Line of the last tool-change directive for one tool.
    pub fn last_use_of(&self, tool: ToolId) -> Option<usize> {
        self.last_usage.get(&tool).copied()
    }

    /// Whether the tool appears in the file and is not excluded.
    pub fn is_managed(&self, tool: ToolId) -> bool {
        self.usage_lines.contains_key(&tool) && !self.excluded.contains(&tool)
    }

    /// Managed tools, ascending.
    pub fn managed_tools(&self) -> Vec<ToolId> {
        self.tools()
            .filter(|tool| !self.excluded.contains(tool))
            .collect()
    }

    /// Tools excluded by configuration.
    pub fn excluded(&self) -> &BTreeSet<ToolId> {
        &self.excluded
    }

    /// Estimated time of the next selection of `tool` strictly after
    /// `line`, or `None` when the tool is never selected again.
    pub fn next_use_after(&self, tool: ToolId, line: usize) -> Option<f64> {
        self.timeline.get(&tool)?.iter().find_map(|&(use_line, at)| {
            if use_line > line {
                Some(at)
            } else {
                None
            }
        })
    }
}
