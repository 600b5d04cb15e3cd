//! Placeholder substitution stage
//!
//! Rewrites `!token!` placeholders that slicer start/end G-code or
//! custom macros left behind, using the metadata gathered during
//! pre-scan. Comment lines are never rewritten so slicer metadata
//! survives verbatim.

use std::path::Path;

use tracing::debug;

use prepkit_core::{gcode, Context, Stage, StageConfig, StageResult};

/// Replaces metadata placeholders in command lines.
///
/// The token set is fixed: `!tool_count!`, `!tools!`,
/// `!referenced_tools!`, `!total_toolchanges!`, `!colors!`,
/// `!materials!`, `!temperatures!` and `!filament_names!`. Tokens whose
/// metadata is absent are replaced with an empty value (`0` for the
/// tool tokens), never left in place.
pub struct PlaceholderReplacer {
    replacements: Vec<(&'static str, String)>,
}

impl PlaceholderReplacer {
    /// Registry name of this stage.
    pub const NAME: &'static str = "placeholders";

    /// Create a replacer; the replacement map is built during pre-scan.
    pub fn new() -> Self {
        Self {
            replacements: Vec::new(),
        }
    }

    /// Create a replacer from stage options. No options are currently
    /// recognized; the token set is fixed.
    pub fn from_config(_config: &StageConfig) -> Self {
        Self::new()
    }
}

impl Default for PlaceholderReplacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for PlaceholderReplacer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Replaces placeholders (!tool_count!, !colors!, etc.) with actual values"
    }

    fn pre_scan(&mut self, _path: &Path, context: &mut Context) -> StageResult<()> {
        let metadata = &context.metadata;

        let tool_list = if metadata.tools_used.is_empty() {
            "0".to_string()
        } else {
            metadata
                .tools_used
                .iter()
                .map(|tool| tool.to_string())
                .collect::<Vec<_>>()
                .join(",")
        };
        let tool_count = if metadata.tools_used.is_empty() {
            "0".to_string()
        } else {
            metadata.tools_used.len().to_string()
        };

        self.replacements = vec![
            ("!tool_count!", tool_count),
            ("!tools!", tool_list.clone()),
            ("!referenced_tools!", tool_list),
            ("!total_toolchanges!", metadata.total_toolchanges.to_string()),
            ("!colors!", metadata.colors.join(",")),
            ("!materials!", metadata.materials.join(",")),
            ("!temperatures!", metadata.temperatures.join(",")),
            ("!filament_names!", metadata.filament_names.join(",")),
        ];

        debug!("placeholders: replacement map {:?}", self.replacements);
        Ok(())
    }

    fn transform_line(&mut self, line: &str, context: &mut Context) -> Vec<String> {
        // Comment lines keep their placeholders; they are slicer metadata
        if gcode::is_comment(line) {
            return vec![line.to_string()];
        }

        let mut rewritten = line.to_string();
        for (token, value) in &self.replacements {
            if rewritten.contains(token) {
                rewritten = rewritten.replace(token, value);
                debug!(
                    "placeholders: replaced {} with {} at line {}",
                    token, value, context.current_line
                );
            }
        }

        vec![rewritten]
    }
}
