//! Predictive idle tool shutdown stage
//!
//! Extends end-of-use shutdown with a forward-looking check: at every
//! tool change the stage asks how long the tool being switched away
//! will sit idle, using a kinematic time estimate built during
//! pre-scan. A tool predicted to idle past the configured timeout is
//! shut down immediately at the switch, not when its last use ends.
//! A later heater command that targets it re-arms the prediction.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info, warn};

use prepkit_core::gcode::{self, ToolId};
use prepkit_core::{fileio, Context, Stage, StageConfig, StageResult};

use super::{end_of_use_shutdown_lines, TimeEstimator, ToolUsage};

fn to_tool_id(value: f64) -> Option<ToolId> {
    if value >= 0.0 && value <= f64::from(ToolId::MAX) {
        Some(value as ToolId)
    } else {
        None
    }
}

/// Shuts tools down at their last use or ahead of long idle gaps.
///
/// Options: `idle_timeout_minutes` (0 or negative disables the
/// predictive check), `initial_feedrate` for the time estimate before
/// the file sets one, and `exclude_tools` as in the end-of-use stage.
pub struct IdleShutdown {
    excluded: BTreeSet<ToolId>,
    idle_timeout_minutes: f64,
    idle_timeout_seconds: f64,
    predictive_enabled: bool,
    initial_feedrate: f64,
    description: String,

    usage: ToolUsage,
    cumulative_times: Vec<f64>,
    current_time: f64,
    current_tool: Option<ToolId>,
    pending_cooldown: Option<ToolId>,
    cooled: BTreeSet<ToolId>,
    idle_shutdown: BTreeSet<ToolId>,
}

impl IdleShutdown {
    /// Registry name of this stage.
    pub const NAME: &'static str = "idle_shutdown";

    /// Create a stage with the predictive check disabled.
    pub fn new() -> Self {
        Self::from_config(&StageConfig::default())
    }

    /// Create a stage from stage options.
    pub fn from_config(config: &StageConfig) -> Self {
        let excluded: BTreeSet<ToolId> = gcode::parse_tool_list(config.get_or("exclude_tools", ""))
            .into_iter()
            .collect();
        let idle_timeout_minutes = config.get_float("idle_timeout_minutes", 0.0);
        let predictive_enabled = idle_timeout_minutes > 0.0;
        let initial_feedrate = config.get_float("initial_feedrate", 3000.0);

        let mut description = String::from("Automatically shuts down tools after their last usage");
        if predictive_enabled {
            description.push_str(&format!(" or when idle > {} minutes", idle_timeout_minutes));
        }

        Self {
            excluded,
            idle_timeout_minutes,
            idle_timeout_seconds: idle_timeout_minutes * 60.0,
            predictive_enabled,
            initial_feedrate,
            description,
            usage: ToolUsage::default(),
            cumulative_times: Vec::new(),
            current_time: 0.0,
            current_tool: None,
            pending_cooldown: None,
            cooled: BTreeSet::new(),
            idle_shutdown: BTreeSet::new(),
        }
    }

    /// Clear the idle mark when a heater command reheats a tool.
    fn check_reheat(&mut self, line: &str, line_number: usize) {
        if !gcode::is_heater_command(line) {
            return;
        }
        let params = gcode::parse_params(line);
        let (Some(&tool), Some(&temperature)) = (params.get(&'T'), params.get(&'S')) else {
            return;
        };
        if temperature <= 0.0 {
            return;
        }
        if let Some(tool) = to_tool_id(tool) {
            if self.idle_shutdown.remove(&tool) {
                info!(
                    "idle_shutdown: T{} reheated to {}C at line {}, allowing future predictive cooldown",
                    tool, temperature, line_number
                );
            }
        }
    }

    /// Emit an immediate shutdown when the tool being switched away is
    /// predicted to idle past the timeout before its next use.
    fn check_predictive(&mut self, previous: ToolId, line_number: usize, output: &mut Vec<String>) {
        if !self.predictive_enabled
            || !self.usage.is_managed(previous)
            || self.idle_shutdown.contains(&previous)
        {
            return;
        }
        let Some(next_use) = self.usage.next_use_after(previous, line_number) else {
            // Never selected again; the end-of-use path covers it
            return;
        };

        let predicted_idle = next_use - self.current_time;
        if predicted_idle >= self.idle_timeout_seconds {
            output.push(format!(
                "; T{} will be idle for {:.2} minutes - cooling down",
                previous,
                predicted_idle / 60.0
            ));
            output.push(gcode::format_tool_temp_command(previous, 0));
            self.idle_shutdown.insert(previous);
            info!(
                "idle_shutdown: inserted predictive cooldown for T{} at line {}, predicted_idle={:.2}min",
                previous,
                line_number,
                predicted_idle / 60.0
            );
        }
    }

    /// Flag the switched-away tool for an end-of-use cooldown when its
    /// last selection is behind us.
    fn schedule_if_done(&mut self, previous: ToolId, line_number: usize) {
        if !self.usage.is_managed(previous) || self.cooled.contains(&previous) {
            return;
        }
        if self
            .usage
            .last_use_of(previous)
            .map_or(true, |last| line_number >= last)
        {
            self.pending_cooldown = Some(previous);
        }
    }
}

impl Default for IdleShutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for IdleShutdown {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn pre_scan(&mut self, path: &Path, context: &mut Context) -> StageResult<()> {
        self.usage = ToolUsage::new(self.excluded.clone());
        self.cumulative_times.clear();
        self.current_time = 0.0;
        self.current_tool = None;
        self.pending_cooldown = None;
        self.cooled.clear();
        self.idle_shutdown.clear();

        let lines = fileio::read_lines(path)?;
        let mut estimator = TimeEstimator::new(self.initial_feedrate);

        for (line_number, line) in lines.iter().enumerate() {
            // Time at the start of this line, before its own contribution
            let at = estimator.elapsed();
            if self.predictive_enabled {
                self.cumulative_times.push(at);
            }

            if let Some(tool) = gcode::extract_tool_number(line) {
                if self.predictive_enabled {
                    self.usage.record_timed(tool, line_number, at);
                } else {
                    self.usage.record(tool, line_number);
                }
            }

            if self.predictive_enabled {
                estimator.advance(line);
            }
        }

        info!(
            "idle_shutdown: {} tools used, managing {:?}, excluded {:?}",
            self.usage.tool_count(),
            self.usage.managed_tools(),
            self.usage.excluded()
        );
        debug!("idle_shutdown: last usage map {:?}", self.usage.last_usage());
        if self.predictive_enabled {
            info!(
                "idle_shutdown: idle timeout {} minutes, estimated print time {:.2} minutes",
                self.idle_timeout_minutes,
                estimator.elapsed() / 60.0
            );
        }

        context.metadata.tools_used = self.usage.tools().collect();
        context.metadata.tool_last_usage = self.usage.last_usage().clone();

        Ok(())
    }

    fn transform_line(&mut self, line: &str, context: &mut Context) -> Vec<String> {
        let mut output = Vec::with_capacity(1);
        let line_number = context.current_line;

        if self.predictive_enabled {
            if let Some(&at) = self.cumulative_times.get(line_number) {
                self.current_time = at;
            }
        }

        self.check_reheat(line, line_number);

        // End-of-use flush, suppressed when the idle path already
        // cooled the tool and nothing reheated it since
        if let Some(tool) = self.pending_cooldown.take() {
            if !self.idle_shutdown.contains(&tool) {
                output.extend(end_of_use_shutdown_lines(tool));
                self.cooled.insert(tool);
                info!(
                    "idle_shutdown: inserted end-of-use cooldown for T{} at line {}",
                    tool, line_number
                );
            }
        }

        if let Some(tool) = gcode::extract_tool_number(line) {
            let previous = self.current_tool.replace(tool);
            debug!(
                "idle_shutdown: tool change to T{} at line {}, time={:.2}min",
                tool,
                line_number,
                self.current_time / 60.0
            );
            if let Some(previous) = previous {
                if previous != tool {
                    self.check_predictive(previous, line_number, &mut output);
                    self.schedule_if_done(previous, line_number);
                }
            }
        }

        output.push(line.to_string());
        output
    }

    fn finalize(&mut self, _path: &Path, _context: &mut Context) -> StageResult<()> {
        if let Some(tool) = self.pending_cooldown {
            warn!(
                "idle_shutdown: T{} still had a pending cooldown at end of file",
                tool
            );
        }
        if self.predictive_enabled {
            info!(
                "idle_shutdown: {} tools shut down for idle timeout: {:?}",
                self.idle_shutdown.len(),
                self.idle_shutdown
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run_stage(content: &str, config: &StageConfig) -> Vec<String> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.gcode");
        fs::write(&path, content).unwrap();

        let mut stage = IdleShutdown::from_config(config);
        let mut context = Context::new(&path);
        stage.pre_scan(&path, &mut context).unwrap();

        let lines = fileio::read_lines(&path).unwrap();
        context.total_lines = lines.len();
        let mut output = Vec::new();
        for (line_number, line) in lines.iter().enumerate() {
            context.current_line = line_number;
            output.extend(stage.transform_line(line, &mut context));
        }
        stage.finalize(&path, &mut context).unwrap();
        output
    }

    fn count_of(output: &[String], needle: &str) -> usize {
        output.iter().filter(|line| line.as_str() == needle).count()
    }

    // Alternating T1/T2 with ~two seconds of motion between switches.
    // With a 0.01 minute timeout every gap counts as idle.
    const ALTERNATING: &str = "\
T1
G1 X0 Y0 F3000
G1 X100
T2
G1 X0
M104 T1 S200
T1
G1 X100
T2
M104 T1 S200
G1 X0
T1
G1 X100
";

    #[test]
    fn test_predictive_shutdown_at_switch() {
        let config = StageConfig::new().with_option("idle_timeout_minutes", "0.01");
        let output = run_stage(ALTERNATING, &config);

        // Shutdown lands before the switch line, not after it
        let first_t2 = output.iter().position(|line| line == "T2").unwrap();
        assert_eq!(output[first_t2 - 1], "M104 T1 S0");
        assert!(output[first_t2 - 2].starts_with("; T1 will be idle for"));
    }

    #[test]
    fn test_reheat_rearms_prediction() {
        let config = StageConfig::new().with_option("idle_timeout_minutes", "0.01");
        let output = run_stage(ALTERNATING, &config);

        // T1 is shut down predictively at both switches away from it;
        // the M104 T1 S200 lines in between re-arm the check.
        assert_eq!(count_of(&output, "M104 T1 S0"), 2);
    }

    #[test]
    fn test_idle_shutdown_suppresses_end_of_use() {
        let config = StageConfig::new().with_option("idle_timeout_minutes", "0.01");
        let output = run_stage(ALTERNATING, &config);

        // T2 is idle-shut-down once at the switch back to T1 and never
        // reheated, so the end-of-use pass must not cool it again.
        assert_eq!(count_of(&output, "M104 T2 S0"), 1);
        assert!(!output.iter().any(|line| line.contains("T2 no longer needed")));
    }

    #[test]
    fn test_below_threshold_gap_defers_to_end_of_use() {
        let config = StageConfig::new().with_option("idle_timeout_minutes", "60");
        let output = run_stage(ALTERNATING, &config);

        // Two-second gaps never reach a one-hour timeout; only the
        // end-of-use inserts remain (T2 at the final switch to T1).
        assert!(!output.iter().any(|line| line.contains("will be idle")));
        assert_eq!(count_of(&output, "M104 T2 S0"), 1);
        assert!(output.iter().any(|line| line.contains("T2 no longer needed")));
    }

    #[test]
    fn test_disabled_timeout_behaves_like_end_of_use() {
        let output = run_stage(ALTERNATING, &StageConfig::default());
        assert!(!output.iter().any(|line| line.contains("will be idle")));
        assert_eq!(count_of(&output, "M104 T2 S0"), 1);
    }

    #[test]
    fn test_excluded_tool_is_never_predicted() {
        let config = StageConfig::new()
            .with_option("idle_timeout_minutes", "0.01")
            .with_option("exclude_tools", "1");
        let output = run_stage(ALTERNATING, &config);
        assert_eq!(count_of(&output, "M104 T1 S0"), 0);
    }

    #[test]
    fn test_description_reflects_timeout() {
        let stage = IdleShutdown::new();
        assert_eq!(
            stage.description(),
            "Automatically shuts down tools after their last usage"
        );

        let config = StageConfig::new().with_option("idle_timeout_minutes", "5");
        let stage = IdleShutdown::from_config(&config);
        assert_eq!(
            stage.description(),
            "Automatically shuts down tools after their last usage or when idle > 5 minutes"
        );
    }
}
