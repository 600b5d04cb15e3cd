//! Three-pass preprocessing pipeline.
//!
//! A [`Pipeline`] owns an ordered list of stages and runs them over one
//! file in three passes:
//!
//! 1. pre-scan: every stage analyzes the whole file and publishes what
//!    it learned into the shared [`Context`],
//! 2. transform: each input line flows through the stages in order,
//!    each stage mapping it to zero or more output lines,
//! 3. finalize: every stage gets a wrap-up call before commit.
//!
//! The rewritten content always starts with a fingerprint comment; a
//! file whose first line already carries one is skipped, which makes
//! runs idempotent. Output is committed by writing a sibling temporary
//! file and renaming it over the original, so a failure in any pass
//! leaves the input byte-identical.

use std::path::Path;

use tracing::{debug, info};

use prepkit_core::gcode::{self, ToolId};
use prepkit_core::{fileio, BoxedStage, Context};

use crate::error::{PassPhase, PipelineError};
use crate::outcome::Outcome;

/// Ordered stages plus the run policy around them.
pub struct Pipeline {
    stages: Vec<BoxedStage>,
    enabled: bool,
    tool_roster: Vec<ToolId>,
}

impl Pipeline {
    /// Create a pipeline over an ordered list of stages.
    pub fn new(stages: Vec<BoxedStage>) -> Self {
        Self {
            stages,
            enabled: true,
            tool_roster: Vec::new(),
        }
    }

    /// Set the master switch; a disabled pipeline skips every file.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Supply the tool roster known from the printer profile.
    ///
    /// Stages see it through [`Context::tools`]; an empty roster never
    /// blocks a run.
    pub fn set_tool_roster(&mut self, tools: Vec<ToolId>) {
        self.tool_roster = tools;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage names in execution order.
    pub fn list_stages(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Stage names and descriptions in execution order.
    pub fn stages(&self) -> Vec<(&str, &str)> {
        self.stages
            .iter()
            .map(|stage| (stage.name(), stage.description()))
            .collect()
    }

    /// Run all three passes over one file and commit the result.
    ///
    /// Returns a skipped [`Outcome`] (not an error) when the pipeline
    /// is disabled, the file is already fingerprinted, or no stage
    /// elects to process it. Every error path returns before the
    /// commit rename, leaving the input untouched.
    pub fn run(&mut self, path: &Path) -> Result<Outcome, PipelineError> {
        if !self.enabled {
            info!("preprocessing disabled, skipping {}", path.display());
            return Ok(Outcome::skipped("preprocessing disabled"));
        }
        if !path.exists() {
            return Err(PipelineError::NotFound {
                path: path.to_path_buf(),
            });
        }
        if fileio::first_line(path)?.is_some_and(|line| gcode::has_fingerprint(&line)) {
            info!("{} already preprocessed, skipping", path.display());
            return Ok(Outcome::skipped("file already preprocessed"));
        }

        let mut context = Context::new(path);
        context.tools = self.tool_roster.clone();

        let active: Vec<usize> = self
            .stages
            .iter()
            .enumerate()
            .filter(|(_, stage)| stage.can_process(path, &context))
            .map(|(index, _)| index)
            .collect();
        if active.is_empty() {
            info!("no applicable stages for {}", context.file_name());
            return Ok(Outcome::skipped("no applicable stages"));
        }

        info!(
            "preprocessing {} with {} stages",
            context.file_name(),
            active.len()
        );

        for &index in &active {
            let stage_name = self.stages[index].name().to_string();
            debug!("pre-scan: {}", stage_name);
            self.stages[index]
                .pre_scan(path, &mut context)
                .map_err(|source| PipelineError::Stage {
                    stage: stage_name,
                    phase: PassPhase::PreScan,
                    source,
                })?;
        }

        let lines = fileio::read_lines(path)?;
        context.total_lines = lines.len();

        let mut output: Vec<String> = Vec::with_capacity(lines.len() + 1);
        output.push(gcode::fingerprint_line(context.metadata.slicer.as_deref()));

        let mut current: Vec<String> = Vec::new();
        let mut next: Vec<String> = Vec::new();
        for (line_number, line) in lines.iter().enumerate() {
            context.current_line = line_number;
            current.clear();
            current.push(line.clone());
            for &index in &active {
                next.clear();
                for text in &current {
                    next.extend(self.stages[index].transform_line(text, &mut context));
                }
                std::mem::swap(&mut current, &mut next);
                // A line mapped to nothing cannot reappear downstream
                if current.is_empty() {
                    break;
                }
            }
            output.append(&mut current);
        }

        for &index in &active {
            let stage_name = self.stages[index].name().to_string();
            debug!("finalize: {}", stage_name);
            self.stages[index]
                .finalize(path, &mut context)
                .map_err(|source| PipelineError::Stage {
                    stage: stage_name,
                    phase: PassPhase::Finalize,
                    source,
                })?;
        }

        fileio::commit_lines(path, &output)?;

        let applied_stages: Vec<String> = active
            .iter()
            .map(|&index| self.stages[index].name().to_string())
            .collect();
        info!(
            "{}: {} lines in, {} lines out",
            context.file_name(),
            context.total_lines,
            output.len()
        );

        Ok(Outcome {
            processed: true,
            message: format!("processed by {} stages", applied_stages.len()),
            applied_stages,
            metadata: context.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prepkit_core::{Stage, StageResult};
    use std::fs;
    use tempfile::TempDir;

    struct Uppercase;

    impl Stage for Uppercase {
        fn name(&self) -> &str {
            "uppercase"
        }

        fn description(&self) -> &str {
            "uppercases commands"
        }

        fn pre_scan(&mut self, _path: &Path, _context: &mut Context) -> StageResult<()> {
            Ok(())
        }

        fn transform_line(&mut self, line: &str, _context: &mut Context) -> Vec<String> {
            vec![line.to_uppercase()]
        }
    }

    struct DropComments;

    impl Stage for DropComments {
        fn name(&self) -> &str {
            "drop_comments"
        }

        fn description(&self) -> &str {
            "removes comment lines"
        }

        fn pre_scan(&mut self, _path: &Path, _context: &mut Context) -> StageResult<()> {
            Ok(())
        }

        fn transform_line(&mut self, line: &str, _context: &mut Context) -> Vec<String> {
            if gcode::is_comment(line) {
                vec![]
            } else {
                vec![line.to_string()]
            }
        }
    }

    fn write_file(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("test.gcode");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_disabled_pipeline_skips() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "g28\n");
        let mut pipeline = Pipeline::new(vec![Box::new(Uppercase)]).with_enabled(false);

        let outcome = pipeline.run(&path).unwrap();
        assert!(!outcome.processed);
        assert_eq!(outcome.message, "preprocessing disabled");
        assert_eq!(fs::read_to_string(&path).unwrap(), "g28\n");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.gcode");
        let mut pipeline = Pipeline::new(vec![Box::new(Uppercase)]);

        let err = pipeline.run(&path).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { .. }));
    }

    #[test]
    fn test_empty_pipeline_skips() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "g28\n");
        let mut pipeline = Pipeline::new(vec![]);

        let outcome = pipeline.run(&path).unwrap();
        assert!(!outcome.processed);
        assert_eq!(outcome.message, "no applicable stages");
        assert_eq!(fs::read_to_string(&path).unwrap(), "g28\n");
    }

    #[test]
    fn test_stages_run_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "g28\n; note\nt0\n");
        let mut pipeline =
            Pipeline::new(vec![Box::new(DropComments), Box::new(Uppercase)]);

        let outcome = pipeline.run(&path).unwrap();
        assert!(outcome.processed);
        assert_eq!(outcome.applied_stages, vec!["drop_comments", "uppercase"]);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(gcode::has_fingerprint(lines[0]));
        assert_eq!(&lines[1..], &["G28", "T0"]);
    }

    struct DropLowercaseMarker;

    impl Stage for DropLowercaseMarker {
        fn name(&self) -> &str {
            "drop_marker"
        }

        fn description(&self) -> &str {
            "deletes lines containing a lowercase marker"
        }

        fn pre_scan(&mut self, _path: &Path, _context: &mut Context) -> StageResult<()> {
            Ok(())
        }

        fn transform_line(&mut self, line: &str, _context: &mut Context) -> Vec<String> {
            if line.contains("marker") {
                vec![]
            } else {
                vec![line.to_string()]
            }
        }
    }

    #[test]
    fn test_stage_order_changes_output() {
        let dir = TempDir::new().unwrap();
        let content = "G28\nmarker\nG1 X10\n";

        // Uppercasing first hides the marker from the delete stage
        let path = write_file(&dir, content);
        let mut pipeline =
            Pipeline::new(vec![Box::new(Uppercase), Box::new(DropLowercaseMarker)]);
        pipeline.run(&path).unwrap();
        let upper_first = fileio::read_lines(&path).unwrap();
        assert!(upper_first.contains(&"MARKER".to_string()));

        // Deleting first removes the line before it can be uppercased
        let other = dir.path().join("other.gcode");
        fs::write(&other, content).unwrap();
        let mut pipeline =
            Pipeline::new(vec![Box::new(DropLowercaseMarker), Box::new(Uppercase)]);
        pipeline.run(&other).unwrap();
        let drop_first = fileio::read_lines(&other).unwrap();
        assert!(!drop_first.iter().any(|line| line.contains("MARKER")));
        assert_eq!(drop_first.len(), upper_first.len() - 1);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "g28\n");
        let mut pipeline = Pipeline::new(vec![Box::new(Uppercase)]);

        assert!(pipeline.run(&path).unwrap().processed);
        let after_first = fs::read_to_string(&path).unwrap();

        let outcome = pipeline.run(&path).unwrap();
        assert!(!outcome.processed);
        assert_eq!(outcome.message, "file already preprocessed");
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
    }

    #[test]
    fn test_empty_file_gets_fingerprint_only() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "");
        let mut pipeline = Pipeline::new(vec![Box::new(Uppercase)]);

        let outcome = pipeline.run(&path).unwrap();
        assert!(outcome.processed);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(gcode::has_fingerprint(lines[0]));
    }
}
