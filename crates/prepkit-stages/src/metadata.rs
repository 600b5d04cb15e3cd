//! Slicer metadata extraction stage
//!
//! Scans slicer-generated comments for colors, materials, temperatures
//! and tool usage, and publishes everything it finds into the run
//! context for later stages. The transform pass leaves every line
//! unchanged.

use std::collections::BTreeSet;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info};

use prepkit_core::gcode::{self, ToolId};
use prepkit_core::{fileio, Context, Stage, StageConfig, StageResult};

/// Slicers whose comment dialect the extractor recognizes.
const SUPPORTED_SLICERS: &[&str] = &["PrusaSlicer", "SuperSlicer", "OrcaSlicer", "BambuStudio"];

fn slicer_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*;\s*(?:generated by\s+(\w+)|(BambuStudio))")
            .expect("invalid regex pattern")
    })
}

fn color_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*;\s*(?:extruder_colour|extruder_color|filament_colour|filament_color)\s*=\s*(.+)$")
            .expect("invalid regex pattern")
    })
}

fn material_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*;\s*filament_type\s*=\s*(.+)$").expect("invalid regex pattern")
    })
}

fn temperature_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*;\s*(?:nozzle_)?temperature\s*=\s*(.+)$")
            .expect("invalid regex pattern")
    })
}

fn purge_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*;\s*flush_volumes_matrix\s*=\s*(.+)$")
            .expect("invalid regex pattern")
    })
}

fn filament_name_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*;\s*(filament_settings_id|filament_name)\s*=\s*(.+)$")
            .expect("invalid regex pattern")
    })
}

/// Split a slicer list value on the given separators, trimming entries.
fn split_list(value: &str, separators: &[char]) -> Vec<String> {
    value
        .split(separators)
        .map(|entry| entry.trim().to_string())
        .collect()
}

/// Merge a second color list into an existing one, keeping non-empty
/// slots from the first and filling empty slots from the second.
fn merge_colors(existing: &[String], incoming: &[String]) -> Vec<String> {
    existing
        .iter()
        .zip(incoming)
        .map(|(old, new)| {
            if old.is_empty() {
                new.clone()
            } else {
                old.clone()
            }
        })
        .collect()
}

/// Extracts slicer metadata from G-code comments.
///
/// Each extraction family can be toggled through stage options
/// (`extract_tools`, `extract_colors`, `extract_materials`,
/// `extract_temperatures`, `extract_purge_volumes`,
/// `extract_filament_names`). Colors keep merging across lines until
/// every extruder slot is non-empty; the other families stop at the
/// first matching line.
pub struct MetadataExtractor {
    extract_tools: bool,
    extract_colors: bool,
    extract_materials: bool,
    extract_temperatures: bool,
    extract_purge_volumes: bool,
    extract_filament_names: bool,

    slicer: Option<String>,
    colors: Vec<String>,
    materials: Vec<String>,
    temperatures: Vec<String>,
    purge_volumes: Vec<String>,
    filament_names: Vec<String>,
    tools_used: BTreeSet<ToolId>,
    total_toolchanges: u32,

    found_colors: bool,
    found_materials: bool,
    found_temperatures: bool,
    found_purge_volumes: bool,
    found_filament_names: bool,
}

impl MetadataExtractor {
    /// Registry name of this stage.
    pub const NAME: &'static str = "metadata";

    /// Create an extractor with default options.
    pub fn new() -> Self {
        Self::from_config(&StageConfig::default())
    }

    /// Create an extractor from stage options.
    pub fn from_config(config: &StageConfig) -> Self {
        Self {
            extract_tools: config.get_bool("extract_tools", true),
            extract_colors: config.get_bool("extract_colors", true),
            extract_materials: config.get_bool("extract_materials", true),
            extract_temperatures: config.get_bool("extract_temperatures", true),
            extract_purge_volumes: config.get_bool("extract_purge_volumes", false),
            extract_filament_names: config.get_bool("extract_filament_names", false),
            slicer: None,
            colors: Vec::new(),
            materials: Vec::new(),
            temperatures: Vec::new(),
            purge_volumes: Vec::new(),
            filament_names: Vec::new(),
            tools_used: BTreeSet::new(),
            total_toolchanges: 0,
            found_colors: false,
            found_materials: false,
            found_temperatures: false,
            found_purge_volumes: false,
            found_filament_names: false,
        }
    }

    fn reset(&mut self) {
        self.slicer = None;
        self.colors.clear();
        self.materials.clear();
        self.temperatures.clear();
        self.purge_volumes.clear();
        self.filament_names.clear();
        self.tools_used.clear();
        self.total_toolchanges = 0;
        self.found_colors = false;
        self.found_materials = false;
        self.found_temperatures = false;
        self.found_purge_volumes = false;
        self.found_filament_names = false;
    }

    fn scan_line(&mut self, line: &str) {
        let comment = gcode::is_comment(line);

        if self.slicer.is_none() && comment {
            if let Some(captures) = slicer_regex().captures(line) {
                let name = captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .map(|m| m.as_str().to_string());
                if let Some(name) = name {
                    if SUPPORTED_SLICERS.contains(&name.as_str()) {
                        info!("metadata: detected slicer {}", name);
                    }
                    self.slicer = Some(name);
                }
            }
        }

        if self.extract_tools {
            if let Some(tool) = gcode::extract_tool_number(line) {
                self.tools_used.insert(tool);
                self.total_toolchanges += 1;
            }
        }

        if self.extract_colors && !self.found_colors && comment {
            if let Some(captures) = color_regex().captures(line) {
                let incoming: Vec<String> = split_list(&captures[1], &[';'])
                    .into_iter()
                    .map(|entry| entry.trim_start_matches('#').to_string())
                    .collect();
                if self.colors.is_empty() {
                    self.colors = incoming;
                } else {
                    self.colors = merge_colors(&self.colors, &incoming);
                }
                self.found_colors = self.colors.iter().all(|color| !color.is_empty());
            }
        }

        if self.extract_materials && !self.found_materials && comment {
            if let Some(captures) = material_regex().captures(line) {
                self.materials = split_list(&captures[1], &[';']);
                self.found_materials = true;
            }
        }

        if self.extract_temperatures && !self.found_temperatures && comment {
            if let Some(captures) = temperature_regex().captures(line) {
                self.temperatures = split_list(&captures[1], &[';', ',']);
                self.found_temperatures = true;
            }
        }

        if self.extract_purge_volumes && !self.found_purge_volumes && comment {
            if let Some(captures) = purge_regex().captures(line) {
                self.purge_volumes = split_list(&captures[1], &[',']);
                self.found_purge_volumes = true;
            }
        }

        if self.extract_filament_names && !self.found_filament_names && comment {
            if let Some(captures) = filament_name_regex().captures(line) {
                self.filament_names = split_list(&captures[2], &[';', ','])
                    .into_iter()
                    .map(|entry| entry.trim_matches('"').to_string())
                    .collect();
                self.found_filament_names = true;
            }
        }
    }
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for MetadataExtractor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Extracts slicer metadata (colors, materials, temps) from G-code comments"
    }

    fn pre_scan(&mut self, path: &Path, context: &mut Context) -> StageResult<()> {
        self.reset();

        let lines = fileio::read_lines(path)?;
        for line in &lines {
            self.scan_line(line);
        }

        debug!(
            "metadata: slicer={:?} tools={:?} toolchanges={}",
            self.slicer, self.tools_used, self.total_toolchanges
        );

        let metadata = &mut context.metadata;
        metadata.slicer = self.slicer.clone();
        metadata.tools_used = self.tools_used.iter().copied().collect();
        metadata.total_toolchanges = self.total_toolchanges;
        metadata.colors = self.colors.clone();
        metadata.materials = self.materials.clone();
        metadata.temperatures = self.temperatures.clone();
        metadata.purge_volumes = self.purge_volumes.clone();
        metadata.filament_names = self.filament_names.clone();

        Ok(())
    }

    fn transform_line(&mut self, line: &str, _context: &mut Context) -> Vec<String> {
        vec![line.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scan(content: &str) -> Context {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.gcode");
        fs::write(&path, content).unwrap();
        let mut context = Context::new(&path);
        let mut stage = MetadataExtractor::new();
        stage.pre_scan(&path, &mut context).unwrap();
        context
    }

    #[test]
    fn test_extracts_prusa_style_header() {
        let context = scan(
            "; generated by PrusaSlicer 2.7.4+linux-x64-GTK3 on 2026-03-01\n\
             ; extruder_colour = #FF8000;#29B2B2\n\
             ; filament_type = PLA;PETG\n\
             ; temperature = 215,230\n\
             T0\n\
             G1 X10\n\
             T1\n\
             T0\n",
        );

        let metadata = &context.metadata;
        assert_eq!(metadata.slicer.as_deref(), Some("PrusaSlicer"));
        assert_eq!(metadata.colors, vec!["FF8000", "29B2B2"]);
        assert_eq!(metadata.materials, vec!["PLA", "PETG"]);
        assert_eq!(metadata.temperatures, vec!["215", "230"]);
        assert_eq!(metadata.tools_used, vec![0, 1]);
        assert_eq!(metadata.total_toolchanges, 3);
    }

    #[test]
    fn test_detects_bambu_header_line() {
        let context = scan("; HEADER_BLOCK_START\n; BambuStudio 01.09.00.70\nG28\n");
        assert_eq!(context.metadata.slicer.as_deref(), Some("BambuStudio"));
    }

    #[test]
    fn test_colors_merge_prefers_non_empty() {
        let context = scan(
            "; extruder_colour = #FF8000;;#FFFFFF\n\
             ; filament_colour = #111111;#222222;#333333\n",
        );
        assert_eq!(context.metadata.colors, vec!["FF8000", "222222", "FFFFFF"]);
    }

    #[test]
    fn test_first_material_line_wins() {
        let context = scan("; filament_type = PLA\n; filament_type = ABS\n");
        assert_eq!(context.metadata.materials, vec!["PLA"]);
    }

    #[test]
    fn test_toggles_disable_extraction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.gcode");
        fs::write(&path, "; filament_type = PLA\nT0\nT1\n").unwrap();

        let config = StageConfig::new()
            .with_option("extract_tools", "false")
            .with_option("extract_materials", "0");
        let mut stage = MetadataExtractor::from_config(&config);
        let mut context = Context::new(&path);
        stage.pre_scan(&path, &mut context).unwrap();

        assert!(context.metadata.materials.is_empty());
        assert!(context.metadata.tools_used.is_empty());
        assert_eq!(context.metadata.total_toolchanges, 0);
    }

    #[test]
    fn test_optional_families_default_off() {
        let context = scan(
            "; flush_volumes_matrix = 0,280,280,0\n\
             ; filament_settings_id = \"PLA Basic\";\"PETG HF\"\n",
        );
        assert!(context.metadata.purge_volumes.is_empty());
        assert!(context.metadata.filament_names.is_empty());
    }

    #[test]
    fn test_optional_families_opt_in() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.gcode");
        fs::write(
            &path,
            "; flush_volumes_matrix = 0,280,280,0\n; filament_settings_id = \"PLA Basic\";\"PETG HF\"\n",
        )
        .unwrap();

        let config = StageConfig::new()
            .with_option("extract_purge_volumes", "true")
            .with_option("extract_filament_names", "true");
        let mut stage = MetadataExtractor::from_config(&config);
        let mut context = Context::new(&path);
        stage.pre_scan(&path, &mut context).unwrap();

        assert_eq!(
            context.metadata.purge_volumes,
            vec!["0", "280", "280", "0"]
        );
        assert_eq!(context.metadata.filament_names, vec!["PLA Basic", "PETG HF"]);
    }

    #[test]
    fn test_transform_leaves_lines_alone() {
        let mut stage = MetadataExtractor::new();
        let mut context = Context::new("/tmp/test.gcode");
        assert_eq!(
            stage.transform_line("G1 X10 ; wall", &mut context),
            vec!["G1 X10 ; wall"]
        );
    }
}
