//! Persistent preprocessing settings.
//!
//! Settings select which stages run (and in what order) and carry
//! per-stage option tables. Files may be JSON or TOML; the format is
//! chosen by file extension.
//!
//! ```toml
//! enabled = true
//! stages = "metadata, placeholders, idle_shutdown"
//!
//! [stage.idle_shutdown]
//! idle_timeout_minutes = 5.0
//! exclude_tools = "0"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use prepkit_core::StageConfig;

use crate::error::SettingsError;

fn default_enabled() -> bool {
    true
}

fn default_stages() -> String {
    "metadata, placeholders".to_string()
}

/// Preprocessing settings, loadable from JSON or TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Master switch; when false every run is skipped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Comma-separated stage names, in execution order.
    #[serde(default = "default_stages")]
    pub stages: String,
    /// Per-stage option tables, keyed by stage name.
    #[serde(default)]
    pub stage: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: default_enabled(),
            stages: default_stages(),
            stage: BTreeMap::new(),
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

impl Settings {
    /// Stage names from the `stages` list, trimmed, empty entries dropped.
    pub fn stage_names(&self) -> Vec<String> {
        self.stages
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Options for one stage as a [`StageConfig`].
    ///
    /// Scalar values (string, integer, float, boolean) are converted to
    /// their string form; a stage with no option table gets an empty
    /// config.
    pub fn stage_config(&self, name: &str) -> StageConfig {
        let mut config = StageConfig::new();
        if let Some(table) = self.stage.get(name) {
            for (key, value) in table {
                if let Some(text) = scalar_to_string(value) {
                    config.set(key, text);
                }
            }
        }
        config
    }

    /// Checks that every stage option is a scalar value.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (stage_name, table) in &self.stage {
            for (key, value) in table {
                if scalar_to_string(value).is_none() {
                    return Err(SettingsError::Invalid(format!(
                        "Option '{}' for stage '{}' must be a string, number, or boolean",
                        key, stage_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Loads and validates settings from a JSON or TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;

        let settings: Settings = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)?
        } else {
            return Err(SettingsError::UnknownFormat {
                path: path.to_path_buf(),
            });
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Saves settings to a JSON or TOML file, chosen by extension.
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)?
        } else {
            return Err(SettingsError::UnknownFormat {
                path: path.to_path_buf(),
            });
        };

        fs::write(path, content)?;
        Ok(())
    }
}
