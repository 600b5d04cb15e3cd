//! Per-stage configuration options
//!
//! Options reach stages as strings regardless of how the settings file
//! spelled them; stages pull them out through typed getters and supply
//! their own defaults. Unparsable values fall back to the default
//! rather than failing the run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// String-keyed option bag for one configured stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageConfig {
    options: HashMap<String, String>,
}

impl StageConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, builder style.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set an option in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    /// Raw string value of an option, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(|value| value.as_str())
    }

    /// String value of an option, or the given default.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Boolean value of an option.
    ///
    /// `true`, `1`, `yes` and `on` (case-insensitive) read as true; any
    /// other present value reads as false; absence yields the default.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            ),
            None => default,
        }
    }

    /// Integer value of an option, or the default when absent or unparsable.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Float value of an option, or the default when absent or unparsable.
    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Whether any options are set.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}
