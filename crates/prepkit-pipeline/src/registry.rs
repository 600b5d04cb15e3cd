//! Named stage factories and pipeline assembly.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use prepkit_core::{BoxedStage, StageConfig, StageResult};
use prepkit_stages::{EndOfUseShutdown, IdleShutdown, MetadataExtractor, PlaceholderReplacer};

use crate::error::RegistryError;
use crate::pipeline::Pipeline;
use crate::settings::Settings;

/// Builds one stage from its options.
pub type StageFactory = Box<dyn Fn(&StageConfig) -> StageResult<BoxedStage> + Send + Sync>;

/// Registry mapping stage names to factories.
///
/// [`StageRegistry::builtin`] knows every bundled stage; callers can
/// register additional factories under their own names.
pub struct StageRegistry {
    factories: HashMap<String, StageFactory>,
}

impl StageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with all bundled stages registered.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(MetadataExtractor::NAME, |config| {
                Ok(Box::new(MetadataExtractor::from_config(config)))
            })
            .register(PlaceholderReplacer::NAME, |config| {
                Ok(Box::new(PlaceholderReplacer::from_config(config)))
            })
            .register(EndOfUseShutdown::NAME, |config| {
                Ok(Box::new(EndOfUseShutdown::from_config(config)))
            })
            .register(IdleShutdown::NAME, |config| {
                Ok(Box::new(IdleShutdown::from_config(config)))
            });
        registry
    }

    /// Register a factory under a stage name, replacing any previous one.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&StageConfig) -> StageResult<BoxedStage> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Instantiate one stage by name.
    pub fn create(&self, name: &str, config: &StageConfig) -> Result<BoxedStage, RegistryError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| RegistryError::UnknownStage(name.to_string()))?;
        factory(config).map_err(|e| RegistryError::InvalidConfig {
            stage: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Registered stage names, sorted.
    pub fn stage_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Assemble a pipeline from settings.
    ///
    /// Stages are created in the order `settings.stages` lists them;
    /// each name may appear at most once.
    pub fn build_pipeline(&self, settings: &Settings) -> Result<Pipeline, RegistryError> {
        let mut seen = BTreeSet::new();
        let mut stages = Vec::new();
        for name in settings.stage_names() {
            if !seen.insert(name.clone()) {
                return Err(RegistryError::DuplicateStage(name));
            }
            let config = settings.stage_config(&name);
            stages.push(self.create(&name, &config)?);
            debug!("registered pipeline stage '{}'", name);
        }
        Ok(Pipeline::new(stages).with_enabled(settings.enabled))
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
