//! Step kind registry: string identifier to factory dispatch.
//!
//! Hundreds of step kinds plug into the engine through this one seam. The
//! registry is an explicit context object, built once at startup and passed
//! down; there is no process-wide lazily-initialized registry.

use std::collections::HashMap;

use rowmill_types::StepError;

use crate::step::Step;
use crate::steps;

/// Factory producing a step instance from its JSON configuration. Called
/// once per (step, copy).
pub type StepFactory = fn(&serde_json::Value) -> Result<Box<dyn Step>, StepError>;

/// Maps step kind identifiers to factories.
#[derive(Default)]
pub struct StepRegistry {
    factories: HashMap<String, StepFactory>,
}

impl StepRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in steps.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("row-generator", steps::RowGenerator::from_json);
        registry.register("filter-rows", steps::FilterRows::from_json);
        registry.register("select-values", steps::SelectValues::from_json);
        registry.register("dummy", steps::Dummy::from_json);
        registry
    }

    /// Register a kind; replaces any existing factory for the same kind.
    pub fn register(&mut self, kind: impl Into<String>, factory: StepFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Instantiate a step of the given kind.
    pub fn create(
        &self,
        kind: &str,
        config: &serde_json::Value,
    ) -> Result<Box<dyn Step>, StepError> {
        let factory = self.factories.get(kind).ok_or_else(|| {
            StepError::config("UNKNOWN_STEP_KIND", format!("no step kind '{kind}'"))
        })?;
        factory(config)
    }
}
