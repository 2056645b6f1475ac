//! Pipeline definition types, deserialized from YAML.

use serde::Deserialize;

/// A full pipeline definition: steps, hops and resource settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, for logging and reporting.
    pub pipeline: String,
    #[serde(default)]
    pub resources: Resources,
    pub steps: Vec<StepConfig>,
    #[serde(default)]
    pub hops: Vec<HopConfig>,
}

/// Engine resource settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// Capacity of every row queue; the backpressure bound.
    pub queue_capacity: usize,
    /// Per-step cap on rows diverted to an error output
    /// (`None` = unlimited).
    pub max_errors: Option<u64>,
}

impl Resources {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            max_errors: None,
        }
    }
}

/// One step definition.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    /// Unique step name; hop endpoints refer to it.
    pub name: String,
    /// Step kind identifier, resolved through the registry.
    pub kind: String,
    /// Parallel copies of this step (data-parallel scale-out).
    #[serde(default = "default_copies")]
    pub copies: usize,
    /// Kind-specific configuration, passed to the step factory.
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_copies() -> usize {
    1
}

/// One directed connection between two steps.
#[derive(Debug, Clone, Deserialize)]
pub struct HopConfig {
    pub from: String,
    pub to: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Error hop: carries rows the origin step diverted on row-level
    /// errors, not its main output.
    #[serde(default)]
    pub error: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let yaml = r"
pipeline: demo
steps:
  - name: gen
    kind: row-generator
";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.resources.queue_capacity, 1000);
        assert_eq!(config.resources.max_errors, None);
        assert_eq!(config.steps[0].copies, 1);
        assert!(config.steps[0].config.is_null());
        assert!(config.hops.is_empty());
    }

    #[test]
    fn full_definition_parses() {
        let yaml = r#"
pipeline: demo
resources:
  queue_capacity: 2
  max_errors: 10
steps:
  - name: gen
    kind: row-generator
    config:
      limit: 5
      fields:
        - { name: n, type: integer, value: 1 }
  - name: sink
    kind: dummy
    copies: 2
hops:
  - { from: gen, to: sink }
  - { from: gen, to: sink, enabled: false }
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.resources.queue_capacity, 2);
        assert_eq!(config.steps.len(), 2);
        assert_eq!(config.steps[1].copies, 2);
        assert!(config.hops[0].enabled);
        assert!(!config.hops[1].enabled);
        assert!(!config.hops[0].error);
    }
}
