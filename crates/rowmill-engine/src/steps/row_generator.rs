//! Source step: emits a constant row a fixed number of times.

use serde::Deserialize;

use rowmill_types::{Row, StepError, Value};

use crate::step::{Step, StepIo};

#[derive(Debug, Clone, Deserialize)]
pub struct RowGeneratorConfig {
    /// Number of rows to emit; the source's self-determined termination.
    pub limit: u64,
    /// The fields of every emitted row.
    pub fields: Vec<Value>,
}

/// Emits `limit` copies of the configured row, then signals done.
pub struct RowGenerator {
    config: RowGeneratorConfig,
    emitted: u64,
}

impl RowGenerator {
    #[must_use]
    pub fn new(config: RowGeneratorConfig) -> Self {
        Self { config, emitted: 0 }
    }

    pub fn from_json(config: &serde_json::Value) -> Result<Box<dyn Step>, StepError> {
        let config: RowGeneratorConfig = serde_json::from_value(config.clone())
            .map_err(|e| StepError::config("BAD_ROW_GENERATOR_CONFIG", e.to_string()))?;
        Ok(Box::new(Self::new(config)))
    }
}

impl Step for RowGenerator {
    fn init(&mut self) -> Result<(), StepError> {
        if self.config.fields.is_empty() {
            return Err(StepError::config(
                "NO_FIELDS",
                "row-generator needs at least one field",
            ));
        }
        let mut seen: Vec<&str> = Vec::new();
        for field in &self.config.fields {
            if seen.contains(&field.name()) {
                tracing::warn!(
                    field = field.name(),
                    "duplicate field name in generated row; only the first is addressable by name"
                );
            }
            seen.push(field.name());
        }
        Ok(())
    }

    fn process_row(&mut self, io: &mut StepIo) -> Result<bool, StepError> {
        if self.emitted >= self.config.limit {
            return Ok(false);
        }
        let row = Row::from_values(self.config.fields.clone());
        io.put_row(row)?;
        self.emitted += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_typed_fields() {
        let json = serde_json::json!({
            "limit": 5,
            "fields": [
                { "name": "id", "type": "integer", "value": 1 },
                { "name": "label", "type": "string", "value": "x" }
            ]
        });
        let config: RowGeneratorConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.limit, 5);
        assert_eq!(config.fields.len(), 2);
        assert_eq!(config.fields[0], Value::integer("id", 1));
    }

    #[test]
    fn empty_fields_fail_init() {
        let mut step = RowGenerator::new(RowGeneratorConfig { limit: 1, fields: vec![] });
        assert!(step.init().is_err());
    }
}
