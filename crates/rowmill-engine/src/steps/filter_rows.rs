//! Condition-based row filter and router.

use serde::Deserialize;

use rowmill_types::{Condition, EvalError, StepError};

use crate::step::{Step, StepIo};

#[derive(Debug, Clone, Deserialize)]
pub struct FilterRowsConfig {
    /// Condition evaluated against every incoming row.
    pub condition: Condition,
    /// Target step for matching rows; all outputs when unset.
    #[serde(default)]
    pub send_true_to: Option<String>,
    /// Target step for non-matching rows; dropped when unset.
    #[serde(default)]
    pub send_false_to: Option<String>,
}

/// Routes rows by a [`Condition`]: matches to the true target (or every
/// output), non-matches to the false target (or dropped). Evaluation
/// failures are row-scoped and divertible to an error output.
pub struct FilterRows {
    config: FilterRowsConfig,
}

impl FilterRows {
    #[must_use]
    pub fn new(config: FilterRowsConfig) -> Self {
        Self { config }
    }

    pub fn from_json(config: &serde_json::Value) -> Result<Box<dyn Step>, StepError> {
        let config: FilterRowsConfig = serde_json::from_value(config.clone())
            .map_err(|e| StepError::config("BAD_FILTER_CONFIG", e.to_string()))?;
        Ok(Box::new(Self::new(config)))
    }
}

fn map_eval_error(err: EvalError) -> StepError {
    match err {
        EvalError::FieldNotFound(field) => StepError::missing_field(field),
        other => StepError::data("CONDITION_EVAL", other.to_string()),
    }
}

impl Step for FilterRows {
    fn process_row(&mut self, io: &mut StepIo) -> Result<bool, StepError> {
        let Some(row) = io.get_row() else {
            return Ok(false);
        };

        match self.config.condition.evaluate(&row) {
            Ok(true) => match &self.config.send_true_to {
                Some(target) => io.put_row_to(target, row)?,
                None => io.put_row(row)?,
            },
            Ok(false) => {
                if let Some(target) = &self.config.send_false_to {
                    io.put_row_to(target, row)?;
                }
            }
            Err(eval_err) => {
                let err = map_eval_error(eval_err);
                if io.error_handling_enabled() && err.is_row_scoped() {
                    io.put_error(row, &err)?;
                } else {
                    return Err(err);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmill_types::{CompareFunction, Value};

    #[test]
    fn config_parses_condition_and_targets() {
        let json = serde_json::json!({
            "condition": {
                "node": "leaf",
                "left_field": "n",
                "function": "larger",
                "right": { "value": { "name": "c", "type": "integer", "value": 2 } }
            },
            "send_false_to": "rejects"
        });
        let config: FilterRowsConfig = serde_json::from_value(json).unwrap();
        assert_eq!(
            config.condition,
            Condition::leaf("n", CompareFunction::Larger, Value::integer("c", 2))
        );
        assert_eq!(config.send_true_to, None);
        assert_eq!(config.send_false_to.as_deref(), Some("rejects"));
    }

    #[test]
    fn missing_field_maps_to_row_scoped_error() {
        let err = map_eval_error(EvalError::FieldNotFound("x".into()));
        assert!(err.is_row_scoped());
        assert_eq!(err.fields, vec!["x".to_string()]);
    }
}
