//! Projection step: select, reorder and rename fields.

use serde::Deserialize;

use rowmill_types::{Row, StepError};

use crate::step::{Step, StepIo};

#[derive(Debug, Clone, Deserialize)]
pub struct SelectField {
    /// Field to take from the incoming row (first match by name).
    pub name: String,
    /// Output name; keeps the original when unset.
    #[serde(default)]
    pub rename: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectValuesConfig {
    pub fields: Vec<SelectField>,
}

/// Rebuilds every row from the configured field list, in list order.
/// A missing field is a row-scoped error, divertible to an error output.
pub struct SelectValues {
    config: SelectValuesConfig,
}

impl SelectValues {
    #[must_use]
    pub fn new(config: SelectValuesConfig) -> Self {
        Self { config }
    }

    pub fn from_json(config: &serde_json::Value) -> Result<Box<dyn Step>, StepError> {
        let config: SelectValuesConfig = serde_json::from_value(config.clone())
            .map_err(|e| StepError::config("BAD_SELECT_CONFIG", e.to_string()))?;
        Ok(Box::new(Self::new(config)))
    }

    fn project(&self, row: &Row) -> Result<Row, StepError> {
        let mut out = Row::new();
        for spec in &self.config.fields {
            let value = row
                .field(&spec.name)
                .ok_or_else(|| StepError::missing_field(spec.name.clone()))?;
            match &spec.rename {
                Some(new_name) => out.push(value.renamed(new_name.clone())),
                None => out.push(value.clone()),
            }
        }
        Ok(out)
    }
}

impl Step for SelectValues {
    fn init(&mut self) -> Result<(), StepError> {
        if self.config.fields.is_empty() {
            return Err(StepError::config(
                "NO_FIELDS",
                "select-values needs at least one field",
            ));
        }
        Ok(())
    }

    fn process_row(&mut self, io: &mut StepIo) -> Result<bool, StepError> {
        let Some(row) = io.get_row() else {
            return Ok(false);
        };
        match self.project(&row) {
            Ok(projected) => io.put_row(projected)?,
            Err(err) if err.is_row_scoped() && io.error_handling_enabled() => {
                io.put_error(row, &err)?;
            }
            Err(err) => return Err(err),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmill_types::Value;

    fn step() -> SelectValues {
        SelectValues::new(SelectValuesConfig {
            fields: vec![
                SelectField { name: "b".into(), rename: Some("renamed".into()) },
                SelectField { name: "a".into(), rename: None },
            ],
        })
    }

    #[test]
    fn projects_in_configured_order_with_renames() {
        let row = Row::new()
            .with(Value::integer("a", 1))
            .with(Value::string("b", "x"));
        let out = step().project(&row).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0).unwrap().name(), "renamed");
        assert_eq!(out.get(1).unwrap(), &Value::integer("a", 1));
    }

    #[test]
    fn missing_field_is_row_scoped() {
        let row = Row::new().with(Value::integer("a", 1));
        let err = step().project(&row).unwrap_err();
        assert!(err.is_row_scoped());
    }

    #[test]
    fn duplicate_names_project_the_first_occurrence() {
        let row = Row::new()
            .with(Value::string("b", "first"))
            .with(Value::string("b", "second"))
            .with(Value::integer("a", 1));
        let out = step().project(&row).unwrap();
        assert_eq!(out.get(0).unwrap(), &Value::string("renamed", "first"));
    }
}
