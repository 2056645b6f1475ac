//! Structured error model for step execution.
//!
//! [`StepError`] carries classification and blast radius. Construct via
//! category-specific factory methods. Row-scoped errors are eligible for
//! error-output routing; everything else escalates to pipeline
//! cancellation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Broad classification of a step error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid step configuration; the step never reaches RUNNING.
    Config,
    /// Invalid or unprocessable record data.
    Data,
    /// A referenced field was not present in the incoming row.
    MissingField,
    /// A resource the step depends on failed mid-run.
    Resource,
    /// Queue contract violation (put after done, layout mismatch).
    Queue,
    /// Internal step error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Data => "data",
            Self::MissingField => "missing_field",
            Self::Resource => "resource",
            Self::Queue => "queue",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Blast radius of a step error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// Affects a single row; recoverable via an error output.
    Row,
    /// Affects the whole step; the run fails.
    Step,
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Row => "row",
            Self::Step => "step",
        })
    }
}

/// Structured error from a step operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct StepError {
    pub category: ErrorCategory,
    pub scope: ErrorScope,
    pub code: String,
    pub message: String,
    /// Field names involved, for error-row annotation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl StepError {
    fn new(
        category: ErrorCategory,
        scope: ErrorScope,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            scope,
            code: code.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Configuration error (step scope; aborts startup).
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, ErrorScope::Step, code, message)
    }

    /// Invalid record data (row scope; divertible).
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, ErrorScope::Row, code, message)
    }

    /// Missing field in the incoming row (row scope; divertible).
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        let field = field.into();
        let mut err = Self::new(
            ErrorCategory::MissingField,
            ErrorScope::Row,
            "FIELD_NOT_FOUND",
            format!("field '{field}' not found in row"),
        );
        err.fields.push(field);
        err
    }

    /// Resource failure (step scope).
    #[must_use]
    pub fn resource(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Resource, ErrorScope::Step, code, message)
    }

    /// Queue contract violation (step scope).
    #[must_use]
    pub fn queue(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Queue, ErrorScope::Step, code, message)
    }

    /// Internal step error (step scope).
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, ErrorScope::Step, code, message)
    }

    /// Attach the field names involved.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    /// Override the default scope.
    #[must_use]
    pub fn with_scope(mut self, scope: ErrorScope) -> Self {
        self.scope = scope;
        self
    }

    /// Row-scoped errors may be routed to an error output instead of
    /// failing the run.
    pub fn is_row_scoped(&self) -> bool {
        self.scope == ErrorScope::Row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_step_scoped() {
        let err = StepError::config("MISSING_LIMIT", "row limit is required");
        assert_eq!(err.category, ErrorCategory::Config);
        assert_eq!(err.scope, ErrorScope::Step);
        assert!(!err.is_row_scoped());
    }

    #[test]
    fn data_errors_are_row_scoped() {
        let err = StepError::data("BAD_AMOUNT", "amount is not numeric");
        assert!(err.is_row_scoped());
    }

    #[test]
    fn missing_field_records_the_field_name() {
        let err = StepError::missing_field("amount");
        assert_eq!(err.fields, vec!["amount".to_string()]);
        assert!(err.is_row_scoped());
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn scope_override() {
        let err = StepError::data("X", "y").with_scope(ErrorScope::Step);
        assert!(!err.is_row_scoped());
    }

    #[test]
    fn display_format() {
        let err = StepError::config("BAD_CAPACITY", "capacity must be positive");
        assert_eq!(
            err.to_string(),
            "[config] BAD_CAPACITY: capacity must be positive"
        );
    }

    #[test]
    fn serde_roundtrip() {
        let err = StepError::missing_field("x");
        let json = serde_json::to_string(&err).unwrap();
        let back: StepError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
