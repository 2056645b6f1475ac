//! Shared domain types for the Rowmill transformation engine.
//!
//! - [`value`]: typed scalar fields with total, type-aware comparison.
//! - [`row`]: ordered named records and their pinned layout.
//! - [`condition`]: boolean expression trees evaluated per row.
//! - [`error`]: the structured step error model.

pub mod condition;
pub mod error;
pub mod row;
pub mod value;

pub use condition::{CompareFunction, CompareTarget, Condition, EvalError, Operator};
pub use error::{ErrorCategory, ErrorScope, StepError};
pub use row::{FieldLayout, Row, RowLayout};
pub use value::{Value, ValueData, ValueError, ValueType};
