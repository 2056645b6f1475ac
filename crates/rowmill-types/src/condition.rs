//! Boolean condition trees evaluated per row.
//!
//! A [`Condition`] is either a leaf (one comparison against a constant or
//! another field) or a composite (an operator combined over an ordered
//! child list). Evaluation never short-circuits: every child is evaluated
//! unconditionally, and a missing field is an explicit [`EvalError`], not a
//! panic.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::row::Row;
use crate::value::{Value, ValueError};

/// Per-leaf comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareFunction {
    Equal,
    NotEqual,
    Smaller,
    SmallerEqual,
    Larger,
    LargerEqual,
    Regexp,
    IsNull,
    IsNotNull,
    InList,
    Contains,
    StartsWith,
    EndsWith,
    True,
}

impl CompareFunction {
    /// Whether this function reads a right-hand operand.
    pub fn needs_right(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull | Self::True)
    }
}

/// Boolean combinator of a composite node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// No combination; valid only for a single-child group.
    #[default]
    None,
    And,
    Or,
    Xor,
    /// Negates a single child.
    Not,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Not => "not",
        })
    }
}

/// Right-hand side of a leaf comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareTarget {
    /// A constant value.
    Value(Value),
    /// Another field of the same row.
    Field(String),
}

/// Errors from condition evaluation against one row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("field '{0}' not found in row")]
    FieldNotFound(String),
    #[error("comparison function {0:?} requires a right-hand operand")]
    MissingRightOperand(CompareFunction),
    #[error("operator 'none' cannot combine {0} children")]
    MissingOperator(usize),
    #[error("operator 'not' takes exactly one child, got {0}")]
    NotArity(usize),
    #[error("invalid regular expression '{pattern}': {detail}")]
    BadPattern { pattern: String, detail: String },
    #[error(transparent)]
    Value(#[from] ValueError),
}

/// A boolean expression tree node.
///
/// `negated` is an independent flag on either node kind, applied to the
/// node's truth value last. It composes with the `Not` combinator, so
/// double negation is observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Condition {
    Leaf {
        left_field: String,
        function: CompareFunction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<CompareTarget>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        negated: bool,
    },
    Composite {
        #[serde(default)]
        operator: Operator,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        negated: bool,
        children: Vec<Condition>,
    },
}

impl Condition {
    /// Leaf comparing a field against a constant.
    #[must_use]
    pub fn leaf(left_field: impl Into<String>, function: CompareFunction, right: Value) -> Self {
        Self::Leaf {
            left_field: left_field.into(),
            function,
            right: Some(CompareTarget::Value(right)),
            negated: false,
        }
    }

    /// Leaf comparing two fields of the same row.
    #[must_use]
    pub fn field_leaf(
        left_field: impl Into<String>,
        function: CompareFunction,
        right_field: impl Into<String>,
    ) -> Self {
        Self::Leaf {
            left_field: left_field.into(),
            function,
            right: Some(CompareTarget::Field(right_field.into())),
            negated: false,
        }
    }

    /// Leaf with no right-hand operand (`IsNull`, `IsNotNull`, `True`).
    #[must_use]
    pub fn unary_leaf(left_field: impl Into<String>, function: CompareFunction) -> Self {
        Self::Leaf {
            left_field: left_field.into(),
            function,
            right: None,
            negated: false,
        }
    }

    /// Composite over an ordered child list.
    #[must_use]
    pub fn composite(operator: Operator, children: Vec<Condition>) -> Self {
        Self::Composite {
            operator,
            negated: false,
            children,
        }
    }

    /// `Not` combinator over a single child.
    #[must_use]
    pub fn not(child: Condition) -> Self {
        Self::Composite {
            operator: Operator::Not,
            negated: false,
            children: vec![child],
        }
    }

    /// The same node with its `negated` flag flipped.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Leaf { left_field, function, right, negated } => Self::Leaf {
                left_field,
                function,
                right,
                negated: !negated,
            },
            Self::Composite { operator, negated, children } => Self::Composite {
                operator,
                negated: !negated,
                children,
            },
        }
    }

    /// Evaluate this tree against one row.
    ///
    /// All children of a composite are evaluated unconditionally; the
    /// combination is a running accumulator `((c0 OP c1) OP c2) ...` with
    /// the node's operator.
    pub fn evaluate(&self, row: &Row) -> Result<bool, EvalError> {
        match self {
            Self::Leaf { left_field, function, right, negated } => {
                let result = evaluate_leaf(row, left_field, *function, right.as_ref())?;
                Ok(result != *negated)
            }
            Self::Composite { operator, negated, children } => {
                let result = evaluate_composite(row, *operator, children)?;
                Ok(result != *negated)
            }
        }
    }
}

fn evaluate_composite(
    row: &Row,
    operator: Operator,
    children: &[Condition],
) -> Result<bool, EvalError> {
    if operator == Operator::Not {
        if children.len() != 1 {
            return Err(EvalError::NotArity(children.len()));
        }
        return Ok(!children[0].evaluate(row)?);
    }

    // Evaluate everything first: no short-circuiting, by contract.
    let mut results = Vec::with_capacity(children.len());
    for child in children {
        results.push(child.evaluate(row)?);
    }

    let mut iter = results.into_iter();
    let Some(first) = iter.next() else {
        return Err(EvalError::MissingOperator(0));
    };
    let mut acc = first;
    for next in iter {
        acc = match operator {
            Operator::And => acc && next,
            Operator::Or => acc || next,
            Operator::Xor => acc ^ next,
            Operator::None => return Err(EvalError::MissingOperator(children.len())),
            Operator::Not => unreachable!("handled above"),
        };
    }
    Ok(acc)
}

fn evaluate_leaf(
    row: &Row,
    left_field: &str,
    function: CompareFunction,
    right: Option<&CompareTarget>,
) -> Result<bool, EvalError> {
    let left = row
        .field(left_field)
        .ok_or_else(|| EvalError::FieldNotFound(left_field.to_string()))?;

    match function {
        CompareFunction::True => return Ok(true),
        CompareFunction::IsNull => return Ok(left.is_null()),
        CompareFunction::IsNotNull => return Ok(!left.is_null()),
        _ => {}
    }

    let right = match right {
        Some(CompareTarget::Value(v)) => v.clone(),
        Some(CompareTarget::Field(name)) => row
            .field(name)
            .ok_or_else(|| EvalError::FieldNotFound(name.to_string()))?
            .clone(),
        None => return Err(EvalError::MissingRightOperand(function)),
    };

    match function {
        CompareFunction::Equal => Ok(left.try_compare(&right)? == Ordering::Equal),
        CompareFunction::NotEqual => Ok(left.try_compare(&right)? != Ordering::Equal),
        CompareFunction::Smaller => Ok(left.try_compare(&right)? == Ordering::Less),
        CompareFunction::SmallerEqual => Ok(left.try_compare(&right)? != Ordering::Greater),
        CompareFunction::Larger => Ok(left.try_compare(&right)? == Ordering::Greater),
        CompareFunction::LargerEqual => Ok(left.try_compare(&right)? != Ordering::Less),
        CompareFunction::Regexp => {
            let pattern = right.as_string();
            let re = regex::Regex::new(&pattern).map_err(|e| EvalError::BadPattern {
                pattern,
                detail: e.to_string(),
            })?;
            Ok(re.is_match(&left.as_string()))
        }
        CompareFunction::Contains => Ok(left.as_string().contains(&right.as_string())),
        CompareFunction::StartsWith => Ok(left.as_string().starts_with(&right.as_string())),
        CompareFunction::EndsWith => Ok(left.as_string().ends_with(&right.as_string())),
        CompareFunction::InList => {
            let needle = left.as_string();
            let needle = needle.trim();
            Ok(right
                .as_string()
                .split(';')
                .any(|item| item.trim().eq_ignore_ascii_case(needle)))
        }
        CompareFunction::True | CompareFunction::IsNull | CompareFunction::IsNotNull => {
            unreachable!("handled above")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;

    fn row() -> Row {
        Row::new()
            .with(Value::integer("field", 5))
            .with(Value::string("name", "alice"))
            .with(Value::integer("other", 5))
            .with(Value::null_of("gap", ValueType::String))
    }

    #[test]
    fn single_leaf_equal() {
        let cond = Condition::leaf("field", CompareFunction::Equal, Value::integer("c", 5));
        assert!(cond.evaluate(&row()).unwrap());
    }

    #[test]
    fn negated_leaf_flips_result() {
        let cond = Condition::leaf("field", CompareFunction::Equal, Value::integer("c", 5));
        assert!(!cond.negate().evaluate(&row()).unwrap());
    }

    #[test]
    fn double_negation_returns_to_true() {
        // A negated leaf wrapped in a NOT composite: both negations apply.
        let leaf =
            Condition::leaf("field", CompareFunction::Equal, Value::integer("c", 5)).negate();
        let cond = Condition::not(leaf);
        assert!(cond.evaluate(&row()).unwrap());
    }

    #[test]
    fn composite_negated_flag_applies_after_combination() {
        let cond = Condition::composite(
            Operator::And,
            vec![
                Condition::leaf("field", CompareFunction::Equal, Value::integer("c", 5)),
                Condition::unary_leaf("name", CompareFunction::IsNotNull),
            ],
        )
        .negate();
        assert!(!cond.evaluate(&row()).unwrap());
    }

    #[test]
    fn xor_accumulates_left_to_right() {
        // (true XOR true) XOR false == false
        let t = || Condition::unary_leaf("field", CompareFunction::True);
        let f = || Condition::leaf("field", CompareFunction::Equal, Value::integer("c", 6));
        let cond = Condition::composite(Operator::Xor, vec![t(), t(), f()]);
        assert!(!cond.evaluate(&row()).unwrap());
    }

    #[test]
    fn field_to_field_comparison() {
        let cond = Condition::field_leaf("field", CompareFunction::Equal, "other");
        assert!(cond.evaluate(&row()).unwrap());
    }

    #[test]
    fn missing_field_is_an_error_not_a_panic() {
        let cond = Condition::leaf("absent", CompareFunction::Equal, Value::integer("c", 5));
        assert_eq!(
            cond.evaluate(&row()),
            Err(EvalError::FieldNotFound("absent".to_string()))
        );
    }

    #[test]
    fn missing_right_field_is_reported_by_name() {
        let cond = Condition::field_leaf("field", CompareFunction::Equal, "absent");
        assert_eq!(
            cond.evaluate(&row()),
            Err(EvalError::FieldNotFound("absent".to_string()))
        );
    }

    #[test]
    fn no_short_circuit_all_children_evaluated() {
        // First child is already false, but the second child's missing
        // field must still surface: nothing short-circuits.
        let cond = Condition::composite(
            Operator::And,
            vec![
                Condition::leaf("field", CompareFunction::Equal, Value::integer("c", 6)),
                Condition::leaf("absent", CompareFunction::Equal, Value::integer("c", 1)),
            ],
        );
        assert_eq!(
            cond.evaluate(&row()),
            Err(EvalError::FieldNotFound("absent".to_string()))
        );
    }

    #[test]
    fn none_operator_with_single_child_passes_through() {
        let cond = Condition::composite(
            Operator::None,
            vec![Condition::unary_leaf("field", CompareFunction::True)],
        );
        assert!(cond.evaluate(&row()).unwrap());
    }

    #[test]
    fn none_operator_cannot_combine_multiple_children() {
        let cond = Condition::composite(
            Operator::None,
            vec![
                Condition::unary_leaf("field", CompareFunction::True),
                Condition::unary_leaf("field", CompareFunction::True),
            ],
        );
        assert!(matches!(
            cond.evaluate(&row()),
            Err(EvalError::MissingOperator(2))
        ));
    }

    #[test]
    fn not_composite_requires_one_child() {
        let cond = Condition::composite(Operator::Not, vec![]);
        assert!(matches!(cond.evaluate(&row()), Err(EvalError::NotArity(0))));
    }

    #[test]
    fn null_checks_use_the_null_flag() {
        assert!(Condition::unary_leaf("gap", CompareFunction::IsNull)
            .evaluate(&row())
            .unwrap());
        assert!(Condition::unary_leaf("name", CompareFunction::IsNotNull)
            .evaluate(&row())
            .unwrap());
    }

    #[test]
    fn regexp_and_string_functions() {
        let r = row();
        assert!(Condition::leaf(
            "name",
            CompareFunction::Regexp,
            Value::string("p", "^al.*e$")
        )
        .evaluate(&r)
        .unwrap());
        assert!(Condition::leaf(
            "name",
            CompareFunction::Contains,
            Value::string("p", "lic")
        )
        .evaluate(&r)
        .unwrap());
        assert!(Condition::leaf(
            "name",
            CompareFunction::StartsWith,
            Value::string("p", "al")
        )
        .evaluate(&r)
        .unwrap());
        assert!(Condition::leaf(
            "name",
            CompareFunction::EndsWith,
            Value::string("p", "ce")
        )
        .evaluate(&r)
        .unwrap());
    }

    #[test]
    fn bad_regexp_is_an_error() {
        let cond = Condition::leaf("name", CompareFunction::Regexp, Value::string("p", "("));
        assert!(matches!(
            cond.evaluate(&row()),
            Err(EvalError::BadPattern { .. })
        ));
    }

    #[test]
    fn in_list_splits_on_semicolons() {
        let cond = Condition::leaf(
            "name",
            CompareFunction::InList,
            Value::string("p", "bob; ALICE ;carol"),
        );
        assert!(cond.evaluate(&row()).unwrap());
    }

    #[test]
    fn serde_roundtrip() {
        let cond = Condition::composite(
            Operator::Or,
            vec![
                Condition::leaf("field", CompareFunction::Larger, Value::integer("c", 3)),
                Condition::unary_leaf("gap", CompareFunction::IsNull).negate(),
            ],
        );
        let yaml_equivalent = serde_json::to_string(&cond).unwrap();
        let back: Condition = serde_json::from_str(&yaml_equivalent).unwrap();
        assert_eq!(cond, back);
    }
}
