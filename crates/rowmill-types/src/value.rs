//! Typed scalar values flowing through the engine.
//!
//! A [`Value`] is a named, immutable, typed scalar with an explicit null
//! flag. Comparison is total and type-aware: the left operand's declared
//! type decides how the right operand is viewed, and null always sorts low.

use std::cmp::Ordering;
use std::fmt;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The seven value types a field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Integer,
    Number,
    BigNumber,
    Boolean,
    Date,
    Binary,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::BigNumber => "big_number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Binary => "binary",
        };
        f.write_str(s)
    }
}

/// Typed payload of a [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ValueData {
    String(String),
    Integer(i64),
    Number(f64),
    BigNumber(BigDecimal),
    Boolean(bool),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
}

impl ValueData {
    fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Integer(_) => ValueType::Integer,
            Self::Number(_) => ValueType::Number,
            Self::BigNumber(_) => ValueType::BigNumber,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Date(_) => ValueType::Date,
            Self::Binary(_) => ValueType::Binary,
        }
    }

    fn default_for(value_type: ValueType) -> Self {
        match value_type {
            ValueType::String => Self::String(String::new()),
            ValueType::Integer => Self::Integer(0),
            ValueType::Number => Self::Number(0.0),
            ValueType::BigNumber => Self::BigNumber(BigDecimal::default()),
            ValueType::Boolean => Self::Boolean(false),
            ValueType::Date => Self::Date(DateTime::<Utc>::UNIX_EPOCH),
            ValueType::Binary => Self::Binary(Vec::new()),
        }
    }
}

/// Errors from value conversion and comparison.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("cannot compare {left} value '{left_name}' with {right} value '{right_name}'")]
    IncompatibleTypes {
        left: ValueType,
        left_name: String,
        right: ValueType,
        right_name: String,
    },
    #[error("cannot convert {from} value '{name}' to {to}: {detail}")]
    Conversion {
        from: ValueType,
        to: ValueType,
        name: String,
        detail: String,
    },
}

/// A named, typed, immutable scalar field.
///
/// The type is fixed at construction; a "changed" value is a new `Value`.
/// Scalar equality ignores the field name (row layout owns naming).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    name: String,
    #[serde(flatten)]
    data: ValueData,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_null: bool,
}

impl Value {
    #[must_use]
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), data: ValueData::String(value.into()), is_null: false }
    }

    #[must_use]
    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self { name: name.into(), data: ValueData::Integer(value), is_null: false }
    }

    #[must_use]
    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self { name: name.into(), data: ValueData::Number(value), is_null: false }
    }

    #[must_use]
    pub fn big_number(name: impl Into<String>, value: BigDecimal) -> Self {
        Self { name: name.into(), data: ValueData::BigNumber(value), is_null: false }
    }

    #[must_use]
    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self { name: name.into(), data: ValueData::Boolean(value), is_null: false }
    }

    #[must_use]
    pub fn date(name: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self { name: name.into(), data: ValueData::Date(value), is_null: false }
    }

    #[must_use]
    pub fn binary(name: impl Into<String>, value: Vec<u8>) -> Self {
        Self { name: name.into(), data: ValueData::Binary(value), is_null: false }
    }

    /// A null value of the given type. The payload is a type-appropriate
    /// placeholder and is never observable through comparisons.
    #[must_use]
    pub fn null_of(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            data: ValueData::default_for(value_type),
            is_null: true,
        }
    }

    #[must_use]
    pub fn from_data(name: impl Into<String>, data: ValueData) -> Self {
        Self { name: name.into(), data, is_null: false }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same payload under a different field name.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), data: self.data.clone(), is_null: self.is_null }
    }

    pub fn value_type(&self) -> ValueType {
        self.data.value_type()
    }

    pub fn data(&self) -> &ValueData {
        &self.data
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// Null for ordering purposes: the null flag, or an empty string
    /// payload. Empty strings and nulls are indistinguishable to compare.
    fn is_effectively_null(&self) -> bool {
        if self.is_null {
            return true;
        }
        matches!(&self.data, ValueData::String(s) if s.is_empty())
    }

    /// String rendering of the payload, regardless of type.
    pub fn as_string(&self) -> String {
        if self.is_null {
            return String::new();
        }
        match &self.data {
            ValueData::String(s) => s.clone(),
            ValueData::Integer(i) => i.to_string(),
            ValueData::Number(n) => n.to_string(),
            ValueData::BigNumber(b) => b.to_string(),
            ValueData::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            ValueData::Date(d) => d.to_rfc3339(),
            ValueData::Binary(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Numeric view of the payload. Dates map to epoch milliseconds,
    /// booleans to 0/1, strings are parsed.
    pub fn as_number(&self) -> Result<f64, ValueError> {
        if self.is_null {
            return Ok(0.0);
        }
        match &self.data {
            ValueData::String(s) => s.trim().parse::<f64>().map_err(|e| ValueError::Conversion {
                from: ValueType::String,
                to: ValueType::Number,
                name: self.name.clone(),
                detail: e.to_string(),
            }),
            ValueData::Integer(i) => Ok(*i as f64),
            ValueData::Number(n) => Ok(*n),
            ValueData::BigNumber(b) => b.to_f64().ok_or_else(|| ValueError::Conversion {
                from: ValueType::BigNumber,
                to: ValueType::Number,
                name: self.name.clone(),
                detail: "out of f64 range".to_string(),
            }),
            ValueData::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            ValueData::Date(d) => Ok(d.timestamp_millis() as f64),
            ValueData::Binary(_) => Err(ValueError::Conversion {
                from: ValueType::Binary,
                to: ValueType::Number,
                name: self.name.clone(),
                detail: "binary has no numeric view".to_string(),
            }),
        }
    }

    /// Integer view of the payload, truncating fractional parts.
    pub fn as_integer(&self) -> Result<i64, ValueError> {
        if self.is_null {
            return Ok(0);
        }
        match &self.data {
            ValueData::Integer(i) => Ok(*i),
            _ => Ok(self.as_number()?.trunc() as i64),
        }
    }

    /// Decimal view of the payload, for big-number comparisons.
    pub fn as_big_number(&self) -> Result<BigDecimal, ValueError> {
        if self.is_null {
            return Ok(BigDecimal::default());
        }
        match &self.data {
            ValueData::BigNumber(b) => Ok(b.clone()),
            ValueData::Integer(i) => Ok(BigDecimal::from(*i)),
            ValueData::String(s) => {
                s.trim().parse::<BigDecimal>().map_err(|e| ValueError::Conversion {
                    from: ValueType::String,
                    to: ValueType::BigNumber,
                    name: self.name.clone(),
                    detail: e.to_string(),
                })
            }
            ValueData::Number(n) => {
                BigDecimal::from_f64(*n).ok_or_else(|| ValueError::Conversion {
                    from: ValueType::Number,
                    to: ValueType::BigNumber,
                    name: self.name.clone(),
                    detail: "not a finite number".to_string(),
                })
            }
            other => Err(ValueError::Conversion {
                from: other.value_type(),
                to: ValueType::BigNumber,
                name: self.name.clone(),
                detail: "no decimal view".to_string(),
            }),
        }
    }

    /// Boolean view of the payload. Strings accept y/yes/true/1.
    pub fn as_boolean(&self) -> bool {
        if self.is_null {
            return false;
        }
        match &self.data {
            ValueData::Boolean(b) => *b,
            ValueData::Integer(i) => *i != 0,
            ValueData::Number(n) => *n != 0.0,
            ValueData::String(s) => {
                matches!(s.trim().to_ascii_lowercase().as_str(), "y" | "yes" | "true" | "1")
            }
            _ => false,
        }
    }

    /// Total, type-aware comparison.
    ///
    /// Null (including an empty string payload) always sorts low; two nulls
    /// are equal. Otherwise the left type dispatches: strings compare
    /// right-trimmed and case-insensitively, integer/number/date through
    /// their numeric view, booleans false < true, big numbers by decimal
    /// comparison, binary by raw bytes.
    pub fn try_compare(&self, other: &Value) -> Result<Ordering, ValueError> {
        let n1 = self.is_effectively_null();
        let n2 = other.is_effectively_null();
        match (n1, n2) {
            (true, true) => return Ok(Ordering::Equal),
            (true, false) => return Ok(Ordering::Less),
            (false, true) => return Ok(Ordering::Greater),
            (false, false) => {}
        }

        match self.value_type() {
            ValueType::String => {
                let one = self.as_string();
                let two = other.as_string();
                let one = one.trim_end();
                let two = two.trim_end();
                Ok(one.to_lowercase().cmp(&two.to_lowercase()))
            }
            ValueType::Integer | ValueType::Number | ValueType::Date => {
                Ok(self.as_number()?.total_cmp(&other.as_number()?))
            }
            ValueType::Boolean => Ok(self.as_boolean().cmp(&other.as_boolean())),
            ValueType::BigNumber => Ok(self.as_big_number()?.cmp(&other.as_big_number()?)),
            ValueType::Binary => match (&self.data, &other.data) {
                (ValueData::Binary(a), ValueData::Binary(b)) => Ok(a.cmp(b)),
                _ => Err(ValueError::IncompatibleTypes {
                    left: self.value_type(),
                    left_name: self.name.clone(),
                    right: other.value_type(),
                    right_name: other.name.clone(),
                }),
            },
        }
    }
}

/// Scalar equality: type, null flag and payload. The field name is
/// deliberately excluded; [`crate::row::Row`] equality compares names.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_null == other.is_null && self.data == other.data
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null {
            write!(f, "<null>")
        } else {
            f.write_str(&self.as_string())
        }
    }
}
