//! Ordered, named records and their layout.
//!
//! A [`Row`] is an ordered sequence of [`Value`]s. Duplicate field names are
//! permitted, but only the first occurrence is addressable by name. Every
//! row travelling through one queue must share the same [`RowLayout`].

use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueType};

/// One record: an ordered, named sequence of values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    #[must_use]
    pub fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    #[must_use]
    pub fn with(mut self, value: Value) -> Self {
        self.values.push(value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Index of the first field with this name.
    ///
    /// Duplicate names are allowed in a row; later duplicates are only
    /// reachable positionally.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.values.iter().position(|v| v.name() == name)
    }

    /// First field with this name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|v| v.name() == name)
    }

    /// Remove the first field with this name; returns it if present.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.index_of(name)?;
        Some(self.values.remove(idx))
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Value> {
        if index < self.values.len() {
            Some(self.values.remove(index))
        } else {
            None
        }
    }

    /// Append every field of `other` whose name is not already present.
    pub fn merge(&mut self, other: &Row) {
        for value in &other.values {
            if self.index_of(value.name()).is_none() {
                self.values.push(value.clone());
            }
        }
    }

    /// The ordered (name, type) schema of this row.
    #[must_use]
    pub fn layout(&self) -> RowLayout {
        RowLayout {
            fields: self
                .values
                .iter()
                .map(|v| FieldLayout {
                    name: v.name().to_string(),
                    value_type: v.value_type(),
                })
                .collect(),
        }
    }
}

/// Structural equality: elementwise over the full sequence, order-sensitive,
/// names included.
impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.name() == b.name() && a == b)
    }
}

/// One (name, type) slot of a row layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    pub value_type: ValueType,
}

/// The ordered schema shared by every row on one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLayout {
    fields: Vec<FieldLayout>,
}

impl RowLayout {
    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether `row` carries exactly this layout.
    pub fn matches(&self, row: &Row) -> bool {
        row.len() == self.fields.len()
            && row.values().iter().zip(&self.fields).all(|(v, f)| {
                v.name() == f.name && v.value_type() == f.value_type
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        Row::new()
            .with(Value::integer("a", 1))
            .with(Value::string("b", "x"))
    }

    #[test]
    fn lookup_is_first_match() {
        let row = Row::new()
            .with(Value::integer("dup", 1))
            .with(Value::integer("dup", 2));
        assert_eq!(row.index_of("dup"), Some(0));
        assert_eq!(row.field("dup").unwrap(), &Value::integer("dup", 1));
        // The second occurrence stays reachable positionally.
        assert_eq!(row.get(1).unwrap(), &Value::integer("dup", 2));
    }

    #[test]
    fn equality_is_structural_and_order_sensitive() {
        assert_eq!(sample_row(), sample_row());

        let different_payload = Row::new()
            .with(Value::integer("a", 1))
            .with(Value::string("b", "y"));
        assert_ne!(sample_row(), different_payload);

        let different_name = Row::new()
            .with(Value::integer("a", 1))
            .with(Value::string("c", "x"));
        assert_ne!(sample_row(), different_name);

        let reordered = Row::new()
            .with(Value::string("b", "x"))
            .with(Value::integer("a", 1));
        assert_ne!(sample_row(), reordered);
    }

    #[test]
    fn remove_takes_first_occurrence_only() {
        let mut row = Row::new()
            .with(Value::integer("dup", 1))
            .with(Value::integer("dup", 2));
        let removed = row.remove("dup").unwrap();
        assert_eq!(removed, Value::integer("dup", 1));
        assert_eq!(row.len(), 1);
        assert_eq!(row.field("dup").unwrap(), &Value::integer("dup", 2));
    }

    #[test]
    fn merge_skips_existing_names() {
        let mut row = sample_row();
        let other = Row::new()
            .with(Value::integer("a", 99))
            .with(Value::boolean("flag", true));
        row.merge(&other);
        assert_eq!(row.len(), 3);
        assert_eq!(row.field("a").unwrap(), &Value::integer("a", 1));
        assert_eq!(row.field("flag").unwrap(), &Value::boolean("flag", true));
    }

    #[test]
    fn layout_matches_same_shape_rows() {
        let layout = sample_row().layout();
        assert!(layout.matches(&sample_row()));
        assert!(layout.matches(
            &Row::new()
                .with(Value::integer("a", 42))
                .with(Value::string("b", "other"))
        ));
        assert!(!layout.matches(&Row::new().with(Value::integer("a", 1))));
        assert!(!layout.matches(
            &Row::new()
                .with(Value::number("a", 1.0))
                .with(Value::string("b", "x"))
        ));
    }
}
