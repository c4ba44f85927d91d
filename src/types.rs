use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::config::RowShape;

/// Values that can be bound as statement parameters or read back from a row.
///
/// ```rust
/// use sqlite_bridge::prelude::*;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value, stored as 0/1
    Bool(bool),
    /// NULL value
    Null,
    /// Binary data
    Blob(Vec<u8>),
}

impl SqlValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let SqlValue::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let SqlValue::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Marshal into the bridge's JSON value representation.
    ///
    /// Non-finite floats have no JSON form and become `null`; blobs become
    /// arrays of byte values.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Int(i) => JsonValue::from(*i),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            SqlValue::Text(s) => JsonValue::String(s.clone()),
            SqlValue::Bool(b) => JsonValue::Bool(*b),
            SqlValue::Null => JsonValue::Null,
            SqlValue::Blob(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Blob(value)
    }
}

/// One result row, with column names shared across every row of a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub column_names: Arc<Vec<String>>,
    pub values: Vec<SqlValue>,
}

impl Row {
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<SqlValue>) -> Self {
        Self {
            column_names,
            values,
        }
    }

    /// Get a value by column name. The first matching column wins.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        let index = self.column_names.iter().position(|c| c == column_name)?;
        self.values.get(index)
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    /// Marshal for delivery across the bridge.
    ///
    /// With [`RowShape::Object`] duplicate column names collapse to the last
    /// value.
    #[must_use]
    pub fn to_json(&self, shape: RowShape) -> JsonValue {
        match shape {
            RowShape::Array => JsonValue::Array(self.values.iter().map(SqlValue::to_json).collect()),
            RowShape::Object => {
                let mut map = JsonMap::with_capacity(self.values.len());
                for (name, value) in self.column_names.iter().zip(&self.values) {
                    map.insert(name.clone(), value.to_json());
                }
                JsonValue::Object(map)
            }
        }
    }
}

/// Result of advancing a prepared statement by one row.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Row(Row),
    Done,
}

impl StepOutcome {
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done)
    }

    #[must_use]
    pub fn into_row(self) -> Option<Row> {
        match self {
            StepOutcome::Row(row) => Some(row),
            StepOutcome::Done => None,
        }
    }

    /// `null` signals completion on the bridge.
    #[must_use]
    pub fn to_json(&self, shape: RowShape) -> JsonValue {
        match self {
            StepOutcome::Row(row) => row.to_json(shape),
            StepOutcome::Done => JsonValue::Null,
        }
    }
}

/// Summary handed to the `exec` callback once the statement has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutcome {
    /// Rows produced by the statement (and emitted as row events, if requested)
    pub rows: u64,
    /// Rows inserted, updated or deleted; zero for read-only statements
    pub changes: u64,
    pub last_insert_id: i64,
}

impl ExecOutcome {
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "rows": self.rows,
            "changes": self.changes,
            "lastInsertId": self.last_insert_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        Row::new(
            Arc::new(vec!["id".into(), "name".into(), "data".into()]),
            vec![
                SqlValue::Int(7),
                SqlValue::Text("seven".into()),
                SqlValue::Blob(vec![0, 255]),
            ],
        )
    }

    #[test]
    fn object_shape_keys_by_column() {
        let json = sample_row().to_json(RowShape::Object);
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "name": "seven", "data": [0, 255]})
        );
    }

    #[test]
    fn array_shape_keeps_column_order() {
        let json = sample_row().to_json(RowShape::Array);
        assert_eq!(json, serde_json::json!([7, "seven", [0, 255]]));
    }

    #[test]
    fn lookup_by_name_and_index() {
        let row = sample_row();
        assert_eq!(row.get("name").and_then(SqlValue::as_text), Some("seven"));
        assert_eq!(row.get_by_index(0).and_then(SqlValue::as_int), Some(&7));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn non_finite_float_marshals_as_null() {
        assert_eq!(SqlValue::Float(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(SqlValue::Float(1.5).to_json(), serde_json::json!(1.5));
    }

    #[test]
    fn exec_outcome_uses_camel_case() {
        let outcome = ExecOutcome {
            rows: 0,
            changes: 1,
            last_insert_id: 3,
        };
        let expected = serde_json::json!({"rows": 0, "changes": 1, "lastInsertId": 3});
        assert_eq!(serde_json::to_value(outcome).unwrap(), expected);
        assert_eq!(outcome.to_json(), expected);
    }
}
