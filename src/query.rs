use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::BridgeError;
use crate::types::{Row, SqlValue};

/// Extract a `SqlValue` from a `SQLite` row.
///
/// # Errors
///
/// Returns `BridgeError` if the value cannot be read.
pub fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<SqlValue, BridgeError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    })
}

/// Column names of a prepared statement, shared by every row it yields.
#[must_use]
pub fn column_names(stmt: &Statement<'_>) -> Arc<Vec<String>> {
    Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    )
}

/// Read every column of the current row.
///
/// # Errors
///
/// Returns `BridgeError` if any column cannot be read.
pub fn read_row(row: &rusqlite::Row<'_>, columns: &Arc<Vec<String>>) -> Result<Row, BridgeError> {
    let mut values = Vec::with_capacity(columns.len());
    for i in 0..columns.len() {
        values.push(extract_value(row, i)?);
    }
    Ok(Row::new(Arc::clone(columns), values))
}
