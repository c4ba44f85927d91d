use rusqlite::Statement;
use rusqlite::types::Value;
use serde_json::Value as JsonValue;

use crate::error::BridgeError;
use crate::types::SqlValue;

/// Convert a single `SqlValue` to a rusqlite `Value`.
#[must_use]
pub fn sql_value_to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Null => Value::Null,
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Convert one positional bridge argument into a bindable value.
///
/// # Errors
///
/// Returns `BridgeError::InvalidArgument` for arrays and objects, which have
/// no SQLite storage class.
pub fn json_to_sql_value(position: usize, value: &JsonValue) -> Result<SqlValue, BridgeError> {
    match value {
        JsonValue::Null => Ok(SqlValue::Null),
        JsonValue::Bool(b) => Ok(SqlValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(SqlValue::Float(f))
            } else {
                Err(BridgeError::InvalidArgument(format!(
                    "parameter {position} is not a representable number: {n}"
                )))
            }
        }
        JsonValue::String(s) => Ok(SqlValue::Text(s.clone())),
        JsonValue::Array(_) | JsonValue::Object(_) => Err(BridgeError::InvalidArgument(format!(
            "parameter {position} must be null, a boolean, a number or a string"
        ))),
    }
}

/// Unified `SQLite` parameter container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(pub Vec<Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[SqlValue]) -> Self {
        Params(params.iter().map(sql_value_to_sqlite_value).collect())
    }

    /// Convert a bridge argument array.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidArgument` if any element is not a scalar.
    pub fn from_json(params: &[JsonValue]) -> Result<Self, BridgeError> {
        let mut values = Vec::with_capacity(params.len());
        for (position, param) in params.iter().enumerate() {
            values.push(sql_value_to_sqlite_value(&json_to_sql_value(position, param)?));
        }
        Ok(Params(values))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_values(&self) -> &[Value] {
        &self.0
    }
}

/// Bind positional parameters to a freshly prepared statement.
///
/// # Errors
///
/// Returns `BridgeError::InvalidArgument` when the count does not match the
/// statement's placeholders, or the engine error if binding fails.
pub fn bind_params(stmt: &mut Statement<'_>, params: &Params) -> Result<(), BridgeError> {
    let expected = stmt.parameter_count();
    if expected != params.len() {
        return Err(BridgeError::InvalidArgument(format!(
            "statement expects {expected} parameter(s), got {}",
            params.len()
        )));
    }
    for (index, value) in params.as_values().iter().enumerate() {
        stmt.raw_bind_parameter(index + 1, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_map_to_storage_classes() {
        let params = Params::from_json(&[json!(null), json!(true), json!(42), json!(1.5), json!("x")])
            .unwrap();
        assert_eq!(
            params.0,
            vec![
                Value::Null,
                Value::Integer(1),
                Value::Integer(42),
                Value::Real(1.5),
                Value::Text("x".into()),
            ]
        );
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = Params::from_json(&[json!(1), json!({"a": 1})]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(ref m) if m.contains("parameter 1")));
        assert!(Params::from_json(&[json!([1, 2])]).is_err());
    }

    #[test]
    fn bind_checks_placeholder_count() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ?1 + ?2").unwrap();
        let err = bind_params(&mut stmt, &Params::convert(&[SqlValue::Int(1)])).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
        bind_params(&mut stmt, &Params::convert(&[SqlValue::Int(1), SqlValue::Int(2)])).unwrap();
    }
}
