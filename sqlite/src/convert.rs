//! Conversion between JSON row values and SQLite values.
//!
//! Rows travel through the API as JSON objects. Scalars map directly onto
//! SQLite storage classes; arrays and objects are rejected rather than
//! silently stringified.

use dynatable_core::Row;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

use crate::error::{Result, SqliteError};

/// Converts one JSON value into a bindable SQLite value.
///
/// Booleans become `0`/`1`, integers that fit in `i64` stay integers, and
/// every other number becomes a `REAL`.
pub(crate) fn json_to_sql(column: &str, value: &Value) -> Result<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real).ok_or_else(|| {
                SqliteError::ValidationError(format!("column {column}: unsupported number {n}"))
            }),
        },
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(SqliteError::ValidationError(format!(
            "column {column}: only scalar values are supported"
        ))),
    }
}

/// Converts one SQLite value into JSON.
///
/// Non-finite reals become `null`; blobs become lowercase hex strings.
pub(crate) fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(bytes.iter().map(|b| format!("{b:02x}")).collect())
        }
    }
}

/// Reads every column of a result row into a [`Row`].
pub(crate) fn read_row(row: &rusqlite::Row<'_>, names: &[String]) -> rusqlite::Result<Row> {
    let mut out = Row::new();
    for (idx, name) in names.iter().enumerate() {
        out.insert(name.clone(), sql_to_json(row.get_ref(idx)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_to_sql_scalars() {
        assert_eq!(json_to_sql("a", &json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(json_to_sql("a", &json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(json_to_sql("a", &json!(7)).unwrap(), SqlValue::Integer(7));
        assert_eq!(json_to_sql("a", &json!(2.5)).unwrap(), SqlValue::Real(2.5));
        assert_eq!(
            json_to_sql("a", &json!("x")).unwrap(),
            SqlValue::Text("x".to_string())
        );
    }

    #[test]
    fn test_json_to_sql_large_unsigned_becomes_real() {
        let value = json!(u64::MAX);
        assert!(matches!(json_to_sql("a", &value).unwrap(), SqlValue::Real(_)));
    }

    #[test]
    fn test_json_to_sql_rejects_nested() {
        let err = json_to_sql("tags", &json!(["a"])).unwrap_err();
        assert!(err.to_string().contains("tags"));
        assert!(json_to_sql("meta", &json!({"k": 1})).is_err());
    }

    #[test]
    fn test_sql_to_json() {
        assert_eq!(sql_to_json(ValueRef::Integer(3)), json!(3));
        assert_eq!(sql_to_json(ValueRef::Real(f64::NAN)), Value::Null);
        assert_eq!(sql_to_json(ValueRef::Text(b"hi")), json!("hi"));
        assert_eq!(sql_to_json(ValueRef::Blob(&[0xde, 0xad])), json!("dead"));
    }
}
