// ABOUTME: SQLite <-> Value conversion for query parameters and result rows
// ABOUTME: Uses declared column types to recover booleans and dates stored as INTEGER/TEXT

use crate::catalog::types::base_type;
use crate::db::value::{DATETIME_FORMAT, DATE_FORMAT};
use crate::db::Value;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{Value as SqliteValue, ValueRef};

/// Convert a bound parameter into SQLite's storage classes
///
/// SQLite has no native boolean or date types: booleans are stored as 0/1
/// and dates as ISO-8601 text.
pub fn to_sqlite_value(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::Decimal(s) | Value::Text(s) => SqliteValue::Text(s.clone()),
        Value::Date(d) => SqliteValue::Text(d.format(DATE_FORMAT).to_string()),
        Value::DateTime(dt) => SqliteValue::Text(dt.format(DATETIME_FORMAT).to_string()),
        Value::Bytes(b) => SqliteValue::Blob(b.clone()),
    }
}

/// Convert a result cell, using the column's declared type when it has one
pub fn from_sqlite_value(raw: ValueRef<'_>, decl_type: Option<&str>) -> Value {
    let declared = decl_type.map(base_type).unwrap_or_default();

    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => match declared.as_str() {
            "boolean" | "bool" => Value::Bool(i != 0),
            _ => Value::Int(i),
        },
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match declared.as_str() {
                "date" => NaiveDate::parse_from_str(&text, DATE_FORMAT)
                    .map(Value::Date)
                    .unwrap_or(Value::Text(text)),
                "datetime" | "timestamp" => parse_stored_datetime(&text)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Text(text)),
                _ => Value::Text(text),
            }
        }
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

fn parse_stored_datetime(text: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}
