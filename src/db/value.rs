// ABOUTME: Engine-neutral cell value shared by all drivers, encoders and the importer
// ABOUTME: Provides JSON and text renderings used by the export encoders

use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single cell read from or written to the database
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact decimal kept as its database text, e.g. `12345678901234567.89`
    Decimal(String),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) | Value::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Render as JSON with native typing (numbers unquoted, null as null)
    ///
    /// Non-finite floats have no JSON representation and are emitted as strings.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(f.to_string())),
            Value::Decimal(s) => s
                .parse::<serde_json::Number>()
                .map(JsonValue::Number)
                .unwrap_or_else(|_| JsonValue::String(s.clone())),
            Value::Text(s) => JsonValue::String(s.clone()),
            Value::Date(_) | Value::DateTime(_) | Value::Bytes(_) => {
                JsonValue::String(self.to_string())
            }
        }
    }
}

impl fmt::Display for Value {
    /// Text rendering used for CSV fields; null renders as an empty string
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Decimal(s) | Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Bytes(b) => {
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Rows returned by a query, with column names in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// First column of the first row, if any
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_json_native_types() {
        assert_eq!(Value::Int(42).to_json(), json!(42));
        assert_eq!(Value::Float(1.5).to_json(), json!(1.5));
        assert_eq!(Value::Bool(true).to_json(), json!(true));
        assert_eq!(Value::Null.to_json(), JsonValue::Null);
        assert_eq!(Value::Text("a".into()).to_json(), json!("a"));
    }

    #[test]
    fn test_decimal_keeps_every_digit() {
        let value = Value::Decimal("12345678901234567.89".to_string());
        assert_eq!(value.to_string(), "12345678901234567.89");
        assert_eq!(
            serde_json::to_string(&value.to_json()).unwrap(),
            "12345678901234567.89"
        );
        assert_eq!(Value::Decimal("NaN".to_string()).to_json(), json!("NaN"));
    }

    #[test]
    fn test_non_finite_float_becomes_string() {
        assert_eq!(Value::Float(f64::NAN).to_json(), json!("NaN"));
    }

    #[test]
    fn test_display_dates_and_bytes() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-03-09");
        let dt = date.and_hms_opt(7, 5, 1).unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "2024-03-09 07:05:01");
        assert_eq!(Value::Bytes(b"Hello".to_vec()).to_string(), "SGVsbG8=");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_scalar() {
        let result = QueryResult {
            columns: vec!["count".into()],
            rows: vec![vec![Value::Int(7)]],
        };
        assert_eq!(result.scalar().and_then(Value::as_i64), Some(7));
        assert!(QueryResult::default().scalar().is_none());
    }
}
