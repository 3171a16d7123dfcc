// ABOUTME: Validates and casts imported field values to a column's declared type
// ABOUTME: Shared by every import decoder; failures are reported per field

use crate::catalog::types::base_type;
use crate::catalog::ColumnInfo;
use crate::db::Value;
use crate::error::CoercionError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%d %B %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%d %b %Y",
    "%d %B %Y",
];

/// How a column's values are validated on import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    Integer,
    Float,
    Date,
    DateTime,
    Boolean,
    Text,
}

impl CoercionKind {
    pub fn for_native(native_type: &str) -> Self {
        // MySQL boolean columns; wider tinyints hold small integers
        if native_type.trim().to_ascii_lowercase().starts_with("tinyint(1)") {
            return CoercionKind::Boolean;
        }

        match base_type(native_type).as_str() {
            "int" | "integer" | "smallint" | "bigint" | "mediumint" | "tinyint" | "int2"
            | "int4" | "int8" | "serial" | "bigserial" | "smallserial" => CoercionKind::Integer,
            "decimal" | "numeric" | "float" | "double" | "double precision" | "real"
            | "float4" | "float8" | "money" | "smallmoney" => CoercionKind::Float,
            "date" => CoercionKind::Date,
            "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" | "timestamp"
            | "timestamptz" | "timestamp without time zone" | "timestamp with time zone" => {
                CoercionKind::DateTime
            }
            "boolean" | "bool" | "bit" => CoercionKind::Boolean,
            _ => CoercionKind::Text,
        }
    }
}

/// Cast a raw imported value for `column`
///
/// # Examples
///
/// ```
/// # use data_explorer::catalog::ColumnInfo;
/// # use data_explorer::coercion::coerce;
/// # use data_explorer::db::Value;
/// let active = ColumnInfo { name: "active".into(), native_type: "boolean".into(), nullable: false };
/// assert_eq!(coerce(&serde_json::json!("on"), &active).unwrap(), Value::Bool(true));
/// ```
pub fn coerce(raw: &JsonValue, column: &ColumnInfo) -> Result<Value, CoercionError> {
    let text = match raw {
        JsonValue::Null => None,
        JsonValue::String(s) if s.is_empty() => None,
        _ => Some(raw_text(raw)),
    };

    let Some(text) = text else {
        return if column.nullable {
            Ok(Value::Null)
        } else {
            Err(CoercionError::new("Value cannot be null"))
        };
    };

    match CoercionKind::for_native(&column.native_type) {
        CoercionKind::Integer => {
            if matches!(raw, JsonValue::Bool(_)) || !is_numeric(&text) {
                return Err(CoercionError::new("Value must be numeric"));
            }
            truncate_to_int(&text)
                .map(Value::Int)
                .ok_or_else(|| CoercionError::new("Value must be numeric"))
        }
        CoercionKind::Float => {
            if matches!(raw, JsonValue::Bool(_)) || !is_numeric(&text) {
                return Err(CoercionError::new("Value must be numeric"));
            }
            text.trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| CoercionError::new("Value must be numeric"))
        }
        CoercionKind::Date => parse_datetime(&text)
            .map(|dt| Value::Date(dt.date()))
            .ok_or_else(|| CoercionError::new("Invalid date format")),
        CoercionKind::DateTime => parse_datetime(&text)
            .map(Value::DateTime)
            .ok_or_else(|| CoercionError::new("Invalid datetime format")),
        CoercionKind::Boolean => {
            if let JsonValue::Bool(b) = raw {
                return Ok(Value::Bool(*b));
            }
            match text.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
                "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(CoercionError::new("Invalid boolean value")),
            }
        }
        CoercionKind::Text => Ok(Value::Text(text)),
    }
}

fn raw_text(raw: &JsonValue) -> String {
    match raw {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Decimal number with optional sign, fraction and exponent
///
/// Surrounding whitespace is allowed; hex, `inf` and `nan` are not numeric.
pub fn is_numeric(value: &str) -> bool {
    let s = value.trim().as_bytes();
    let mut i = 0;

    if i < s.len() && (s[i] == b'+' || s[i] == b'-') {
        i += 1;
    }

    let int_start = i;
    while i < s.len() && s[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < s.len() && s[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac_start;
    }

    if digits == 0 {
        return false;
    }

    if i < s.len() && (s[i] == b'e' || s[i] == b'E') {
        i += 1;
        if i < s.len() && (s[i] == b'+' || s[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == s.len()
}

/// Integer value of a numeric string, truncating toward zero
///
/// `None` when the value lies outside the i64 range.
fn truncate_to_int(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(i);
    }

    let truncated = trimmed.parse::<f64>().ok()?.trunc();
    // i64::MAX is not representable as f64; 2^63 is the first value past it
    if truncated >= -(2f64.powi(63)) && truncated < 2f64.powi(63) {
        Some(truncated as i64)
    } else {
        None
    }
}

/// Lenient date/time parser for ISO, RFC 3339/2822, slash, dot and month-name forms
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_local()))
        .or_else(|| DateTime::parse_from_rfc2822(value).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(native_type: &str, nullable: bool) -> ColumnInfo {
        ColumnInfo {
            name: "c".to_string(),
            native_type: native_type.to_string(),
            nullable,
        }
    }

    #[test]
    fn test_null_and_empty() {
        assert_eq!(coerce(&json!(""), &column("varchar(255)", true)).unwrap(), Value::Null);
        assert_eq!(coerce(&JsonValue::Null, &column("int", true)).unwrap(), Value::Null);
        assert_eq!(
            coerce(&json!(""), &column("varchar(255)", false)).unwrap_err().0,
            "Value cannot be null"
        );
    }

    #[test]
    fn test_integer_family() {
        let col = column("int(11)", false);
        assert_eq!(coerce(&json!("42"), &col).unwrap(), Value::Int(42));
        assert_eq!(coerce(&json!(" 7 "), &col).unwrap(), Value::Int(7));
        assert_eq!(coerce(&json!("-3.9"), &col).unwrap(), Value::Int(-3));
        assert_eq!(coerce(&json!(12), &col).unwrap(), Value::Int(12));
        assert_eq!(coerce(&json!("1e3"), &col).unwrap(), Value::Int(1000));
        assert_eq!(coerce(&json!("abc"), &col).unwrap_err().0, "Value must be numeric");
        assert_eq!(coerce(&json!("1e30"), &col).unwrap_err().0, "Value must be numeric");
        assert_eq!(
            coerce(&json!("-99999999999999999999"), &col).unwrap_err().0,
            "Value must be numeric"
        );
        assert_eq!(
            coerce(&json!("9007199254740993"), &column("bigint", false)).unwrap(),
            Value::Int(9_007_199_254_740_993)
        );
    }

    #[test]
    fn test_float_family() {
        let col = column("decimal(10,2)", false);
        assert_eq!(coerce(&json!("19.99"), &col).unwrap(), Value::Float(19.99));
        assert_eq!(coerce(&json!(2.5), &col).unwrap(), Value::Float(2.5));
        assert!(coerce(&json!("NaN"), &col).is_err());
        assert!(coerce(&json!(true), &col).is_err());
    }

    #[test]
    fn test_is_numeric() {
        for ok in ["1", "-1", "+1.5", ".5", "5.", "1e10", "1.5E-3", " 12 "] {
            assert!(is_numeric(ok), "{} should be numeric", ok);
        }
        for bad in ["", "abc", "0x1A", "inf", "1e", "1.2.3", "--1", "."] {
            assert!(!is_numeric(bad), "{} should not be numeric", bad);
        }
    }

    #[test]
    fn test_dates() {
        let col = column("date", false);
        let expected = Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        for input in ["2024-01-05", "2024/01/05", "01/05/2024", "05.01.2024", "Jan 5, 2024", "5 January 2024", "2024-01-05T10:00:00"] {
            assert_eq!(coerce(&json!(input), &col).unwrap(), expected, "input {}", input);
        }
        assert_eq!(
            coerce(&json!("2024-13-40"), &col).unwrap_err().0,
            "Invalid date format"
        );
    }

    #[test]
    fn test_datetimes() {
        let col = column("timestamp", false);
        let expected = Value::DateTime(
            NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap(),
        );
        assert_eq!(coerce(&json!("2024-01-05 10:30:00"), &col).unwrap(), expected);
        assert_eq!(coerce(&json!("2024-01-05T10:30:00+02:00"), &col).unwrap(), expected);
        assert_eq!(
            coerce(&json!("2024-01-05"), &column("datetime", false)).unwrap(),
            Value::DateTime(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap().and_time(NaiveTime::MIN))
        );
        assert_eq!(
            coerce(&json!("yesterday-ish"), &col).unwrap_err().0,
            "Invalid datetime format"
        );
    }

    #[test]
    fn test_booleans() {
        let col = column("tinyint(1)", false);
        assert_eq!(coerce(&json!("on"), &col).unwrap(), Value::Bool(true));
        assert_eq!(coerce(&json!("YES"), &col).unwrap(), Value::Bool(true));
        assert_eq!(coerce(&json!("0"), &col).unwrap(), Value::Bool(false));
        assert_eq!(coerce(&json!(false), &col).unwrap(), Value::Bool(false));
        assert_eq!(coerce(&json!(1), &column("boolean", false)).unwrap(), Value::Bool(true));
        assert_eq!(coerce(&json!("maybe"), &col).unwrap_err().0, "Invalid boolean value");
    }

    #[test]
    fn test_text_is_stringified() {
        let col = column("varchar(255)", false);
        assert_eq!(coerce(&json!("abc"), &col).unwrap(), Value::from("abc"));
        assert_eq!(coerce(&json!(42), &col).unwrap(), Value::from("42"));
        assert_eq!(coerce(&json!("x"), &column("jsonb", false)).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_kind_for_native() {
        assert_eq!(CoercionKind::for_native("tinyint(4)"), CoercionKind::Integer);
        assert_eq!(CoercionKind::for_native("tinyint(1)"), CoercionKind::Boolean);
        assert_eq!(CoercionKind::for_native("bigint unsigned"), CoercionKind::Integer);
        assert_eq!(CoercionKind::for_native("double precision"), CoercionKind::Float);
        assert_eq!(CoercionKind::for_native("timestamp with time zone"), CoercionKind::DateTime);
        assert_eq!(CoercionKind::for_native("BIT"), CoercionKind::Boolean);
    }
}
