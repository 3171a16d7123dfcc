// ABOUTME: MySQL <-> Value conversion for bound parameters and result rows
// ABOUTME: Uses column metadata to recover booleans, decimals, dates and binary data

use crate::db::Value;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use mysql_async::consts::ColumnType;
use mysql_async::{Column, Value as MySqlValue};

/// Character set number MySQL reports for binary strings and blobs
const BINARY_CHARSET: u16 = 63;

/// Convert a bound parameter into a MySQL wire value
///
/// # Examples
///
/// ```
/// # use data_explorer::db::Value;
/// # use data_explorer::mysql::converter::to_mysql_value;
/// assert_eq!(to_mysql_value(&Value::Bool(true)), mysql_async::Value::Int(1));
/// ```
pub fn to_mysql_value(value: &Value) -> MySqlValue {
    match value {
        Value::Null => MySqlValue::NULL,
        Value::Bool(b) => MySqlValue::Int(i64::from(*b)),
        Value::Int(i) => MySqlValue::Int(*i),
        Value::Float(f) => MySqlValue::Double(*f),
        Value::Decimal(s) => MySqlValue::Bytes(s.as_bytes().to_vec()),
        Value::Text(s) => MySqlValue::Bytes(s.as_bytes().to_vec()),
        Value::Date(d) => date_value(d.and_time(NaiveTime::MIN)),
        Value::DateTime(dt) => date_value(*dt),
        Value::Bytes(b) => MySqlValue::Bytes(b.clone()),
    }
}

fn date_value(dt: NaiveDateTime) -> MySqlValue {
    MySqlValue::Date(
        dt.year() as u16,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
        dt.second() as u8,
        dt.nanosecond() / 1_000,
    )
}

/// Convert a result cell using its column's declared type
pub fn from_mysql_value(value: MySqlValue, column: &Column) -> Value {
    let column_type = column.column_type();

    match value {
        MySqlValue::NULL => Value::Null,

        MySqlValue::Int(i) if is_boolean_column(column) => Value::Bool(i != 0),
        MySqlValue::Int(i) => Value::Int(i),
        MySqlValue::UInt(u) => i64::try_from(u)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Decimal(u.to_string())),

        MySqlValue::Float(f) => Value::Float(f64::from(f)),
        MySqlValue::Double(d) => Value::Float(d),

        MySqlValue::Bytes(bytes) => match column_type {
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                Value::Decimal(String::from_utf8_lossy(&bytes).trim().to_string())
            }
            ColumnType::MYSQL_TYPE_TINY
            | ColumnType::MYSQL_TYPE_SHORT
            | ColumnType::MYSQL_TYPE_INT24
            | ColumnType::MYSQL_TYPE_LONG
            | ColumnType::MYSQL_TYPE_LONGLONG => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                match text.trim().parse::<i64>() {
                    Ok(i) if is_boolean_column(column) => Value::Bool(i != 0),
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::Text(text),
                }
            }
            _ if column.character_set() == BINARY_CHARSET => Value::Bytes(bytes),
            _ => match String::from_utf8(bytes) {
                Ok(s) => Value::Text(s),
                Err(e) => Value::Bytes(e.into_bytes()),
            },
        },

        MySqlValue::Date(year, month, day, hour, minute, second, micro) => {
            let Some(date) = NaiveDate::from_ymd_opt(year.into(), month.into(), day.into()) else {
                // Zero dates such as 0000-00-00 have no calendar equivalent
                return Value::Text(format!("{:04}-{:02}-{:02}", year, month, day));
            };
            if column_type == ColumnType::MYSQL_TYPE_DATE {
                return Value::Date(date);
            }
            date.and_hms_micro_opt(hour.into(), minute.into(), second.into(), micro)
                .map(Value::DateTime)
                .unwrap_or(Value::Date(date))
        }

        MySqlValue::Time(is_negative, days, hours, minutes, seconds, _micro) => {
            let sign = if is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(hours);
            Value::Text(format!(
                "{}{:02}:{:02}:{:02}",
                sign, total_hours, minutes, seconds
            ))
        }
    }
}

fn is_boolean_column(column: &Column) -> bool {
    column.column_type() == ColumnType::MYSQL_TYPE_TINY && column.column_length() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(column_type: ColumnType) -> Column {
        Column::new(column_type)
    }

    #[test]
    fn test_to_mysql_value() {
        assert_eq!(to_mysql_value(&Value::Null), MySqlValue::NULL);
        assert_eq!(to_mysql_value(&Value::Int(7)), MySqlValue::Int(7));
        assert_eq!(
            to_mysql_value(&Value::from("abc")),
            MySqlValue::Bytes(b"abc".to_vec())
        );
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(
            to_mysql_value(&Value::Date(date)),
            MySqlValue::Date(2024, 5, 6, 0, 0, 0, 0)
        );
    }

    #[test]
    fn test_convert_integers() {
        let col = column(ColumnType::MYSQL_TYPE_LONG);
        assert_eq!(from_mysql_value(MySqlValue::Int(-5), &col), Value::Int(-5));
        assert_eq!(from_mysql_value(MySqlValue::UInt(5), &col), Value::Int(5));
        assert_eq!(from_mysql_value(MySqlValue::NULL, &col), Value::Null);
    }

    #[test]
    fn test_convert_decimal_text() {
        let col = column(ColumnType::MYSQL_TYPE_NEWDECIMAL);
        assert_eq!(
            from_mysql_value(MySqlValue::Bytes(b"12.50".to_vec()), &col),
            Value::Decimal("12.50".to_string())
        );
        assert_eq!(
            from_mysql_value(MySqlValue::Bytes(b"12345678901234567.89".to_vec()), &col),
            Value::Decimal("12345678901234567.89".to_string())
        );

        let unsigned = column(ColumnType::MYSQL_TYPE_LONGLONG);
        assert_eq!(
            from_mysql_value(MySqlValue::UInt(u64::MAX), &unsigned),
            Value::Decimal("18446744073709551615".to_string())
        );
    }

    #[test]
    fn test_convert_strings() {
        let col = column(ColumnType::MYSQL_TYPE_VAR_STRING);
        assert_eq!(
            from_mysql_value(MySqlValue::Bytes(b"Alice".to_vec()), &col),
            Value::from("Alice")
        );
    }

    #[test]
    fn test_convert_dates() {
        let date_col = column(ColumnType::MYSQL_TYPE_DATE);
        assert_eq!(
            from_mysql_value(MySqlValue::Date(2024, 1, 2, 0, 0, 0, 0), &date_col),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );

        let dt_col = column(ColumnType::MYSQL_TYPE_DATETIME);
        assert_eq!(
            from_mysql_value(MySqlValue::Date(2024, 1, 2, 3, 4, 5, 0), &dt_col),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_opt(3, 4, 5)
                    .unwrap()
            )
        );

        assert_eq!(
            from_mysql_value(MySqlValue::Date(0, 0, 0, 0, 0, 0, 0), &date_col),
            Value::from("0000-00-00")
        );
    }

    #[test]
    fn test_convert_time() {
        let col = column(ColumnType::MYSQL_TYPE_TIME);
        assert_eq!(
            from_mysql_value(MySqlValue::Time(false, 1, 2, 30, 0, 0), &col),
            Value::from("26:30:00")
        );
    }
}
