// ABOUTME: SQL Server <-> Value conversion for tiberius parameters and row cells
// ABOUTME: Decodes TDS date encodings into chrono values

use crate::db::Value;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::borrow::Cow;
use tiberius::{ColumnData, ToSql};

/// Owned parameter handed to tiberius by reference
#[derive(Debug, Clone, PartialEq)]
pub enum MssqlParam {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl From<&Value> for MssqlParam {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => MssqlParam::Null,
            Value::Bool(b) => MssqlParam::Bool(*b),
            Value::Int(i) => MssqlParam::I64(*i),
            Value::Float(f) => MssqlParam::F64(*f),
            Value::Decimal(s) | Value::Text(s) => MssqlParam::String(s.clone()),
            Value::Date(d) => MssqlParam::Date(*d),
            Value::DateTime(dt) => MssqlParam::DateTime(*dt),
            Value::Bytes(b) => MssqlParam::Bytes(b.clone()),
        }
    }
}

impl ToSql for MssqlParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            // Untyped NULL converts implicitly to every column type
            MssqlParam::Null => ColumnData::I32(None),
            MssqlParam::Bool(v) => ColumnData::Bit(Some(*v)),
            MssqlParam::I64(v) => ColumnData::I64(Some(*v)),
            MssqlParam::F64(v) => ColumnData::F64(Some(*v)),
            MssqlParam::String(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            MssqlParam::Bytes(v) => ColumnData::Binary(Some(Cow::Borrowed(v.as_slice()))),
            MssqlParam::Date(v) => v.to_sql(),
            MssqlParam::DateTime(v) => v.to_sql(),
        }
    }
}

fn day_offset(base: (i32, u32, u32), days: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(base.0, base.1, base.2)?.checked_add_signed(Duration::days(days))
}

/// Time of day from 100ns increments since midnight
fn time_from_increments(increments: u64, scale: u8) -> Option<NaiveTime> {
    let nanos_per_increment = 10u64.pow(9u32.saturating_sub(u32::from(scale)));
    let total_nanos = increments * nanos_per_increment;
    NaiveTime::from_num_seconds_from_midnight_opt(
        (total_nanos / 1_000_000_000) as u32,
        (total_nanos % 1_000_000_000) as u32,
    )
}

/// Convert one TDS cell into a [`Value`]
pub fn from_column_data(data: ColumnData<'static>) -> Value {
    let converted = match data {
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::U8(v) => v.map(|i| Value::Int(i.into())),
        ColumnData::I16(v) => v.map(|i| Value::Int(i.into())),
        ColumnData::I32(v) => v.map(|i| Value::Int(i.into())),
        ColumnData::I64(v) => v.map(Value::Int),
        ColumnData::F32(v) => v.map(|f| Value::Float(f.into())),
        ColumnData::F64(v) => v.map(Value::Float),
        ColumnData::String(v) => v.map(|s| Value::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map(|g| Value::Text(g.to_string())),
        ColumnData::Binary(v) => v.map(|b| Value::Bytes(b.into_owned())),
        ColumnData::Numeric(v) => v.map(|n| Value::Decimal(n.to_string())),
        ColumnData::Xml(v) => v.map(|x| Value::Text(x.into_owned().into_string())),
        ColumnData::DateTime(v) => v.and_then(|dt| {
            // 1/300 second ticks since 1900-01-01
            let date = day_offset((1900, 1, 1), dt.days().into())?;
            let millis = u64::from(dt.seconds_fragments()) * 1000 / 300;
            let time = NaiveTime::from_num_seconds_from_midnight_opt(
                (millis / 1000) as u32,
                ((millis % 1000) * 1_000_000) as u32,
            )?;
            Some(Value::DateTime(date.and_time(time)))
        }),
        ColumnData::SmallDateTime(v) => v.and_then(|dt| {
            let date = day_offset((1900, 1, 1), dt.days().into())?;
            let time =
                NaiveTime::from_num_seconds_from_midnight_opt(u32::from(dt.seconds_fragments()) * 60, 0)?;
            Some(Value::DateTime(date.and_time(time)))
        }),
        ColumnData::Date(v) => v.and_then(|d| day_offset((1, 1, 1), d.days().into()).map(Value::Date)),
        ColumnData::Time(v) => v.and_then(|t| {
            time_from_increments(t.increments(), t.scale()).map(|time| Value::Text(time.to_string()))
        }),
        ColumnData::DateTime2(v) => v.and_then(|dt| {
            let date = day_offset((1, 1, 1), dt.date().days().into())?;
            let time = time_from_increments(dt.time().increments(), dt.time().scale())?;
            Some(Value::DateTime(date.and_time(time)))
        }),
        ColumnData::DateTimeOffset(v) => v.and_then(|dto| {
            let dt = dto.datetime2();
            let date = day_offset((1, 1, 1), dt.date().days().into())?;
            let time = time_from_increments(dt.time().increments(), dt.time().scale())?;
            Some(Value::DateTime(date.and_time(time)))
        }),
    };

    converted.unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_from_value() {
        assert_eq!(MssqlParam::from(&Value::Int(3)), MssqlParam::I64(3));
        assert_eq!(
            MssqlParam::from(&Value::from("x")),
            MssqlParam::String("x".to_string())
        );
        assert!(matches!(MssqlParam::Null.to_sql(), ColumnData::I32(None)));
        assert!(matches!(MssqlParam::Bool(true).to_sql(), ColumnData::Bit(Some(true))));
    }

    #[test]
    fn test_scalar_columns() {
        assert_eq!(from_column_data(ColumnData::I32(Some(5))), Value::Int(5));
        assert_eq!(from_column_data(ColumnData::Bit(Some(false))), Value::Bool(false));
        assert_eq!(from_column_data(ColumnData::I64(None)), Value::Null);
        assert_eq!(
            from_column_data(ColumnData::String(Some(Cow::Owned("abc".to_string())))),
            Value::from("abc")
        );
    }

    #[test]
    fn test_numeric_column_keeps_scale() {
        let numeric = tiberius::numeric::Numeric::new_with_scale(1_234_567_890_123_456_789, 2);
        assert_eq!(
            from_column_data(ColumnData::Numeric(Some(numeric))),
            Value::Decimal("12345678901234567.89".to_string())
        );
    }

    #[test]
    fn test_date_column() {
        let date = tiberius::time::Date::new(738_885);
        assert_eq!(
            from_column_data(ColumnData::Date(Some(date))),
            Value::Date(day_offset((1, 1, 1), 738_885).unwrap())
        );
    }

    #[test]
    fn test_time_from_increments() {
        // scale 7 = 100ns increments
        assert_eq!(
            time_from_increments(36_000_000_000, 7),
            NaiveTime::from_hms_opt(1, 0, 0)
        );
        assert_eq!(time_from_increments(3600, 0), NaiveTime::from_hms_opt(1, 0, 0));
    }
}
