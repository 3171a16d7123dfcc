// ABOUTME: PostgreSQL <-> Value conversion driven by prepared statement types
// ABOUTME: Binds text filter values to typed columns and decodes NUMERIC without loss

use crate::db::value::DATE_FORMAT;
use crate::db::Value;
use anyhow::{Context, Result};
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::error::Error;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::Row;

type BoxError = Box<dyn Error + Sync + Send>;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

/// A parameter converted to the exact wire type PostgreSQL inferred for it
///
/// tokio-postgres sends parameters in binary form, so an `i64` bound to an
/// INT4 column or a string bound to a DATE column would be rejected. The
/// statement is prepared first and every value is converted here.
#[derive(Debug, Clone, PartialEq)]
pub enum PgParam {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Numeric(Vec<u8>),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeUtc(DateTime<Utc>),
}

impl PgParam {
    pub fn for_type(value: &Value, target: &Type) -> Self {
        match value {
            Value::Null => PgParam::Null,
            Value::Bool(b) => match *target {
                Type::BOOL => PgParam::Bool(*b),
                Type::INT2 | Type::INT4 | Type::INT8 => Self::int(i64::from(*b), target),
                _ if is_text_type(target) => PgParam::Text(b.to_string()),
                _ => PgParam::Bool(*b),
            },
            Value::Int(i) => Self::int(*i, target),
            Value::Float(f) => match *target {
                Type::FLOAT4 => PgParam::Float32(*f as f32),
                Type::INT2 | Type::INT4 | Type::INT8 => Self::text(&f.trunc().to_string(), target),
                Type::NUMERIC => Self::numeric(&f.to_string()),
                _ if is_text_type(target) => PgParam::Text(f.to_string()),
                _ => PgParam::Float64(*f),
            },
            Value::Decimal(s) | Value::Text(s) => Self::text(s, target),
            Value::Date(d) => match *target {
                Type::TIMESTAMP => PgParam::DateTime(d.and_time(NaiveTime::MIN)),
                Type::TIMESTAMPTZ => PgParam::DateTimeUtc(d.and_time(NaiveTime::MIN).and_utc()),
                _ if is_text_type(target) => PgParam::Text(value.to_string()),
                _ => PgParam::Date(*d),
            },
            Value::DateTime(dt) => match *target {
                Type::DATE => PgParam::Date(dt.date()),
                Type::TIMESTAMPTZ => PgParam::DateTimeUtc(dt.and_utc()),
                _ if is_text_type(target) => PgParam::Text(value.to_string()),
                _ => PgParam::DateTime(*dt),
            },
            Value::Bytes(b) => PgParam::Bytes(b.clone()),
        }
    }

    /// Narrow to the column width; out-of-range values stay as text so the bind fails
    fn int(value: i64, target: &Type) -> Self {
        let out_of_range = || PgParam::Text(value.to_string());
        match *target {
            Type::INT2 => i16::try_from(value)
                .map(PgParam::Int16)
                .unwrap_or_else(|_| out_of_range()),
            Type::INT4 => i32::try_from(value)
                .map(PgParam::Int32)
                .unwrap_or_else(|_| out_of_range()),
            Type::FLOAT4 => PgParam::Float32(value as f32),
            Type::FLOAT8 => PgParam::Float64(value as f64),
            Type::NUMERIC => Self::numeric(&value.to_string()),
            Type::BOOL => PgParam::Bool(value != 0),
            _ if is_text_type(target) => PgParam::Text(value.to_string()),
            _ => PgParam::Int64(value),
        }
    }

    fn numeric(text: &str) -> Self {
        match encode_numeric(text) {
            Some(bytes) => PgParam::Numeric(bytes),
            None => PgParam::Text(text.to_string()),
        }
    }

    /// Parse a text value into the target type, keeping it as text when it does not parse
    fn text(value: &str, target: &Type) -> Self {
        let trimmed = value.trim();
        let fallback = || PgParam::Text(value.to_string());

        match *target {
            Type::BOOL => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" | "on" => PgParam::Bool(true),
                "0" | "false" | "f" | "no" | "off" => PgParam::Bool(false),
                _ => fallback(),
            },
            Type::INT2 | Type::INT4 | Type::INT8 => trimmed
                .parse::<i64>()
                .map(|i| Self::int(i, target))
                .unwrap_or_else(|_| fallback()),
            Type::FLOAT4 => trimmed
                .parse::<f32>()
                .map(PgParam::Float32)
                .unwrap_or_else(|_| fallback()),
            Type::FLOAT8 => trimmed
                .parse::<f64>()
                .map(PgParam::Float64)
                .unwrap_or_else(|_| fallback()),
            Type::NUMERIC => match encode_numeric(trimmed) {
                Some(bytes) => PgParam::Numeric(bytes),
                // Exponent notation is normalised through f64
                None => trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .and_then(|f| encode_numeric(&f.to_string()))
                    .map(PgParam::Numeric)
                    .unwrap_or_else(fallback),
            },
            Type::JSON | Type::JSONB => serde_json::from_str(value)
                .map(PgParam::Json)
                .unwrap_or_else(|_| PgParam::Json(serde_json::Value::String(value.to_string()))),
            Type::DATE => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(PgParam::Date)
                .unwrap_or_else(|_| fallback()),
            Type::TIMESTAMP => parse_timestamp(trimmed)
                .map(PgParam::DateTime)
                .unwrap_or_else(fallback),
            Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(trimmed)
                .map(|ts| ts.with_timezone(&Utc))
                .ok()
                .or_else(|| parse_timestamp(trimmed).map(|ts| ts.and_utc()))
                .map(PgParam::DateTimeUtc)
                .unwrap_or_else(fallback),
            _ => fallback(),
        }
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn is_text_type(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

/// Fixed-width types whose binary form cannot be produced from raw text
fn rejects_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::NUMERIC
            | Type::DATE
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
            | Type::UUID
    )
}

impl ToSql for PgParam {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            PgParam::Null => Ok(IsNull::Yes),
            PgParam::Bool(v) => v.to_sql(ty, out),
            PgParam::Int16(v) => v.to_sql(ty, out),
            PgParam::Int32(v) => v.to_sql(ty, out),
            PgParam::Int64(v) => v.to_sql(ty, out),
            PgParam::Float32(v) => v.to_sql(ty, out),
            PgParam::Float64(v) => v.to_sql(ty, out),
            PgParam::Numeric(bytes) => {
                out.put_slice(bytes);
                Ok(IsNull::No)
            }
            PgParam::Text(v) => {
                if rejects_text(ty) {
                    return Err(format!("value '{}' is not a valid {}", v, ty).into());
                }
                // Enums, domains and other text-like types share the text wire format
                out.put_slice(v.as_bytes());
                Ok(IsNull::No)
            }
            PgParam::Bytes(v) => v.to_sql(ty, out),
            PgParam::Json(v) => v.to_sql(ty, out),
            PgParam::Date(v) => v.to_sql(ty, out),
            PgParam::DateTime(v) => v.to_sql(ty, out),
            PgParam::DateTimeUtc(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Encode a plain decimal string (`-12.340`) in PostgreSQL's binary NUMERIC format
pub fn encode_numeric(text: &str) -> Option<Vec<u8>> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let dscale = frac_part.len();

    // Left-pad the integer part and right-pad the fraction to whole base-10000 groups
    let int_pad = (4 - int_part.len() % 4) % 4;
    let frac_pad = (4 - frac_part.len() % 4) % 4;
    let int_digits = format!("{}{}", "0".repeat(int_pad), int_part);
    let frac_digits = format!("{}{}", frac_part, "0".repeat(frac_pad));

    let to_groups = |digits: &str| -> Vec<u16> {
        digits
            .as_bytes()
            .chunks(4)
            .map(|chunk| chunk.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0')))
            .collect()
    };

    let int_groups = to_groups(&int_digits);
    let mut groups = int_groups.clone();
    groups.extend(to_groups(&frac_digits));

    let mut weight = int_groups.len() as i32 - 1;
    let leading = groups.iter().take_while(|g| **g == 0).count();
    groups.drain(..leading);
    weight -= leading as i32;
    while groups.last() == Some(&0) {
        groups.pop();
    }

    let sign = if negative && !groups.is_empty() {
        NUMERIC_NEG
    } else {
        NUMERIC_POS
    };
    if groups.is_empty() {
        weight = 0;
    }

    let mut out = Vec::with_capacity(8 + groups.len() * 2);
    out.extend_from_slice(&(groups.len() as i16).to_be_bytes());
    out.extend_from_slice(&(weight as i16).to_be_bytes());
    out.extend_from_slice(&sign.to_be_bytes());
    out.extend_from_slice(&(dscale as i16).to_be_bytes());
    for group in groups {
        out.extend_from_slice(&group.to_be_bytes());
    }
    Some(out)
}

/// Decode PostgreSQL's binary NUMERIC format into a decimal string
pub fn decode_numeric(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("invalid NUMERIC payload: too short".into());
    }

    let ndigits = i16::from_be_bytes([raw[0], raw[1]]).max(0) as usize;
    let weight = i16::from_be_bytes([raw[2], raw[3]]);
    let sign = u16::from_be_bytes([raw[4], raw[5]]);
    let dscale = i16::from_be_bytes([raw[6], raw[7]]).max(0) as usize;

    if raw.len() < 8 + ndigits * 2 {
        return Err("invalid NUMERIC payload: truncated digits".into());
    }
    if sign == NUMERIC_NAN {
        return Ok("NaN".to_string());
    }

    let digits: Vec<u16> = (0..ndigits)
        .map(|i| u16::from_be_bytes([raw[8 + i * 2], raw[9 + i * 2]]))
        .collect();

    let int_group_count = if weight >= 0 { weight as usize + 1 } else { 0 };

    let mut int_text = String::new();
    for index in 0..int_group_count {
        let group = digits.get(index).copied().unwrap_or(0);
        if int_text.is_empty() {
            if group != 0 {
                int_text.push_str(&group.to_string());
            }
        } else {
            int_text.push_str(&format!("{:04}", group));
        }
    }
    if int_text.is_empty() {
        int_text.push('0');
    }

    let mut frac_text = String::new();
    if dscale > 0 {
        // Negative weights mean leading zero groups after the decimal point
        let leading_zero_groups = if weight < 0 { (-weight - 1) as usize } else { 0 };
        frac_text.push_str(&"0000".repeat(leading_zero_groups));
        for group in digits.iter().skip(int_group_count) {
            frac_text.push_str(&format!("{:04}", group));
        }
        if frac_text.len() < dscale {
            frac_text.push_str(&"0".repeat(dscale - frac_text.len()));
        } else {
            frac_text.truncate(dscale);
        }
    }

    let mut output = String::new();
    if sign == NUMERIC_NEG && !(int_text == "0" && frac_text.bytes().all(|b| b == b'0')) {
        output.push('-');
    }
    output.push_str(&int_text);
    if !frac_text.is_empty() {
        output.push('.');
        output.push_str(&frac_text);
    }
    Ok(output)
}

struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(decode_numeric(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Any type whose binary form is its UTF-8 text (enums, citext, domains over text)
struct RawText(String);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(String::from_utf8_lossy(raw).into_owned()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// Read one cell of a result row according to its column type
pub fn from_pg_row(row: &Row, idx: usize) -> Result<Value> {
    let ty = row.columns()[idx].type_().clone();
    let name = row.columns()[idx].name().to_string();

    fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Result<Option<T>, tokio_postgres::Error> {
        row.try_get::<_, Option<T>>(idx)
    }

    let value = match ty {
        Type::BOOL => get::<bool>(row, idx).map(|v| v.map(Value::Bool)),
        Type::INT2 => get::<i16>(row, idx).map(|v| v.map(|i| Value::Int(i.into()))),
        Type::INT4 => get::<i32>(row, idx).map(|v| v.map(|i| Value::Int(i.into()))),
        Type::INT8 => get::<i64>(row, idx).map(|v| v.map(Value::Int)),
        Type::OID => get::<u32>(row, idx).map(|v| v.map(|i| Value::Int(i.into()))),
        Type::FLOAT4 => get::<f32>(row, idx).map(|v| v.map(|f| Value::Float(f.into()))),
        Type::FLOAT8 => get::<f64>(row, idx).map(|v| v.map(Value::Float)),
        Type::NUMERIC => get::<NumericText>(row, idx).map(|v| v.map(|n| Value::Decimal(n.0))),
        Type::BYTEA => get::<Vec<u8>>(row, idx).map(|v| v.map(Value::Bytes)),
        Type::JSON | Type::JSONB => {
            get::<serde_json::Value>(row, idx).map(|v| v.map(|j| Value::Text(j.to_string())))
        }
        Type::DATE => get::<NaiveDate>(row, idx).map(|v| v.map(Value::Date)),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx).map(|v| v.map(Value::DateTime)),
        Type::TIMESTAMPTZ => {
            get::<DateTime<Utc>>(row, idx).map(|v| v.map(|ts| Value::DateTime(ts.naive_utc())))
        }
        Type::TIME => get::<NaiveTime>(row, idx).map(|v| v.map(|t| Value::Text(t.to_string()))),
        _ => get::<RawText>(row, idx).map(|v| v.map(|t| Value::Text(t.0))),
    }
    .with_context(|| format!("Failed to decode column '{}' of type {}", name, ty))?;

    Ok(value.unwrap_or(Value::Null))
}
