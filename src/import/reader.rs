// ABOUTME: Decodes uploaded CSV, spreadsheet and JSON files into source rows
// ABOUTME: Resolves mapped source fields by header name, position or object key

use crate::error::{ExplorerError, Result};
use calamine::{Data, Reader};
use chrono::NaiveDateTime;
use serde_json::{Map, Value as JsonValue};
use std::io::Cursor;

/// Upload formats the importer can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Spreadsheet,
    Json,
}

impl SourceFormat {
    /// Map a file extension (without the dot) to a format
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" | "xls" => Ok(SourceFormat::Spreadsheet),
            "json" => Ok(SourceFormat::Json),
            other => Err(ExplorerError::UnsupportedFileFormat(other.to_string())),
        }
    }
}

/// One decoded data row before mapping
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRow {
    /// CSV/XLSX record or a JSON array row
    Fields(Vec<JsonValue>),
    /// JSON object row
    Object(Map<String, JsonValue>),
    /// JSON scalar row; every mapped field reads the same value
    Scalar(JsonValue),
}

/// Rows of an uploaded file, with the header row when one was consumed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedFile {
    pub header: Option<Vec<String>>,
    pub rows: Vec<SourceRow>,
}

impl DecodedFile {
    /// Value of `source` in `row`; absent fields read as null
    ///
    /// Positional rows resolve `source` by header name first and then as a
    /// 0-based column index.
    pub fn field(&self, row: &SourceRow, source: &str) -> JsonValue {
        match row {
            SourceRow::Object(object) => object.get(source).cloned().unwrap_or(JsonValue::Null),
            SourceRow::Scalar(value) => value.clone(),
            SourceRow::Fields(values) => self
                .position_of(source)
                .and_then(|idx| values.get(idx))
                .cloned()
                .unwrap_or(JsonValue::Null),
        }
    }

    fn position_of(&self, source: &str) -> Option<usize> {
        self.header
            .as_ref()
            .and_then(|header| header.iter().position(|name| name == source))
            .or_else(|| source.trim().parse::<usize>().ok())
    }
}

pub fn decode(format: SourceFormat, bytes: &[u8], skip_header: bool) -> Result<DecodedFile> {
    let decoded = match format {
        SourceFormat::Csv => {
            let records = read_csv(bytes)?;
            split_header(records, skip_header)
        }
        SourceFormat::Spreadsheet => {
            let records = read_spreadsheet(bytes)?;
            split_header(records, skip_header)
        }
        SourceFormat::Json => read_json(bytes)?,
    };

    tracing::debug!(
        "Decoded {} data row(s) from {:?} upload",
        decoded.rows.len(),
        format
    );

    Ok(decoded)
}

fn split_header(mut records: Vec<Vec<JsonValue>>, skip_header: bool) -> DecodedFile {
    let header = if skip_header && !records.is_empty() {
        let first = records.remove(0);
        Some(first.iter().map(header_name).collect())
    } else {
        None
    };

    DecodedFile {
        header,
        rows: records.into_iter().map(SourceRow::Fields).collect(),
    }
}

fn header_name(cell: &JsonValue) -> String {
    match cell {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<JsonValue>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(|f| JsonValue::String(f.to_string())).collect())
                .map_err(|e| ExplorerError::InvalidRequest(format!("Could not read CSV file: {}", e)))
        })
        .collect()
}

fn read_spreadsheet(bytes: &[u8]) -> Result<Vec<Vec<JsonValue>>> {
    let invalid = |e: &dyn std::fmt::Display| {
        ExplorerError::InvalidRequest(format!("Could not read spreadsheet: {}", e))
    };

    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| invalid(&e))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| invalid(&e))?,
        None => return Ok(Vec::new()),
    };

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect())
}

fn cell_value(cell: &Data) -> JsonValue {
    match cell {
        Data::Empty => JsonValue::Null,
        Data::String(s) => JsonValue::String(s.clone()),
        Data::Bool(b) => JsonValue::Bool(*b),
        Data::Int(i) => JsonValue::from(*i),
        Data::Float(f) => float_value(*f),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => JsonValue::String(format_datetime(value)),
            None => float_value(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => JsonValue::String(s.clone()),
        Data::Error(e) => JsonValue::String(e.to_string()),
    }
}

/// Spreadsheets store every number as a float; whole values come back as integers
fn float_value(f: f64) -> JsonValue {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        JsonValue::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

fn format_datetime(value: NaiveDateTime) -> String {
    value.format(crate::db::value::DATETIME_FORMAT).to_string()
}

fn read_json(bytes: &[u8]) -> Result<DecodedFile> {
    let document: JsonValue = serde_json::from_slice(bytes)
        .map_err(|e| ExplorerError::InvalidRequest(format!("Could not read JSON file: {}", e)))?;

    let items = match document {
        JsonValue::Array(items) => items,
        single => vec![single],
    };

    Ok(DecodedFile {
        header: None,
        rows: items
            .into_iter()
            .map(|item| match item {
                JsonValue::Object(object) => SourceRow::Object(object),
                JsonValue::Array(values) => SourceRow::Fields(values),
                scalar => SourceRow::Scalar(scalar),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("CSV").unwrap(), SourceFormat::Csv);
        assert_eq!(
            SourceFormat::from_extension("xls").unwrap(),
            SourceFormat::Spreadsheet
        );
        let err = SourceFormat::from_extension("pdf").unwrap_err();
        assert!(matches!(err, ExplorerError::UnsupportedFileFormat(ref e) if e == "pdf"));
        let err = SourceFormat::from_extension("txt").unwrap_err();
        assert!(matches!(err, ExplorerError::UnsupportedFileFormat(ref e) if e == "txt"));
    }

    #[test]
    fn test_csv_with_header_resolves_by_name_and_position() {
        let decoded = decode(SourceFormat::Csv, b"id,name\n1,Ada\n2\n", true).unwrap();
        assert_eq!(decoded.header, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(decoded.rows.len(), 2);

        let first = &decoded.rows[0];
        assert_eq!(decoded.field(first, "name"), json!("Ada"));
        assert_eq!(decoded.field(first, "0"), json!("1"));
        assert_eq!(decoded.field(&decoded.rows[1], "name"), JsonValue::Null);
        assert_eq!(decoded.field(first, "missing"), JsonValue::Null);
    }

    #[test]
    fn test_csv_without_header_keeps_first_row() {
        let decoded = decode(SourceFormat::Csv, b"1,Ada\n2,Grace\n", false).unwrap();
        assert!(decoded.header.is_none());
        assert_eq!(decoded.rows.len(), 2);
        assert_eq!(decoded.field(&decoded.rows[1], "1"), json!("Grace"));
    }

    #[test]
    fn test_json_rows() {
        let decoded = decode(
            SourceFormat::Json,
            br#"[{"id": 1, "name": "Ada"}, [2, "Grace"], "solo"]"#,
            true,
        )
        .unwrap();
        assert_eq!(decoded.field(&decoded.rows[0], "id"), json!(1));
        assert_eq!(decoded.field(&decoded.rows[1], "1"), json!("Grace"));
        assert_eq!(decoded.field(&decoded.rows[2], "anything"), json!("solo"));
    }

    #[test]
    fn test_json_single_object_is_wrapped() {
        let decoded = decode(SourceFormat::Json, br#"{"id": 9}"#, true).unwrap();
        assert_eq!(decoded.rows.len(), 1);
        assert_eq!(decoded.field(&decoded.rows[0], "id"), json!(9));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let err = decode(SourceFormat::Json, b"{not json", true).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_spreadsheet_cells_keep_native_types() {
        let columns = vec!["id".to_string(), "active".to_string(), "name".to_string()];
        let rows = vec![vec![
            crate::db::Value::Int(3),
            crate::db::Value::Bool(true),
            crate::db::Value::Text("Ada".into()),
        ]];
        let bytes = crate::export::xlsx::encode(&columns, &rows).unwrap();

        let decoded = decode(SourceFormat::Spreadsheet, &bytes, true).unwrap();
        let row = &decoded.rows[0];
        assert_eq!(decoded.field(row, "id"), json!(3));
        assert_eq!(decoded.field(row, "active"), json!(true));
        assert_eq!(decoded.field(row, "name"), json!("Ada"));
    }

    #[test]
    fn test_float_value() {
        assert_eq!(float_value(7.0), json!(7));
        assert_eq!(float_value(2.5), json!(2.5));
    }
}
