// ABOUTME: Export engine: selects table rows with filters and encodes them as a file
// ABOUTME: Validates table and columns against the catalog before building SQL

pub mod csv;
pub mod json;
pub mod xlsx;

use crate::catalog::Catalog;
use crate::db::{Connection, QueryResult};
use crate::error::{ExplorerError, Result};
use crate::filters::{self, FilterClause};
use crate::utils::{sanitize_filename, slugify};
use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Json, ExportFormat::Xlsx];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            "xlsx" => Some(ExportFormat::Xlsx),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV (Comma Separated Values)",
            ExportFormat::Json => "JSON (JavaScript Object Notation)",
            ExportFormat::Xlsx => "Excel Spreadsheet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `{value, label}` entry of the format picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    pub value: &'static str,
    pub label: &'static str,
}

pub fn format_options() -> Vec<FormatOption> {
    ExportFormat::ALL
        .iter()
        .map(|format| FormatOption {
            value: format.extension(),
            label: format.label(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportRequest {
    pub table: String,
    pub format: ExportFormat,
    pub columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// An encoded export ready to be written or sent
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// `{explicit name or slugified table}_{YYYY-MM-DD_HHMMSS}.{ext}`
pub fn export_filename(
    table: &str,
    explicit: Option<&str>,
    format: ExportFormat,
    timestamp: NaiveDateTime,
) -> String {
    let base = explicit
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| slugify(table));
    let base = if base.is_empty() {
        "export".to_string()
    } else {
        base
    };

    format!(
        "{}_{}.{}",
        base,
        timestamp.format("%Y-%m-%d_%H%M%S"),
        format.extension()
    )
}

/// Run an export request against an open connection
pub async fn export(
    conn: &mut dyn Connection,
    catalog: &Catalog,
    request: &ExportRequest,
) -> Result<ExportFile> {
    let started = std::time::Instant::now();

    if request.columns.is_empty() {
        return Err(ExplorerError::InvalidRequest(
            "At least one column must be selected".to_string(),
        ));
    }

    let table_columns = catalog.table_columns(conn, &request.table).await?;
    let known = |name: &str| table_columns.iter().any(|c| c.name == name);

    let predicates = filters::parse_filters(&request.filters)?;
    for column in request
        .columns
        .iter()
        .map(String::as_str)
        .chain(predicates.iter().map(|p| p.column()))
    {
        if !known(column) {
            return Err(ExplorerError::ColumnMismatch {
                table: request.table.clone(),
                column: column.to_string(),
            });
        }
    }

    let dialect = conn.dialect();
    let select_list = request
        .columns
        .iter()
        .map(|c| dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let where_clause = filters::build_where(dialect, &predicates, 1);
    let sql = format!(
        "SELECT {} FROM {}{}",
        select_list,
        dialect.quote_ident(&request.table),
        where_clause.sql
    );

    tracing::debug!("Export query: {}", sql);

    let result = conn
        .query(&sql, &where_clause.params)
        .await
        .with_context(|| format!("Failed to read rows from table '{}'", request.table))?;

    let bytes = encode(request.format, &request.columns, &result)?;
    let filename = export_filename(
        &request.table,
        request.filename.as_deref(),
        request.format,
        chrono::Local::now().naive_local(),
    );

    tracing::info!(
        "Exported {} row(s) from '{}' as {} ({} bytes) in {:.2}s",
        result.len(),
        request.table,
        request.format,
        bytes.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(ExportFile {
        filename,
        content_type: request.format.content_type(),
        bytes,
    })
}

/// Encode a result set; `columns` fixes the header order
pub fn encode(format: ExportFormat, columns: &[String], result: &QueryResult) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => csv::encode(columns, &result.rows),
        ExportFormat::Json => json::encode(columns, &result.rows),
        ExportFormat::Xlsx => xlsx::encode(columns, &result.rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_export_filename_from_table() {
        assert_eq!(
            export_filename("order_items", None, ExportFormat::Csv, timestamp()),
            "order-items_2024-03-09_140507.csv"
        );
    }

    #[test]
    fn test_export_filename_explicit() {
        assert_eq!(
            export_filename("users", Some("q1 report"), ExportFormat::Xlsx, timestamp()),
            "q1 report_2024-03-09_140507.xlsx"
        );
        assert_eq!(
            export_filename("users", Some("\"\""), ExportFormat::Json, timestamp()),
            "users_2024-03-09_140507.json"
        );
        assert_eq!(
            export_filename("%%%", None, ExportFormat::Json, timestamp()),
            "export_2024-03-09_140507.json"
        );
    }

    #[test]
    fn test_format_metadata() {
        assert_eq!(ExportFormat::parse("XLSX"), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::parse("pdf"), None);
        assert_eq!(ExportFormat::Csv.content_type(), "text/csv");
        assert_eq!(format_options()[2].label, "Excel Spreadsheet");
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: ExportRequest = serde_json::from_str(
            r#"{"table": "users", "format": "json", "columns": ["id", "name"]}"#,
        )
        .unwrap();
        assert_eq!(request.format, ExportFormat::Json);
        assert!(request.filters.is_empty());
        assert!(request.filename.is_none());
    }

    #[test]
    fn test_content_disposition() {
        let file = ExportFile {
            filename: "users_2024-03-09_140507.csv".to_string(),
            content_type: "text/csv",
            bytes: vec![],
        };
        assert_eq!(
            file.content_disposition(),
            "attachment; filename=\"users_2024-03-09_140507.csv\""
        );
    }
}
