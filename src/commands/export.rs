// ABOUTME: Export command: writes one table's selected columns to a file
// ABOUTME: Parses CLI filter strings and saves the encoded export under an output directory

use crate::catalog::Catalog;
use crate::config::DataExplorerConfig;
use crate::db;
use crate::export::{self, ExportFormat, ExportRequest};
use crate::filters::FilterClause;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Parse `column:operator[:value]`; the value may itself contain colons
pub fn parse_filter_arg(raw: &str) -> Result<FilterClause> {
    let mut parts = raw.splitn(3, ':');
    let column = parts.next().unwrap_or_default().trim();
    let operator = parts.next().map(str::trim).unwrap_or_default();

    if column.is_empty() || operator.is_empty() {
        bail!(
            "Invalid filter '{}'. Expected column:operator[:value], e.g. age:>=:18",
            raw
        );
    }

    Ok(FilterClause::new(column, operator, parts.next()))
}

pub async fn export(
    config: &DataExplorerConfig,
    table: &str,
    columns: Vec<String>,
    format: Option<ExportFormat>,
    filters: &[String],
    filename: Option<String>,
    output_dir: &Path,
) -> Result<PathBuf> {
    let request = ExportRequest {
        table: table.to_string(),
        format: format.unwrap_or(config.export.default_format),
        columns,
        filters: filters
            .iter()
            .map(|f| parse_filter_arg(f))
            .collect::<Result<Vec<_>>>()?,
        filename,
    };

    let catalog = Catalog::for_config(&config.database)?;
    let mut conn = db::connect(&config.database).await?;
    let file = export::export(conn.as_mut(), &catalog, &request)
        .await
        .with_context(|| format!("Export failed for table '{}'", table))?;

    std::fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;
    let path = output_dir.join(&file.filename);
    std::fs::write(&path, &file.bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✓ Wrote {} ({} bytes)", path.display(), file.bytes.len());

    Ok(path)
}
