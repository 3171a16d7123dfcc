// ABOUTME: Import command: loads a CSV, spreadsheet or JSON file into a table
// ABOUTME: Builds the column mapping from target=source pairs and reports row errors

use crate::catalog::Catalog;
use crate::config::DataExplorerConfig;
use crate::db;
use crate::error::ExplorerError;
use crate::import::{self, ColumnMapping, ImportOptions, ImportOutcome, ImportRequest, UploadedFile};
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Parse `target=source` pairs; `target=` leaves the column unmapped
pub fn parse_mapping_args(pairs: &[String]) -> Result<ColumnMapping> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((target, source)) if !target.trim().is_empty() => {
                Ok((target.trim().to_string(), source.trim().to_string()))
            }
            _ => bail!("Invalid mapping '{}'. Expected target=source", pair),
        })
        .filter(|entry| !matches!(entry, Ok((_, source)) if source.is_empty()))
        .collect()
}

pub async fn import(
    config: &DataExplorerConfig,
    table: &str,
    file: &Path,
    mapping: ColumnMapping,
    options: ImportOptions,
) -> Result<ImportOutcome> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let request = ImportRequest {
        file: UploadedFile::new(name, bytes),
        table: table.to_string(),
        mapping,
        options,
    };

    let catalog = Catalog::for_config(&config.database)?;
    let mut conn = db::connect(&config.database).await?;

    let outcome = match import::import(conn.as_mut(), &catalog, &request, &config.import).await {
        Ok(outcome) => outcome,
        Err(ExplorerError::ValidationFailed(errors)) => {
            println!("✗ Validation failed; nothing was imported");
            for error in &errors {
                println!("  row {}: {}", error.row_index + 1, error.messages.join("; "));
            }
            bail!("{} invalid row(s) in {}", errors.len(), file.display());
        }
        Err(e) => return Err(e).with_context(|| format!("Import into '{}' failed", table)),
    };

    println!("✓ Imported {} row(s) into '{}'", outcome.imported_count, table);
    if !outcome.row_errors.is_empty() {
        println!("Skipped {} invalid row(s):", outcome.row_errors.len());
        for error in &outcome.row_errors {
            println!("  row {}: {}", error.row_index + 1, error.messages.join("; "));
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping_args() {
        let mapping = parse_mapping_args(&[
            "id=ID".to_string(),
            "name = Full Name".to_string(),
            "notes=".to_string(),
        ])
        .unwrap();
        assert_eq!(
            mapping,
            vec![
                ("id".to_string(), "ID".to_string()),
                ("name".to_string(), "Full Name".to_string())
            ]
        );

        assert!(parse_mapping_args(&["id".to_string()]).is_err());
        assert!(parse_mapping_args(&["=ID".to_string()]).is_err());
    }
}
