// ABOUTME: Import engine: decodes an uploaded file and writes its rows into a table
// ABOUTME: Maps and coerces fields, batches inserts or upserts inside one transaction

pub mod reader;
pub mod writer;

use crate::catalog::{Catalog, ColumnInfo};
use crate::coercion;
use crate::config::ImportConfig;
use crate::db::{Connection, Value};
use crate::error::{ExplorerError, Result, RowError};
use reader::{DecodedFile, SourceFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

/// Behaviour switches sent with an upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    #[serde(default = "default_skip_header")]
    pub skip_header: bool,
    #[serde(default)]
    pub validate_data: bool,
    #[serde(default)]
    pub update_existing: bool,
    #[serde(default)]
    pub update_key: Option<String>,
}

fn default_skip_header() -> bool {
    true
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_header: true,
            validate_data: false,
            update_existing: false,
            update_key: None,
        }
    }
}

impl ImportOptions {
    /// The key column when update-by-key is switched on
    pub fn upsert_key(&self) -> Option<&str> {
        if !self.update_existing {
            return None;
        }
        self.update_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Lowercased extension of the client-supplied file name
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
    }
}

/// Target column to source field pairs, in mapping order; empty sources are skipped
pub type ColumnMapping = Vec<(String, String)>;

/// Parse a JSON object mapping target columns to source fields
///
/// Null and empty-string sources mean "skip"; numeric sources are positions.
pub fn parse_mapping(raw: &str) -> Result<ColumnMapping> {
    let value: JsonValue = serde_json::from_str(raw)
        .map_err(|e| ExplorerError::InvalidRequest(format!("Invalid column mapping: {}", e)))?;

    let JsonValue::Object(entries) = value else {
        return Err(ExplorerError::InvalidRequest(
            "Invalid column mapping: expected an object".to_string(),
        ));
    };

    Ok(entries
        .into_iter()
        .filter_map(|(target, source)| {
            let source = match source {
                JsonValue::String(s) => s,
                JsonValue::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((target, source))
        })
        .filter(|(_, source)| !source.trim().is_empty())
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub file: UploadedFile,
    pub table: String,
    pub mapping: ColumnMapping,
    pub options: ImportOptions,
}

/// Result of one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub imported_count: u64,
    pub row_errors: Vec<RowError>,
}

/// A mapped, coerced row ready to write
struct MappedRow {
    columns: Vec<String>,
    values: Vec<Value>,
}

/// Inserts waiting for the next flush; every row shares `columns`
#[derive(Default)]
struct PendingBatch {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl PendingBatch {
    fn accepts(&self, columns: &[String]) -> bool {
        self.rows.is_empty() || self.columns == columns
    }
}

/// Import a file into `request.table`
///
/// All writes happen in a single transaction. With `validateData` any row
/// error rolls the whole run back and is returned as `ValidationFailed`.
pub async fn import(
    conn: &mut dyn Connection,
    catalog: &Catalog,
    request: &ImportRequest,
    config: &ImportConfig,
) -> Result<ImportOutcome> {
    let started = std::time::Instant::now();

    // Validating
    let size = request.file.bytes.len() as u64;
    if size > config.max_file_size {
        return Err(ExplorerError::InvalidRequest(format!(
            "The uploaded file is {} bytes; the maximum is {} bytes",
            size, config.max_file_size
        )));
    }
    let format = SourceFormat::from_extension(&request.file.extension())?;
    let table_columns = catalog.table_columns(conn, &request.table).await?;
    let targets = resolve_targets(&request.table, &table_columns, request)?;

    // Decoding
    let decoded = reader::decode(format, &request.file.bytes, request.options.skip_header)?;

    tracing::info!(
        "Importing {} row(s) from '{}' into '{}'",
        decoded.rows.len(),
        request.file.name,
        request.table
    );

    // ProcessingRows
    conn.begin().await.map_err(ExplorerError::Transaction)?;

    let outcome = match process_rows(conn, request, &targets, &decoded, config.batch_size).await {
        Ok(outcome) => outcome,
        Err(e) => {
            rollback(conn, &request.table).await;
            return Err(e);
        }
    };

    if request.options.validate_data && !outcome.row_errors.is_empty() {
        rollback(conn, &request.table).await;
        tracing::warn!(
            "Import into '{}' rejected: {} invalid row(s)",
            request.table,
            outcome.row_errors.len()
        );
        return Err(ExplorerError::ValidationFailed(outcome.row_errors));
    }

    conn.commit().await.map_err(ExplorerError::Transaction)?;

    tracing::info!(
        "Imported {} row(s) into '{}' ({} row error(s)) in {:.2}s",
        outcome.imported_count,
        request.table,
        outcome.row_errors.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(outcome)
}

/// Check every mapped target (and the update key) against the table's columns
fn resolve_targets<'a>(
    table: &str,
    table_columns: &'a [ColumnInfo],
    request: &ImportRequest,
) -> Result<Vec<(&'a ColumnInfo, String)>> {
    let lookup = |name: &str| {
        table_columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ExplorerError::ColumnMismatch {
                table: table.to_string(),
                column: name.to_string(),
            })
    };

    let targets = request
        .mapping
        .iter()
        .filter(|(_, source)| !source.trim().is_empty())
        .map(|(target, source)| Ok((lookup(target)?, source.clone())))
        .collect::<Result<Vec<_>>>()?;

    if targets.is_empty() {
        return Err(ExplorerError::InvalidRequest(
            "At least one column must be mapped".to_string(),
        ));
    }

    if let Some(key) = request.options.upsert_key() {
        lookup(key)?;
    }

    Ok(targets)
}

async fn process_rows(
    conn: &mut dyn Connection,
    request: &ImportRequest,
    targets: &[(&ColumnInfo, String)],
    decoded: &DecodedFile,
    batch_size: usize,
) -> Result<ImportOutcome> {
    let table = request.table.as_str();
    let upsert_key = request.options.upsert_key();
    let batch_size = batch_size.max(1);

    let mut outcome = ImportOutcome::default();
    let mut batch = PendingBatch::default();

    for (row_index, source_row) in decoded.rows.iter().enumerate() {
        let mut mapped = MappedRow {
            columns: Vec::with_capacity(targets.len()),
            values: Vec::with_capacity(targets.len()),
        };
        let mut messages = Vec::new();

        for (column, source) in targets {
            let raw = decoded.field(source_row, source);
            match coercion::coerce(&raw, column) {
                Ok(value) => {
                    mapped.columns.push(column.name.clone());
                    mapped.values.push(value);
                }
                Err(e) => messages.push(format!("Column '{}': {}", column.name, e)),
            }
        }

        if !messages.is_empty() {
            outcome.row_errors.push(RowError {
                row_index,
                messages,
            });
            continue;
        }

        if let Some(key_column) = upsert_key {
            let key = mapped
                .columns
                .iter()
                .position(|c| c == key_column)
                .map(|idx| mapped.values[idx].clone());

            if let Some(key) = key.filter(|k| !k.is_null()) {
                // Earlier rows of this file must be visible to the lookup
                flush(conn, table, &mut batch, &mut outcome).await?;

                if writer::row_exists(conn, table, key_column, &key).await? {
                    let data: Vec<(String, Value)> =
                        mapped.columns.into_iter().zip(mapped.values).collect();
                    writer::update_row(conn, table, key_column, &key, &data).await?;
                    outcome.imported_count += 1;
                    continue;
                }
            }
        }

        if !batch.accepts(&mapped.columns) {
            flush(conn, table, &mut batch, &mut outcome).await?;
        }
        if batch.rows.is_empty() {
            batch.columns = mapped.columns;
        }
        batch.rows.push(mapped.values);

        if batch.rows.len() >= batch_size {
            flush(conn, table, &mut batch, &mut outcome).await?;
        }
    }

    flush(conn, table, &mut batch, &mut outcome).await?;

    Ok(outcome)
}

async fn flush(
    conn: &mut dyn Connection,
    table: &str,
    batch: &mut PendingBatch,
    outcome: &mut ImportOutcome,
) -> Result<()> {
    if batch.rows.is_empty() {
        return Ok(());
    }

    writer::insert_batch(conn, table, &batch.columns, &batch.rows).await?;
    outcome.imported_count += batch.rows.len() as u64;
    batch.rows.clear();

    Ok(())
}

async fn rollback(conn: &mut dyn Connection, table: &str) {
    match conn.rollback().await {
        Ok(()) => tracing::info!("Rolled back import into '{}'", table),
        Err(e) => tracing::warn!("Failed to roll back import into '{}': {:#}", table, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query_count;
    use crate::sqlite::{SqliteConnection, SqliteIntrospector};

    fn setup() -> (tempfile::TempDir, SqliteConnection, Catalog) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("import.db");
        let raw = rusqlite::Connection::open(&db_path).unwrap();
        raw.execute_batch(
            "CREATE TABLE people (
                 id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 age INTEGER,
                 born DATE,
                 active BOOLEAN
             );
             INSERT INTO people (id, name, age) VALUES (1, 'Ada', 36);
             CREATE TABLE jobs (id INTEGER);",
        )
        .unwrap();
        drop(raw);

        let conn = SqliteConnection::open(db_path.to_str().unwrap()).unwrap();
        (temp_dir, conn, Catalog::new(Box::new(SqliteIntrospector)))
    }

    fn request(name: &str, bytes: &[u8], mapping: &[(&str, &str)]) -> ImportRequest {
        ImportRequest {
            file: UploadedFile::new(name, bytes.to_vec()),
            table: "people".to_string(),
            mapping: mapping
                .iter()
                .map(|(t, s)| (t.to_string(), s.to_string()))
                .collect(),
            options: ImportOptions::default(),
        }
    }

    async fn count(conn: &mut SqliteConnection) -> u64 {
        query_count(conn, "SELECT COUNT(*) FROM people", &[])
            .await
            .unwrap()
    }

    #[test]
    fn test_options_defaults() {
        let options: ImportOptions = serde_json::from_str("{}").unwrap();
        assert!(options.skip_header);
        assert!(!options.validate_data);
        assert!(options.upsert_key().is_none());

        let options: ImportOptions =
            serde_json::from_str(r#"{"updateExisting": true, "updateKey": "id"}"#).unwrap();
        assert_eq!(options.upsert_key(), Some("id"));
    }

    #[test]
    fn test_parse_mapping_skips_empty_sources() {
        let mapping = parse_mapping(r#"{"id": "ID", "name": "", "age": null, "born": 3}"#).unwrap();
        assert_eq!(
            mapping,
            vec![
                ("id".to_string(), "ID".to_string()),
                ("born".to_string(), "3".to_string())
            ]
        );
        assert!(parse_mapping("[1, 2]").is_err());
    }

    #[test]
    fn test_uploaded_file_extension() {
        assert_eq!(UploadedFile::new("People.CSV", vec![]).extension(), "csv");
        assert_eq!(UploadedFile::new("noext", vec![]).extension(), "");
    }

    #[tokio::test]
    async fn test_csv_import_with_row_errors_commits_valid_rows() {
        let (_dir, mut conn, catalog) = setup();
        let csv = b"ID,Name,Age\n2,Grace,85\n3,Linus,abc\n4,,30\n5,Ken,79.9\n";
        let req = request("people.csv", csv, &[("id", "ID"), ("name", "Name"), ("age", "Age")]);

        let outcome = import(&mut conn, &catalog, &req, &ImportConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.imported_count, 2);
        assert_eq!(outcome.row_errors.len(), 2);
        assert_eq!(outcome.row_errors[0].row_index, 1);
        assert_eq!(
            outcome.row_errors[0].messages,
            vec!["Column 'age': Value must be numeric".to_string()]
        );
        assert_eq!(outcome.row_errors[1].row_index, 2);
        assert_eq!(count(&mut conn).await, 3);

        let ken = conn
            .query("SELECT age FROM people WHERE id = ?", &[Value::Int(5)])
            .await
            .unwrap();
        assert_eq!(ken.scalar(), Some(&Value::Int(79)));
    }

    #[tokio::test]
    async fn test_validate_data_rolls_back_everything() {
        let (_dir, mut conn, catalog) = setup();
        let csv = b"ID,Name,Age\n2,Grace,85\n3,Linus,abc\n";
        let mut req = request("people.csv", csv, &[("id", "ID"), ("name", "Name"), ("age", "Age")]);
        req.options.validate_data = true;

        let err = import(&mut conn, &catalog, &req, &ImportConfig::default())
            .await
            .unwrap_err();

        match err {
            ExplorerError::ValidationFailed(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].row_index, 1);
            }
            other => panic!("expected ValidationFailed, got {:?}", other),
        }
        assert_eq!(count(&mut conn).await, 1);
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_rows() {
        let (_dir, mut conn, catalog) = setup();
        let json = br#"[{"id": 1, "name": "Ada Lovelace"}, {"id": 2, "name": "Grace"}, {"id": 2, "name": "Grace Hopper"}]"#;
        let mut req = request("people.json", json, &[("id", "id"), ("name", "name")]);
        req.options.update_existing = true;
        req.options.update_key = Some("id".to_string());

        let outcome = import(&mut conn, &catalog, &req, &ImportConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.imported_count, 3);
        assert_eq!(count(&mut conn).await, 2);
        let names = conn
            .query("SELECT name FROM people ORDER BY id", &[])
            .await
            .unwrap();
        assert_eq!(
            names.rows,
            vec![
                vec![Value::from("Ada Lovelace")],
                vec![Value::from("Grace Hopper")]
            ]
        );
    }

    #[tokio::test]
    async fn test_small_batches_import_same_count() {
        let (_dir, mut conn, catalog) = setup();
        let mut csv = String::from("id,name\n");
        for id in 10..35 {
            csv.push_str(&format!("{},person {}\n", id, id));
        }
        let req = request("people.csv", csv.as_bytes(), &[("id", "id"), ("name", "name")]);
        let config = ImportConfig {
            batch_size: 4,
            ..ImportConfig::default()
        };

        let outcome = import(&mut conn, &catalog, &req, &config).await.unwrap();

        assert_eq!(outcome.imported_count, 25);
        assert_eq!(count(&mut conn).await, 26);
    }

    #[tokio::test]
    async fn test_rejections_before_any_write() {
        let (_dir, mut conn, catalog) = setup();
        let config = ImportConfig::default();

        let req = request("people.pdf", b"x", &[("id", "id")]);
        assert!(matches!(
            import(&mut conn, &catalog, &req, &config).await,
            Err(ExplorerError::UnsupportedFileFormat(_))
        ));

        let req = request("people.csv", b"id\n9\n", &[("nope", "id")]);
        assert!(matches!(
            import(&mut conn, &catalog, &req, &config).await,
            Err(ExplorerError::ColumnMismatch { .. })
        ));

        let mut req = request("people.csv", b"id\n9\n", &[("id", "id")]);
        req.table = "jobs".to_string();
        assert!(matches!(
            import(&mut conn, &catalog, &req, &config).await,
            Err(ExplorerError::TableNotFound(_))
        ));

        let req = request("people.csv", b"id\n9\n", &[("id", "id")]);
        let tiny = ImportConfig {
            max_file_size: 2,
            ..ImportConfig::default()
        };
        assert!(matches!(
            import(&mut conn, &catalog, &req, &tiny).await,
            Err(ExplorerError::InvalidRequest(_))
        ));

        assert_eq!(count(&mut conn).await, 1);
    }
}
