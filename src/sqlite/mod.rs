// ABOUTME: SQLite connection for browsing, exporting and importing table data
// ABOUTME: Provides secure file path validation and the Connection implementation

pub mod converter;
pub mod reader;

pub use reader::SqliteIntrospector;

use crate::db::{Connection, Dialect, QueryResult, Value};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Validate a SQLite file path to prevent path traversal attacks
///
/// Security checks:
/// - Canonicalizes path to resolve symlinks and relative paths
/// - Verifies file exists and is a regular file (not directory)
/// - Checks file extension is .db, .sqlite, or .sqlite3
///
/// # Examples
///
/// ```no_run
/// # use data_explorer::sqlite::validate_sqlite_path;
/// assert!(validate_sqlite_path("database.db").is_ok());
/// assert!(validate_sqlite_path("../../../etc/passwd").is_err());
/// ```
pub fn validate_sqlite_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        bail!("SQLite file path cannot be empty");
    }

    let path_buf = PathBuf::from(path);

    // Canonicalize also validates that the file exists
    let canonical = path_buf.canonicalize().with_context(|| {
        format!(
            "Failed to resolve SQLite file path '{}'. \
             File may not exist or may not be readable.",
            path
        )
    })?;

    if !canonical.is_file() {
        bail!("Path '{}' is not a regular file (may be a directory)", path);
    }

    match canonical.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ["db", "sqlite", "sqlite3"].contains(&ext) => {}
        Some(ext) => bail!(
            "Invalid SQLite file extension '{}'. \
             Must be .db, .sqlite, or .sqlite3",
            ext
        ),
        None => bail!(
            "SQLite file '{}' has no extension. \
             Must be .db, .sqlite, or .sqlite3",
            path
        ),
    }

    tracing::debug!("Validated SQLite path: {}", canonical.display());

    Ok(canonical)
}

/// Strip an optional `sqlite://` or `sqlite:` prefix from a database URL
pub fn database_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open an existing SQLite database file for reading and writing
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use data_explorer::sqlite::SqliteConnection;
    /// # fn example() -> anyhow::Result<()> {
    /// let conn = SqliteConnection::open("sqlite://data/app.db")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(url: &str) -> Result<Self> {
        let canonical = validate_sqlite_path(database_path(url))?;

        tracing::info!("Opening SQLite database: {}", canonical.display());

        let conn = rusqlite::Connection::open_with_flags(
            &canonical,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open SQLite database: {}", canonical.display()))?;

        // Verify we can query the database
        let _version: String = conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .context("Failed to query SQLite version (database may be corrupted)")?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare statement: {}", sql))?;

        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let decl_types: Vec<Option<String>> = stmt
            .columns()
            .iter()
            .map(|c| c.decl_type().map(str::to_string))
            .collect();

        let mut rows = stmt
            .query(rusqlite::params_from_iter(params.iter().map(converter::to_sqlite_value)))
            .context("Failed to execute query")?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().context("Failed to read row")? {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, decl_type) in decl_types.iter().enumerate() {
                let raw = row
                    .get_ref(idx)
                    .with_context(|| format!("Failed to read column '{}'", columns[idx]))?;
                values.push(converter::from_sqlite_value(raw, decl_type.as_deref()));
            }
            result.push(values);
        }

        tracing::debug!("SQLite query returned {} rows", result.len());

        Ok(QueryResult {
            columns,
            rows: result,
        })
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let affected = self
            .conn
            .execute(
                sql,
                rusqlite::params_from_iter(params.iter().map(converter::to_sqlite_value)),
            )
            .with_context(|| format!("Failed to execute statement: {}", sql))?;
        Ok(affected as u64)
    }

    async fn begin(&mut self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN")
            .context("Failed to begin SQLite transaction")
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .context("Failed to commit SQLite transaction")
    }

    async fn rollback(&mut self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .context("Failed to roll back SQLite transaction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn create_test_db() -> (tempfile::TempDir, PathBuf) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, active BOOLEAN);
             INSERT INTO users VALUES (1, 'Alice', 1), (2, 'Bob', 0);",
        )
        .unwrap();
        (temp_dir, db_path)
    }

    #[test]
    fn test_validate_empty_path() {
        let result = validate_sqlite_path("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_validate_nonexistent_file() {
        assert!(validate_sqlite_path("/nonexistent/database.db").is_err());
    }

    #[test]
    fn test_validate_wrong_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wrong_ext_path = temp_dir.path().join("test_file.txt");
        File::create(&wrong_ext_path).unwrap();

        let result = validate_sqlite_path(wrong_ext_path.to_str().unwrap());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid SQLite file extension"));
    }

    #[test]
    fn test_path_traversal_prevention() {
        for attempt in ["../../../etc/passwd", "../../..", "/etc/shadow"] {
            assert!(
                validate_sqlite_path(attempt).is_err(),
                "Path traversal attempt '{}' should be rejected",
                attempt
            );
        }
    }

    #[test]
    fn test_database_path_strips_scheme() {
        assert_eq!(database_path("sqlite://data/app.db"), "data/app.db");
        assert_eq!(database_path("sqlite:app.db"), "app.db");
        assert_eq!(database_path("/tmp/app.db"), "/tmp/app.db");
    }

    #[tokio::test]
    async fn test_query_with_bound_parameters() {
        let (_temp_dir, db_path) = create_test_db();
        let mut conn = SqliteConnection::open(db_path.to_str().unwrap()).unwrap();

        let result = conn
            .query(
                "SELECT id, name, active FROM users WHERE name = ?",
                &[Value::from("Alice")],
            )
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["id", "name", "active"]);
        assert_eq!(
            result.rows,
            vec![vec![Value::Int(1), Value::from("Alice"), Value::Bool(true)]]
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let (_temp_dir, db_path) = create_test_db();
        let mut conn = SqliteConnection::open(db_path.to_str().unwrap()).unwrap();

        conn.begin().await.unwrap();
        conn.execute(
            "INSERT INTO users (id, name) VALUES (?, ?)",
            &[Value::Int(3), Value::from("Charlie")],
        )
        .await
        .unwrap();
        conn.rollback().await.unwrap();

        let count = crate::db::query_count(&mut conn, "SELECT COUNT(*) FROM users", &[])
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
