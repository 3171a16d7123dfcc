// ABOUTME: Schema catalog listing tables, columns and row counts for any dialect
// ABOUTME: Hides infrastructure tables and isolates per-table introspection failures

pub mod types;

pub use types::SemanticType;

use crate::config::DatabaseConfig;
use crate::db::{self, Connection, Dialect, Value};
use crate::error::ExplorerError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Session, cache, queue and migration bookkeeping tables that are never exposed
pub const EXCLUDED_TABLES: &[&str] = &[
    "password_resets",
    "failed_jobs",
    "personal_access_tokens",
    "cache",
    "sessions",
    "migrations",
    "job_batches",
    "jobs",
    "cache_locks",
    "password_reset_tokens",
];

pub fn is_excluded(table: &str) -> bool {
    EXCLUDED_TABLES
        .iter()
        .any(|excluded| excluded.eq_ignore_ascii_case(table))
}

/// Column metadata as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub native_type: String,
    pub nullable: bool,
}

impl ColumnInfo {
    /// Build from an information-schema `(name, type, is_nullable)` row
    pub fn from_information_schema(row: Vec<Value>) -> Self {
        let mut cells = row.into_iter();
        let name = cells.next().unwrap_or(Value::Null).to_string();
        let native_type = cells.next().unwrap_or(Value::Null).to_string();
        let nullable = cells
            .next()
            .map(|v| v.to_string().eq_ignore_ascii_case("YES"))
            .unwrap_or(true);

        Self {
            name,
            native_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    pub description: String,
}

impl From<&ColumnInfo> for ColumnDescriptor {
    fn from(info: &ColumnInfo) -> Self {
        let semantic_type = SemanticType::from_native(&info.native_type);
        Self {
            name: info.name.clone(),
            description: semantic_type.description(),
            semantic_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub row_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Dialect-specific table and column enumeration
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Base tables visible to the connection, system tables excluded
    async fn list_table_names(&self, conn: &mut dyn Connection) -> Result<Vec<String>>;

    /// Columns of `table` in ordinal order
    async fn list_columns(&self, conn: &mut dyn Connection, table: &str)
        -> Result<Vec<ColumnInfo>>;
}

/// Pick the introspector for the configured dialect
pub fn introspector_for(
    config: &DatabaseConfig,
) -> Result<Box<dyn SchemaIntrospector>, ExplorerError> {
    let introspector: Box<dyn SchemaIntrospector> = match config.resolve_dialect()? {
        Dialect::Sqlite => Box::new(crate::sqlite::SqliteIntrospector),
        Dialect::MySql => Box::new(crate::mysql::MySqlIntrospector),
        Dialect::Postgres => Box::new(crate::postgres::PostgresIntrospector::new(
            config.postgres_schema(),
        )),
        Dialect::SqlServer => Box::new(crate::mssql::MssqlIntrospector),
    };
    Ok(introspector)
}

pub struct Catalog {
    introspector: Box<dyn SchemaIntrospector>,
}

impl Catalog {
    pub fn new(introspector: Box<dyn SchemaIntrospector>) -> Self {
        Self { introspector }
    }

    pub fn for_config(config: &DatabaseConfig) -> Result<Self, ExplorerError> {
        Ok(Self::new(introspector_for(config)?))
    }

    /// List every exposed table with its columns and row count
    ///
    /// A table whose columns or count cannot be read is still listed, with
    /// the failure attached to its `error` field.
    pub async fn list_tables(
        &self,
        conn: &mut dyn Connection,
    ) -> Result<Vec<TableDescriptor>, ExplorerError> {
        let names = self
            .introspector
            .list_table_names(conn)
            .await
            .context("Failed to list tables")?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names.into_iter().filter(|name| !is_excluded(name)) {
            match self.describe(conn, &name).await {
                Ok(table) => tables.push(table),
                Err(e) => {
                    tracing::warn!("Failed to describe table '{}': {:#}", name, e);
                    tables.push(TableDescriptor {
                        name,
                        columns: Vec::new(),
                        row_count: 0,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::info!("Catalog lists {} table(s)", tables.len());

        Ok(tables)
    }

    /// Columns of an exposed table, or `TableNotFound`
    pub async fn table_columns(
        &self,
        conn: &mut dyn Connection,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, ExplorerError> {
        if table.trim().is_empty() || is_excluded(table) {
            return Err(ExplorerError::TableNotFound(table.to_string()));
        }

        let names = self
            .introspector
            .list_table_names(conn)
            .await
            .context("Failed to list tables")?;
        if !names.iter().any(|name| name == table) {
            return Err(ExplorerError::TableNotFound(table.to_string()));
        }

        let columns = self
            .introspector
            .list_columns(conn, table)
            .await
            .with_context(|| format!("Failed to list columns of '{}'", table))?;
        Ok(columns)
    }

    async fn describe(&self, conn: &mut dyn Connection, table: &str) -> Result<TableDescriptor> {
        let columns = self.introspector.list_columns(conn, table).await?;
        let row_count = count_rows(conn, table).await?;

        Ok(TableDescriptor {
            name: table.to_string(),
            columns: columns.iter().map(ColumnDescriptor::from).collect(),
            row_count,
            error: None,
        })
    }
}

/// Plain `COUNT(*)` over a table
pub async fn count_rows(conn: &mut dyn Connection, table: &str) -> Result<u64> {
    let sql = format!("SELECT COUNT(*) FROM {}", conn.dialect().quote_ident(table));
    db::query_count(conn, &sql, &[])
        .await
        .with_context(|| format!("Failed to count rows in table '{}'", table))
}
