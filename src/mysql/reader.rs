// ABOUTME: MySQL schema introspection for the catalog
// ABOUTME: Reads base tables and column types from INFORMATION_SCHEMA of the current database

use crate::catalog::{ColumnInfo, SchemaIntrospector};
use crate::db::{Connection, Value};
use anyhow::{Context, Result};
use async_trait::async_trait;

pub struct MySqlIntrospector;

const LIST_TABLES_SQL: &str = r#"
    SELECT TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = DATABASE()
    AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

/// COLUMN_TYPE keeps display widths, so `tinyint(1)` is still recognisable as boolean
const LIST_COLUMNS_SQL: &str = r#"
    SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE()
    AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

#[async_trait]
impl SchemaIntrospector for MySqlIntrospector {
    async fn list_table_names(&self, conn: &mut dyn Connection) -> Result<Vec<String>> {
        tracing::debug!("Listing tables from MySQL database");

        let result = conn
            .query(LIST_TABLES_SQL, &[])
            .await
            .context("Failed to list tables from MySQL database")?;

        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|name| name.to_string())
            .collect())
    }

    async fn list_columns(
        &self,
        conn: &mut dyn Connection,
        table: &str,
    ) -> Result<Vec<ColumnInfo>> {
        let result = conn
            .query(LIST_COLUMNS_SQL, &[Value::from(table)])
            .await
            .with_context(|| format!("Failed to read columns of MySQL table '{}'", table))?;

        Ok(result
            .rows
            .into_iter()
            .map(ColumnInfo::from_information_schema)
            .collect())
    }
}
