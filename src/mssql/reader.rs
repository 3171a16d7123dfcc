// ABOUTME: SQL Server schema introspection for the catalog
// ABOUTME: Reads base tables and column data types from INFORMATION_SCHEMA

use crate::catalog::{ColumnInfo, SchemaIntrospector};
use crate::db::{Connection, Value};
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Lists the connecting user's default schema, the one unqualified names resolve to
pub struct MssqlIntrospector;

const LIST_TABLES_SQL: &str = r#"
    SELECT TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_TYPE = 'BASE TABLE'
    AND TABLE_CATALOG = DB_NAME()
    AND TABLE_SCHEMA = SCHEMA_NAME()
    ORDER BY TABLE_NAME
"#;

const LIST_COLUMNS_SQL: &str = r#"
    SELECT COLUMN_NAME, DATA_TYPE, IS_NULLABLE
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_NAME = @P1
    AND TABLE_SCHEMA = SCHEMA_NAME()
    ORDER BY ORDINAL_POSITION
"#;

#[async_trait]
impl SchemaIntrospector for MssqlIntrospector {
    async fn list_table_names(&self, conn: &mut dyn Connection) -> Result<Vec<String>> {
        tracing::debug!("Listing tables from SQL Server database");

        let result = conn
            .query(LIST_TABLES_SQL, &[])
            .await
            .context("Failed to list tables from SQL Server database")?;

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
            .with_context(|| format!("Failed to read columns of SQL Server table '{}'", table))?;

        Ok(result
            .rows
            .into_iter()
            .map(ColumnInfo::from_information_schema)
            .collect())
    }
}
