// ABOUTME: SQLite schema introspection for the catalog
// ABOUTME: Lists user tables from sqlite_master and columns via pragma_table_info

use crate::catalog::{ColumnInfo, SchemaIntrospector};
use crate::db::{Connection, Value};
use anyhow::{Context, Result};
use async_trait::async_trait;

pub struct SqliteIntrospector;

#[async_trait]
impl SchemaIntrospector for SqliteIntrospector {
    /// List all user tables, skipping `sqlite_*` internals
    async fn list_table_names(&self, conn: &mut dyn Connection) -> Result<Vec<String>> {
        tracing::debug!("Listing tables from SQLite database");

        let result = conn
            .query(
                "SELECT name FROM sqlite_master \
                 WHERE type='table' \
                 AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
                &[],
            )
            .await
            .context("Failed to query table list")?;

        let tables: Vec<String> = result
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .map(|name| name.to_string())
            .collect();

        tracing::debug!("Found {} user tables in SQLite database", tables.len());

        Ok(tables)
    }

    async fn list_columns(
        &self,
        conn: &mut dyn Connection,
        table: &str,
    ) -> Result<Vec<ColumnInfo>> {
        let result = conn
            .query(
                "SELECT name, type, \"notnull\" FROM pragma_table_info(?) ORDER BY cid",
                &[Value::from(table)],
            )
            .await
            .with_context(|| format!("Failed to read columns of SQLite table '{}'", table))?;

        let columns = result
            .rows
            .into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                let name = cells.next().unwrap_or(Value::Null).to_string();
                let native_type = cells.next().unwrap_or(Value::Null).to_string();
                let not_null = cells.next().and_then(|v| v.as_i64()).unwrap_or(0);
                ColumnInfo {
                    name,
                    native_type,
                    nullable: not_null == 0,
                }
            })
            .collect();

        Ok(columns)
    }
}
