// ABOUTME: PostgreSQL schema introspection for the catalog
// ABOUTME: Lists base tables and column types of one schema from information_schema

use crate::catalog::{ColumnInfo, SchemaIntrospector};
use crate::db::{Connection, Value};
use anyhow::{Context, Result};
use async_trait::async_trait;

pub struct PostgresIntrospector {
    schema: String,
}

impl PostgresIntrospector {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }
}

// information_schema columns are sql_identifier domains; cast so they decode as text
const LIST_TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = $1
    AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

/// `udt_name` reports `int4`, `varchar`, `timestamptz` and similar short names
const LIST_COLUMNS_SQL: &str = r#"
    SELECT column_name::text, udt_name::text, is_nullable::text
    FROM information_schema.columns
    WHERE table_schema = $1
    AND table_name = $2
    ORDER BY ordinal_position
"#;

#[async_trait]
impl SchemaIntrospector for PostgresIntrospector {
    async fn list_table_names(&self, conn: &mut dyn Connection) -> Result<Vec<String>> {
        tracing::debug!("Listing tables from PostgreSQL schema '{}'", self.schema);

        let result = conn
            .query(LIST_TABLES_SQL, &[Value::from(self.schema.as_str())])
            .await
            .with_context(|| format!("Failed to list tables in schema '{}'", self.schema))?;

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
            .query(
                LIST_COLUMNS_SQL,
                &[Value::from(self.schema.as_str()), Value::from(table)],
            )
            .await
            .with_context(|| format!("Failed to read columns of table '{}'", table))?;

        Ok(result
            .rows
            .into_iter()
            .map(ColumnInfo::from_information_schema)
            .collect())
    }
}
