// ABOUTME: PostgreSQL connection for browsing, exporting and importing table data
// ABOUTME: Prepares every statement so parameters bind with the server-inferred types

pub mod connection;
pub mod converter;
pub mod reader;

pub use reader::PostgresIntrospector;

use crate::db::{Connection, Dialect, QueryResult, Value};
use anyhow::{Context, Result};
use async_trait::async_trait;
use converter::PgParam;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Statement};

pub struct PostgresConnection {
    client: Client,
}

/// Statement scoping unqualified table names to `schema`
pub fn search_path_sql(schema: &str) -> String {
    format!("SET search_path TO {}", Dialect::Postgres.quote_ident(schema))
}

impl PostgresConnection {
    /// Connect and resolve unqualified table names in `schema`, the schema the catalog lists
    pub async fn connect(url: &str, schema: &str) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL database (schema '{}')", schema);
        let client = connection::connect(url).await?;
        client
            .batch_execute(&search_path_sql(schema))
            .await
            .with_context(|| format!("Failed to select PostgreSQL schema '{}'", schema))?;
        Ok(Self { client })
    }

    async fn prepare(&self, sql: &str, params: &[Value]) -> Result<(Statement, Vec<PgParam>)> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .with_context(|| format!("Failed to prepare statement: {}", sql))?;

        let param_types = statement.params();
        if param_types.len() != params.len() {
            anyhow::bail!(
                "Statement expects {} parameter(s) but {} were supplied",
                param_types.len(),
                params.len()
            );
        }

        let pg_params = params
            .iter()
            .zip(param_types)
            .map(|(value, ty)| PgParam::for_type(value, ty))
            .collect();

        Ok((statement, pg_params))
    }
}

fn as_refs(params: &[PgParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Connection for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let (statement, pg_params) = self.prepare(sql, params).await?;

        let pg_rows = self
            .client
            .query(&statement, &as_refs(&pg_params))
            .await
            .with_context(|| format!("Failed to execute query: {}", sql))?;

        // Column names come from the statement so empty results still carry them
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut rows = Vec::with_capacity(pg_rows.len());
        for row in &pg_rows {
            let values = (0..columns.len())
                .map(|idx| converter::from_pg_row(row, idx))
                .collect::<Result<Vec<_>>>()?;
            rows.push(values);
        }

        tracing::debug!("PostgreSQL query returned {} rows", rows.len());

        Ok(QueryResult { columns, rows })
    }

    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let (statement, pg_params) = self.prepare(sql, params).await?;
        self.client
            .execute(&statement, &as_refs(&pg_params))
            .await
            .with_context(|| format!("Failed to execute statement: {}", sql))
    }

    async fn begin(&mut self) -> Result<()> {
        self.client
            .batch_execute("BEGIN")
            .await
            .context("Failed to begin PostgreSQL transaction")
    }

    async fn commit(&mut self) -> Result<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .context("Failed to commit PostgreSQL transaction")
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .context("Failed to roll back PostgreSQL transaction")
    }
}
