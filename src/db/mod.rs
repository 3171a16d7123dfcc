// ABOUTME: Database capability used by the catalog, export and import engines
// ABOUTME: Defines the Connection trait and opens a connection for the configured dialect

pub mod dialect;
pub mod value;

pub use dialect::Dialect;
pub use value::{QueryResult, Value};

use crate::config::DatabaseConfig;
use crate::error::ExplorerError;
use anyhow::Result;
use async_trait::async_trait;

/// A live connection to one database, owned by a single export or import call
///
/// All statements take bound parameters; placeholders must follow
/// [`Dialect::placeholder`] for the connection's dialect.
#[async_trait]
pub trait Connection: Send {
    fn dialect(&self) -> Dialect;

    /// Run a statement that returns rows
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Run a statement that modifies data, returning the affected row count
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// Open a connection for the dialect named by the configuration
pub async fn connect(config: &DatabaseConfig) -> Result<Box<dyn Connection>, ExplorerError> {
    let dialect = config.resolve_dialect()?;
    tracing::debug!("Opening {} connection", dialect);

    let conn: Box<dyn Connection> = match dialect {
        Dialect::Sqlite => Box::new(crate::sqlite::SqliteConnection::open(&config.url)?),
        Dialect::MySql => Box::new(crate::mysql::MySqlConnection::connect(&config.url).await?),
        Dialect::Postgres => {
            Box::new(
                crate::postgres::PostgresConnection::connect(&config.url, config.postgres_schema())
                    .await?,
            )
        }
        Dialect::SqlServer => {
            Box::new(crate::mssql::MssqlConnection::connect(&config.url).await?)
        }
    };

    Ok(conn)
}

/// Run `COUNT(*)`-style statements and read the single integer back
pub async fn query_count(conn: &mut dyn Connection, sql: &str, params: &[Value]) -> Result<u64> {
    let result = conn.query(sql, params).await?;
    let count = result.scalar().and_then(Value::as_i64).unwrap_or(0);
    Ok(count.max(0) as u64)
}
