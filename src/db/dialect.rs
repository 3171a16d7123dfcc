// ABOUTME: SQL dialect tags and the per-engine syntax rules the query builders need
// ABOUTME: Covers identifier quoting, placeholders and bind-parameter ceilings

use crate::error::ExplorerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    MySql,
    Postgres,
    SqlServer,
}

impl Dialect {
    /// Resolve a configuration tag such as `pgsql` or `sqlsrv`
    pub fn from_tag(tag: &str) -> Result<Self, ExplorerError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "pgsql" | "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlsrv" | "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            other => Err(ExplorerError::UnsupportedDialect(other.to_string())),
        }
    }

    /// Guess the dialect from a connection URL when no tag is configured
    ///
    /// ```
    /// # use data_explorer::db::Dialect;
    /// assert_eq!(Dialect::infer_from_url("mysql://localhost/app"), Some(Dialect::MySql));
    /// assert_eq!(Dialect::infer_from_url("data/app.sqlite3"), Some(Dialect::Sqlite));
    /// assert_eq!(Dialect::infer_from_url("redis://localhost"), None);
    /// ```
    pub fn infer_from_url(url: &str) -> Option<Self> {
        let lower = url.trim().to_ascii_lowercase();
        if lower.starts_with("postgres://")
            || lower.starts_with("postgresql://")
            || lower.starts_with("pgsql://")
        {
            Some(Dialect::Postgres)
        } else if lower.starts_with("mysql://") {
            Some(Dialect::MySql)
        } else if lower.starts_with("mssql://")
            || lower.starts_with("sqlserver://")
            || lower.starts_with("sqlsrv://")
        {
            Some(Dialect::SqlServer)
        } else if lower.starts_with("sqlite:")
            || lower == ":memory:"
            || [".db", ".sqlite", ".sqlite3"]
                .iter()
                .any(|ext| lower.ends_with(ext))
        {
            Some(Dialect::Sqlite)
        } else {
            None
        }
    }

    /// Quote an identifier, doubling any embedded quote character
    pub fn quote_ident(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::SqlServer => format!("[{}]", name.replace(']', "]]")),
            Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Placeholder for the `index`-th bound parameter (1-based)
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Sqlite | Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", index),
            Dialect::SqlServer => format!("@P{}", index),
        }
    }

    /// Maximum bound parameters accepted in one statement
    pub fn max_bind_params(&self) -> usize {
        match self {
            Dialect::Sqlite => 32_766,
            Dialect::MySql => 65_535,
            Dialect::Postgres => 65_535,
            // SQL Server allows 2100, a few are reserved by sp_executesql
            Dialect::SqlServer => 2_000,
        }
    }

    /// Left-hand side of a LIKE comparison
    ///
    /// PostgreSQL has no implicit cast from numbers or dates to text, so the
    /// column is cast explicitly.
    pub fn like_operand(&self, quoted_column: &str) -> String {
        match self {
            Dialect::Postgres => format!("CAST({} AS TEXT)", quoted_column),
            _ => quoted_column.to_string(),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::Postgres => "pgsql",
            Dialect::SqlServer => "sqlsrv",
        };
        f.write_str(name)
    }
}
