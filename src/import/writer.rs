// ABOUTME: Writes imported rows to the target table with bound parameters
// ABOUTME: Handles multi-row batch inserts, key lookups and in-place updates

use crate::db::{query_count, Connection, Dialect, Value};
use anyhow::{Context, Result};

/// SQL Server rejects more than 1000 row constructors in one VALUES list
const SQLSERVER_MAX_VALUES_ROWS: usize = 1000;

/// Rows that fit in one INSERT statement for a given column count
pub fn rows_per_statement(dialect: Dialect, column_count: usize) -> usize {
    let by_params = (dialect.max_bind_params() / column_count.max(1)).max(1);
    match dialect {
        Dialect::SqlServer => by_params.min(SQLSERVER_MAX_VALUES_ROWS),
        _ => by_params,
    }
}

/// Build `INSERT INTO t (a, b) VALUES (?, ?), (?, ?)` for `row_count` rows
pub fn insert_sql(dialect: Dialect, table: &str, columns: &[String], row_count: usize) -> String {
    let column_list = columns
        .iter()
        .map(|c| dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    let mut param = 0;
    let tuples = (0..row_count)
        .map(|_| {
            let placeholders = columns
                .iter()
                .map(|_| {
                    param += 1;
                    dialect.placeholder(param)
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", placeholders)
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        dialect.quote_ident(table),
        column_list,
        tuples
    )
}

/// Insert rows that share one column list
///
/// Rows are split into as many statements as the dialect's bind-parameter
/// ceiling requires.
pub async fn insert_batch(
    conn: &mut dyn Connection,
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let dialect = conn.dialect();
    let chunk_size = rows_per_statement(dialect, columns.len());
    let mut inserted = 0u64;

    for chunk in rows.chunks(chunk_size) {
        let sql = insert_sql(dialect, table, columns, chunk.len());
        let params: Vec<Value> = chunk.iter().flatten().cloned().collect();

        inserted += conn
            .execute(&sql, &params)
            .await
            .with_context(|| format!("Failed to insert {} row(s) into '{}'", chunk.len(), table))?;
    }

    tracing::debug!("Flushed {} row(s) into '{}'", rows.len(), table);

    Ok(inserted)
}

/// True when a row with `key_column = key` already exists
pub async fn row_exists(
    conn: &mut dyn Connection,
    table: &str,
    key_column: &str,
    key: &Value,
) -> Result<bool> {
    let dialect = conn.dialect();
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = {}",
        dialect.quote_ident(table),
        dialect.quote_ident(key_column),
        dialect.placeholder(1)
    );

    let count = query_count(conn, &sql, std::slice::from_ref(key))
        .await
        .with_context(|| format!("Failed to look up existing row in '{}'", table))?;

    Ok(count > 0)
}

/// Update the rows matching `key_column = key` with `data`
///
/// The key column itself is not rewritten.
pub async fn update_row(
    conn: &mut dyn Connection,
    table: &str,
    key_column: &str,
    key: &Value,
    data: &[(String, Value)],
) -> Result<u64> {
    let dialect = conn.dialect();
    let assignments: Vec<&(String, Value)> =
        data.iter().filter(|(column, _)| column != key_column).collect();

    if assignments.is_empty() {
        return Ok(0);
    }

    let set_list = assignments
        .iter()
        .enumerate()
        .map(|(idx, (column, _))| {
            format!("{} = {}", dialect.quote_ident(column), dialect.placeholder(idx + 1))
        })
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        dialect.quote_ident(table),
        set_list,
        dialect.quote_ident(key_column),
        dialect.placeholder(assignments.len() + 1)
    );

    let mut params: Vec<Value> = assignments.iter().map(|(_, value)| value.clone()).collect();
    params.push(key.clone());

    conn.execute(&sql, &params)
        .await
        .with_context(|| format!("Failed to update row in '{}'", table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["id".to_string(), "name".to_string()]
    }

    #[test]
    fn test_insert_sql_numbers_placeholders_across_rows() {
        assert_eq!(
            insert_sql(Dialect::Postgres, "users", &columns(), 2),
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(
            insert_sql(Dialect::SqlServer, "users", &columns(), 1),
            "INSERT INTO [users] ([id], [name]) VALUES (@P1, @P2)"
        );
        assert_eq!(
            insert_sql(Dialect::MySql, "users", &columns(), 2),
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?), (?, ?)"
        );
    }

    #[test]
    fn test_rows_per_statement_respects_limits() {
        assert_eq!(rows_per_statement(Dialect::SqlServer, 2), 1000);
        assert_eq!(rows_per_statement(Dialect::SqlServer, 10), 200);
        assert_eq!(rows_per_statement(Dialect::Postgres, 5), 13_107);
        assert_eq!(rows_per_statement(Dialect::Sqlite, 100_000), 1);
    }
}
