//! Statement execution.
//!
//! Every statement goes through the same two steps on the handle's single
//! connection:
//! - prepare, mapping failures to [`DbError::SyntaxError`]
//! - execute, mapping failures to [`DbError::ExecutionError`]
//!
//! A prepare that fails because the connection is gone (closed pool, pool
//! timeout, I/O error) is an [`DbError::ExecutionError`] too.
//!
//! A prepared statement that describes result columns is fetched and its rows
//! decoded; anything else is executed for its affected-row count.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific prepare and execute
//! - `postgres`: PostgreSQL-specific prepare and execute
//! - `sqlite`: SQLite-specific prepare and execute
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::db::pool::{ConnectionHandle, DbPool};
use crate::db::types::RowToRecord;
use crate::error::{DbError, DbResult};
use crate::models::Record;
use std::time::Instant;
use tracing::debug;

/// Outcome of [`do_sql`]: the executed statement and whatever it produced.
#[derive(Debug, Clone)]
pub struct ExecutedStatement {
    pub sql: String,
    /// Empty for statements without a result set.
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub rows_affected: u64,
    pub execution_time_ms: u64,
}

impl ExecutedStatement {
    /// Number of rows returned.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The first returned row.
    pub fn fetch_row(&self) -> Option<&Record> {
        self.rows.first()
    }

    pub fn into_first_row(self) -> Option<Record> {
        self.rows.into_iter().next()
    }
}

/// Prepare and execute one statement on the handle.
pub async fn do_sql(handle: &ConnectionHandle, sql: &str) -> DbResult<ExecutedStatement> {
    let start = Instant::now();

    debug!(
        datasource = %handle.datasource_id(),
        driver = %handle.driver(),
        handle_id = %handle.id(),
        sql = %sql,
        "Executing statement"
    );

    let outcome = match handle.pool() {
        DbPool::MySql(p) => mysql::run(p, sql).await?,
        DbPool::Postgres(p) => postgres::run(p, sql).await?,
        DbPool::SQLite(p) => sqlite::run(p, sql).await?,
    };

    let statement = ExecutedStatement {
        sql: sql.to_string(),
        columns: outcome.columns,
        rows: outcome.rows,
        rows_affected: outcome.rows_affected,
        execution_time_ms: start.elapsed().as_millis() as u64,
    };

    debug!(
        rows = statement.row_count(),
        rows_affected = statement.rows_affected,
        execution_time_ms = statement.execution_time_ms,
        "Statement executed"
    );

    Ok(statement)
}

// =============================================================================
// Common Helper Functions
// =============================================================================

struct Outcome {
    columns: Vec<String>,
    rows: Vec<Record>,
    rows_affected: u64,
}

impl Outcome {
    fn affected(rows_affected: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected,
        }
    }

    fn rows<R: RowToRecord>(columns: Vec<String>, rows: &[R]) -> Self {
        Self {
            columns,
            rows: rows.iter().map(RowToRecord::to_record).collect(),
            rows_affected: 0,
        }
    }
}

fn column_names<C: sqlx::Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

fn syntax_error(sql: &str, error: sqlx::Error) -> DbError {
    DbError::syntax(sql, error.to_string())
}

fn execution_error(sql: &str, error: sqlx::Error) -> DbError {
    DbError::execution(sql, error.to_string())
}

fn prepare_error(sql: &str, error: sqlx::Error) -> DbError {
    match error {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            execution_error(sql, error)
        }
        _ => syntax_error(sql, error),
    }
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use sqlx::{Executor, MySqlPool, Statement};

    pub(super) async fn run(pool: &MySqlPool, sql: &str) -> DbResult<Outcome> {
        let statement = pool.prepare(sql).await.map_err(|e| prepare_error(sql, e))?;
        let columns = column_names(statement.columns());

        if columns.is_empty() {
            let result = statement
                .query()
                .execute(pool)
                .await
                .map_err(|e| execution_error(sql, e))?;
            return Ok(Outcome::affected(result.rows_affected()));
        }

        let rows = statement
            .query()
            .fetch_all(pool)
            .await
            .map_err(|e| execution_error(sql, e))?;
        Ok(Outcome::rows(columns, &rows))
    }
}

mod postgres {
    use super::*;
    use sqlx::{Executor, PgPool, Statement};

    pub(super) async fn run(pool: &PgPool, sql: &str) -> DbResult<Outcome> {
        let statement = pool.prepare(sql).await.map_err(|e| prepare_error(sql, e))?;
        let columns = column_names(statement.columns());

        if columns.is_empty() {
            let result = statement
                .query()
                .execute(pool)
                .await
                .map_err(|e| execution_error(sql, e))?;
            return Ok(Outcome::affected(result.rows_affected()));
        }

        let rows = statement
            .query()
            .fetch_all(pool)
            .await
            .map_err(|e| execution_error(sql, e))?;
        Ok(Outcome::rows(columns, &rows))
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Executor, SqlitePool, Statement};

    pub(super) async fn run(pool: &SqlitePool, sql: &str) -> DbResult<Outcome> {
        let statement = pool.prepare(sql).await.map_err(|e| prepare_error(sql, e))?;
        let columns = column_names(statement.columns());

        if columns.is_empty() {
            let result = statement
                .query()
                .execute(pool)
                .await
                .map_err(|e| execution_error(sql, e))?;
            return Ok(Outcome::affected(result.rows_affected()));
        }

        let rows = statement
            .query()
            .fetch_all(pool)
            .await
            .map_err(|e| execution_error(sql, e))?;
        Ok(Outcome::rows(columns, &rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessorConfig, FieldValue};

    async fn memory_handle() -> ConnectionHandle {
        let source = AccessorConfig::new("sqlite", "localhost", ":memory:")
            .validate()
            .unwrap();
        ConnectionHandle::open(&source).await.unwrap()
    }

    #[tokio::test]
    async fn test_write_statement_reports_rows_affected() {
        let handle = memory_handle().await;
        do_sql(&handle, "CREATE TABLE t (id INTEGER, name TEXT)")
            .await
            .unwrap();
        let insert = do_sql(&handle, "INSERT INTO t VALUES (1, 'a'), (2, 'b')")
            .await
            .unwrap();
        assert_eq!(insert.rows_affected, 2);
        assert_eq!(insert.row_count(), 0);
        assert!(insert.columns.is_empty());
    }

    #[tokio::test]
    async fn test_select_returns_decoded_rows() {
        let handle = memory_handle().await;
        do_sql(&handle, "CREATE TABLE t (id INTEGER, name TEXT)")
            .await
            .unwrap();
        do_sql(&handle, "INSERT INTO t VALUES (1, 'a')").await.unwrap();

        let select = do_sql(&handle, "SELECT id, name FROM t").await.unwrap();
        assert_eq!(select.columns, vec!["id", "name"]);
        assert_eq!(select.row_count(), 1);
        let row = select.fetch_row().unwrap();
        assert_eq!(row.get("id"), Some(&FieldValue::Int(1)));
        assert_eq!(row.get("name"), Some(&FieldValue::Text("a".into())));
    }

    #[tokio::test]
    async fn test_prepare_failure_is_syntax_error() {
        let handle = memory_handle().await;
        let err = do_sql(&handle, "SELEKT 1").await.unwrap_err();
        assert!(matches!(err, DbError::SyntaxError { .. }));
        assert_eq!(err.sql(), Some("SELEKT 1"));
    }

    #[tokio::test]
    async fn test_closed_connection_is_execution_error() {
        let handle = memory_handle().await;
        handle.close().await;

        let err = do_sql(&handle, "SELECT 1").await.unwrap_err();
        assert!(matches!(err, DbError::ExecutionError { .. }));
        assert!(!err.is_fatal());
        assert_eq!(err.sql(), Some("SELECT 1"));
    }

    #[tokio::test]
    async fn test_unknown_table_fails_before_execution() {
        let handle = memory_handle().await;
        // SQLite resolves tables while preparing
        let err = do_sql(&handle, "SELECT a FROM missing").await.unwrap_err();
        assert!(matches!(err, DbError::SyntaxError { .. }));
    }

    #[tokio::test]
    async fn test_constraint_violation_is_execution_error() {
        let handle = memory_handle().await;
        do_sql(&handle, "CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .await
            .unwrap();
        do_sql(&handle, "INSERT INTO t VALUES (1)").await.unwrap();
        let err = do_sql(&handle, "INSERT INTO t VALUES (1)").await.unwrap_err();
        assert!(matches!(err, DbError::ExecutionError { .. }));
    }
}
