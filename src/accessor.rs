//! Single-row record accessor.
//!
//! A [`RecordAccessor`] is bound to one table and one static predicate. It
//! loads and stores named fields of the row the predicate selects, over a
//! connection leased from a [`ConnectionPool`] (shared) or opened for it alone
//! (private).
//!
//! Hard failures are handed to the accessor's [`ErrorReporter`] and then
//! returned. Missing table or predicate makes `load`/`store` a silent no-op.

use crate::db::executor::{self, ExecutedStatement};
use crate::db::pool::{ConnectionHandle, ConnectionPool};
use crate::db::{quote, statement};
use crate::error::{DbError, DbResult};
use crate::models::{AccessorConfig, DataSource, FieldValue, PoolKey, Record};
use crate::report::{ErrorReporter, TracingReporter};
use std::sync::Arc;
use tracing::{debug, warn};

/// The connection an accessor currently holds.
#[derive(Debug)]
enum Lease {
    Shared {
        key: PoolKey,
        handle: Arc<ConnectionHandle>,
    },
    Private(Arc<ConnectionHandle>),
}

impl Lease {
    fn handle(&self) -> &Arc<ConnectionHandle> {
        match self {
            Self::Shared { handle, .. } | Self::Private(handle) => handle,
        }
    }
}

pub struct RecordAccessor {
    config: AccessorConfig,
    source: DataSource,
    pool: Arc<ConnectionPool>,
    reporter: Arc<dyn ErrorReporter>,
    lease: Option<Lease>,
}

impl std::fmt::Debug for RecordAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordAccessor")
            .field("source", &self.source)
            .field("table", &self.config.table)
            .field("predicate", &self.config.predicate)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

impl RecordAccessor {
    /// Validate the configuration and acquire a connection, reporting
    /// failures through a [`TracingReporter`].
    pub async fn new(config: AccessorConfig, pool: Arc<ConnectionPool>) -> DbResult<Self> {
        Self::with_reporter(config, pool, Arc::new(TracingReporter)).await
    }

    /// Validate the configuration and acquire a connection.
    ///
    /// Missing driver, database or host fails with
    /// [`DbError::MissingParameters`] before any connection attempt. A failed
    /// connect leaves no shared refcount behind.
    pub async fn with_reporter(
        config: AccessorConfig,
        pool: Arc<ConnectionPool>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> DbResult<Self> {
        let source = match config.validate() {
            Ok(source) => source,
            Err(e) => {
                reporter.report(&e.report());
                return Err(e);
            }
        };

        let acquired = if config.share_connection {
            pool.acquire(&source).await.map(|handle| Lease::Shared {
                key: source.key(),
                handle,
            })
        } else {
            pool.acquire_private(&source).await.map(Lease::Private)
        };

        let lease = match acquired {
            Ok(lease) => lease,
            Err(e) => {
                reporter.report(&e.report());
                return Err(e);
            }
        };

        debug!(
            datasource = %source.id(),
            username = %source.username,
            shared = config.share_connection,
            handle_id = %lease.handle().id(),
            "Record accessor connected"
        );

        Ok(Self {
            config,
            source,
            pool,
            reporter,
            lease: Some(lease),
        })
    }

    /// `driver:database@host`
    pub fn datasource_id(&self) -> String {
        self.source.id()
    }

    pub fn config(&self) -> &AccessorConfig {
        &self.config
    }

    pub fn data_source(&self) -> &DataSource {
        &self.source
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.lease, Some(Lease::Shared { .. }))
    }

    /// Whether the accessor still holds its connection.
    pub fn is_connected(&self) -> bool {
        self.lease.is_some()
    }

    /// The held connection handle, `None` after release.
    pub fn connection(&self) -> Option<&Arc<ConnectionHandle>> {
        self.lease.as_ref().map(Lease::handle)
    }

    /// Quote a value as a literal for this accessor's driver.
    pub fn quote(&self, value: &FieldValue) -> String {
        quote::quote(value, self.source.kind)
    }

    /// The predicate as a WHERE clause body, `None` when there is no predicate.
    pub fn make_where_statement(&self) -> Option<String> {
        statement::where_clause(&self.config.predicate, self.source.kind)
    }

    /// Prepare and execute `sql` on the held connection.
    pub async fn do_sql(&self, sql: &str) -> DbResult<ExecutedStatement> {
        let Some(lease) = &self.lease else {
            return Err(self.fail(DbError::not_connected(self.source.id())));
        };
        executor::do_sql(lease.handle(), sql)
            .await
            .map_err(|e| self.fail(e))
    }

    /// Load `fields` of the selected row.
    ///
    /// Returns an empty record when the table, predicate or field list is
    /// empty (without touching the connection) or when no row matches.
    /// With several matching rows the first one wins.
    pub async fn load<S: AsRef<str>>(&self, fields: &[S]) -> DbResult<Record> {
        let (Some(table), Some(where_clause)) = (self.config.table(), self.make_where_statement())
        else {
            debug!(datasource = %self.source.id(), "Load skipped: no table or predicate");
            return Ok(Record::new());
        };
        if fields.is_empty() {
            return Ok(Record::new());
        }

        let sql = statement::select_statement(fields, table, &where_clause);
        let result = self.do_sql(&sql).await?;
        if result.row_count() > 1 {
            debug!(
                table = %table,
                rows = result.row_count(),
                "Predicate matched several rows, using the first"
            );
        }
        Ok(result.into_first_row().unwrap_or_default())
    }

    /// Update the selected row with `assignments`.
    ///
    /// Returns `Ok(false)` without touching the connection when the table,
    /// predicate or assignment list is empty. Otherwise returns `Ok(true)`
    /// once the UPDATE executes, even if it matched no row.
    pub async fn store<I, K, V>(&self, assignments: I) -> DbResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        let (Some(table), Some(where_clause)) = (self.config.table(), self.make_where_statement())
        else {
            debug!(datasource = %self.source.id(), "Store skipped: no table or predicate");
            return Ok(false);
        };
        let assignments: Vec<(String, FieldValue)> = assignments
            .into_iter()
            .map(|(field, value)| (field.into(), value.into()))
            .collect();
        if assignments.is_empty() {
            return Ok(false);
        }

        let sql =
            statement::update_statement(table, &assignments, self.source.kind, &where_clause);
        let result = self.do_sql(&sql).await?;
        debug!(
            table = %table,
            rows_affected = result.rows_affected,
            "Stored record fields"
        );
        Ok(true)
    }

    /// Give the connection back: shared leases are released to the pool,
    /// private ones are closed. Further calls do nothing.
    pub async fn release_connection(&mut self) {
        match self.lease.take() {
            Some(Lease::Shared { key, handle }) => self.pool.release(&key, &handle).await,
            Some(Lease::Private(handle)) => self.pool.release_private(handle).await,
            None => {}
        }
    }

    fn fail(&self, error: DbError) -> DbError {
        self.reporter.report(&error.report());
        error
    }
}

impl Drop for RecordAccessor {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };

        let datasource = self.source.id();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                datasource = %datasource,
                "Record accessor dropped outside a runtime - connection not released"
            );
            return;
        };

        // Spawn a task to handle async release
        let pool = Arc::clone(&self.pool);
        runtime.spawn(async move {
            match lease {
                Lease::Shared { key, handle } => pool.release(&key, &handle).await,
                Lease::Private(handle) => pool.release_private(handle).await,
            }
            warn!(
                datasource = %datasource,
                "Connection released via Drop - consider using explicit release_connection()"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ErrorKind, ErrorReport, Severity};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collecting(Mutex<Vec<ErrorReport>>);

    impl ErrorReporter for Collecting {
        fn report(&self, report: &ErrorReport) {
            self.0.lock().unwrap().push(report.clone());
        }
    }

    fn memory_config() -> AccessorConfig {
        AccessorConfig::new("sqlite", "localhost", ":memory:")
    }

    #[tokio::test]
    async fn test_missing_database_reported_before_connecting() {
        let pool = Arc::new(ConnectionPool::new());
        let reporter = Arc::new(Collecting::default());
        let config = AccessorConfig {
            driver: Some("mysql".into()),
            host: Some("unreachable.invalid".into()),
            ..AccessorConfig::default()
        };

        let err = RecordAccessor::with_reporter(config, pool.clone(), reporter.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::MissingParameters { .. }));
        let reports = reporter.0.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ErrorKind::MissingParameters);
        assert_eq!(reports[0].severity, Severity::Fatal);
        assert!(pool.summaries().await.is_empty());
    }

    #[tokio::test]
    async fn test_where_statement_and_quote() {
        let pool = Arc::new(ConnectionPool::new());
        let config = memory_config()
            .with_table("users")
            .with_predicate("id", 5)
            .with_predicate("active", true);
        let mut accessor = RecordAccessor::new(config, pool).await.unwrap();

        assert_eq!(
            accessor.make_where_statement().as_deref(),
            Some("id=5 AND active='1'")
        );
        assert_eq!(accessor.quote(&FieldValue::from("")), "''");
        assert_eq!(accessor.quote(&FieldValue::from("O'Brien")), "'O''Brien'");
        assert_eq!(accessor.datasource_id(), "sqlite::memory:@localhost");
        accessor.release_connection().await;
    }

    #[tokio::test]
    async fn test_do_sql_after_release_is_not_connected() {
        let pool = Arc::new(ConnectionPool::new());
        let reporter = Arc::new(Collecting::default());
        let mut accessor = RecordAccessor::with_reporter(memory_config(), pool, reporter.clone())
            .await
            .unwrap();
        accessor.release_connection().await;
        assert!(!accessor.is_connected());

        let err = accessor.do_sql("SELECT 1").await.unwrap_err();
        assert!(matches!(err, DbError::NotConnected { .. }));
        assert_eq!(reporter.0.lock().unwrap()[0].severity, Severity::NonFatal);
    }

    #[tokio::test]
    async fn test_no_op_without_predicate() {
        let pool = Arc::new(ConnectionPool::new());
        let mut accessor = RecordAccessor::new(memory_config().with_table("users"), pool)
            .await
            .unwrap();

        // No table exists, so touching the connection would fail
        assert!(accessor.load(&["name"]).await.unwrap().is_empty());
        assert!(!accessor.store([("name", "Bob")]).await.unwrap());
        accessor.release_connection().await;
    }
}
