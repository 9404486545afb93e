//! Shared connection registry.
//!
//! A [`ConnectionPool`] maps (datasource identifier, username) to at most one
//! open [`ConnectionHandle`] and the number of accessors sharing it. Each
//! handle wraps a database-specific sqlx pool capped at one physical
//! connection, so concurrent users of a shared handle queue on it.
//!
//! # Concurrency Safety
//!
//! - Every key has its own async mutex, held across connect and close, so two
//!   acquirers never both open a connection and a close never interleaves
//!   with an acquire of the same key
//! - The key map is guarded by a synchronous mutex that is never held across
//!   an await point
//! - Release saturates at zero; extra release calls are logged and ignored

use crate::error::{DbError, DbResult};
use crate::models::{DataSource, DriverKind, PoolKey};
use serde::Serialize;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::pool::PoolOptions;
use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{MySqlPool, PgPool, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Database-specific connection pool (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    SQLite(SqlitePool),
}

impl DbPool {
    /// Close the connection pool.
    pub async fn close(&self) {
        impl_db_dispatch!(self, {
            MySql(pool) => pool.close().await,
            Postgres(pool) => pool.close().await,
            SQLite(pool) => pool.close().await,
        })
    }

    pub fn is_closed(&self) -> bool {
        impl_db_dispatch!(self, {
            MySql(pool) => pool.is_closed(),
            Postgres(pool) => pool.is_closed(),
            SQLite(pool) => pool.is_closed(),
        })
    }

    /// Get the driver for this pool.
    pub fn driver(&self) -> DriverKind {
        match self {
            DbPool::MySql(_) => DriverKind::MySql,
            DbPool::Postgres(_) => DriverKind::Postgres,
            DbPool::SQLite(_) => DriverKind::Sqlite,
        }
    }
}

/// One physical database connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: Uuid,
    datasource_id: String,
    pool: DbPool,
}

impl ConnectionHandle {
    /// Open a connection to the given data source.
    pub async fn open(source: &DataSource) -> DbResult<Self> {
        let datasource_id = source.id();
        let url = source.connection_url()?;

        info!(
            datasource = %datasource_id,
            username = %source.username,
            url = %source.masked_connection_url(),
            "Connecting to database"
        );

        let pool = match source.kind {
            DriverKind::MySql => {
                let options = MySqlConnectOptions::from_str(&url)
                    .map_err(|e| invalid_options(source, &e))?
                    .charset("utf8mb4");
                let pool = single_connection::<sqlx::MySql>()
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(source, &e))?;
                DbPool::MySql(pool)
            }
            DriverKind::Postgres => {
                let options =
                    PgConnectOptions::from_str(&url).map_err(|e| invalid_options(source, &e))?;
                let pool = single_connection::<sqlx::Postgres>()
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(source, &e))?;
                DbPool::Postgres(pool)
            }
            DriverKind::Sqlite => {
                let options =
                    SqliteConnectOptions::from_str(&url).map_err(|e| invalid_options(source, &e))?;
                let pool = single_connection::<sqlx::Sqlite>()
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(source, &e))?;
                DbPool::SQLite(pool)
            }
        };

        let handle = Self {
            id: Uuid::new_v4(),
            datasource_id,
            pool,
        };
        info!(
            datasource = %handle.datasource_id,
            handle_id = %handle.id,
            "Connected successfully"
        );
        Ok(handle)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn datasource_id(&self) -> &str {
        &self.datasource_id
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn driver(&self) -> DriverKind {
        self.pool.driver()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Disconnect. Waits for an in-flight statement to hand its connection back.
    pub async fn close(&self) {
        self.pool.close().await;
        debug!(
            datasource = %self.datasource_id,
            handle_id = %self.id,
            "Connection closed"
        );
    }
}

/// Pool settings for a single long-lived physical connection.
fn single_connection<DB: sqlx::Database>() -> PoolOptions<DB> {
    PoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
}

fn invalid_options(source: &DataSource, error: &sqlx::Error) -> DbError {
    DbError::connection_failed(
        source.id(),
        format!("Invalid {} connection options: {}", source.kind, error),
        "Check the host, database and driver options",
    )
}

fn connect_error(source: &DataSource, error: &sqlx::Error) -> DbError {
    DbError::connection_failed(
        source.id(),
        format!("Failed to connect: {}", error),
        connection_suggestion(source.kind, error),
    )
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(kind: DriverKind, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", kind);
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the username and password".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL options or try disabling them".to_string();
    }

    match kind.default_port() {
        Some(port) => format!("Verify the host (host:{}) and database name", port),
        None => "Verify the database file exists and is accessible, or pass the option mode=rwc"
            .to_string(),
    }
}

#[derive(Debug, Default)]
struct PoolEntry {
    handle: Option<Arc<ConnectionHandle>>,
    refcount: usize,
}

/// Shared connection state returned by [`ConnectionPool::summaries`] (no secrets exposed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolEntrySummary {
    pub datasource_id: String,
    pub username: String,
    pub refcount: usize,
    pub open: bool,
}

/// Registry of shared connections keyed by (datasource, username).
#[derive(Debug, Default)]
pub struct ConnectionPool {
    entries: Mutex<HashMap<PoolKey, Arc<AsyncMutex<PoolEntry>>>>,
}

impl ConnectionPool {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the slot for a key. Slots are never removed.
    fn slot(&self, key: &PoolKey) -> Arc<AsyncMutex<PoolEntry>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    fn existing_slot(&self, key: &PoolKey) -> Option<Arc<AsyncMutex<PoolEntry>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(Arc::clone)
    }

    fn all_slots(&self) -> Vec<(PoolKey, Arc<AsyncMutex<PoolEntry>>)> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
            .collect()
    }

    /// Get the shared connection for a data source, opening it on first use.
    ///
    /// A failed connect leaves the refcount untouched.
    pub async fn acquire(&self, source: &DataSource) -> DbResult<Arc<ConnectionHandle>> {
        let key = source.key();
        let slot = self.slot(&key);
        let mut entry = slot.lock().await;

        if let Some(handle) = entry.handle.clone() {
            entry.refcount += 1;
            debug!(
                datasource = %key.datasource_id,
                username = %key.username,
                refcount = entry.refcount,
                handle_id = %handle.id(),
                "Reusing shared connection"
            );
            return Ok(handle);
        }

        let handle = Arc::new(ConnectionHandle::open(source).await?);
        entry.handle = Some(Arc::clone(&handle));
        entry.refcount = 1;
        debug!(
            datasource = %key.datasource_id,
            username = %key.username,
            handle_id = %handle.id(),
            "Registered shared connection"
        );
        Ok(handle)
    }

    /// Open a dedicated connection that is never registered.
    pub async fn acquire_private(&self, source: &DataSource) -> DbResult<Arc<ConnectionHandle>> {
        let handle = ConnectionHandle::open(source).await?;
        debug!(
            datasource = %handle.datasource_id(),
            handle_id = %handle.id(),
            "Opened private connection"
        );
        Ok(Arc::new(handle))
    }

    /// Drop one reference to a shared connection, closing it with the last one.
    ///
    /// `handle` is the connection the caller leased. A release for a handle
    /// that is no longer the key's current connection (closed by
    /// [`close_all`](Self::close_all) or already replaced) is logged and ignored.
    pub async fn release(&self, key: &PoolKey, handle: &Arc<ConnectionHandle>) {
        let Some(slot) = self.existing_slot(key) else {
            warn!(
                datasource = %key.datasource_id,
                username = %key.username,
                "Release of unknown shared connection ignored"
            );
            return;
        };

        let mut entry = slot.lock().await;
        let is_current = entry
            .handle
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, handle));
        if !is_current {
            warn!(
                datasource = %key.datasource_id,
                username = %key.username,
                handle_id = %handle.id(),
                "Release of stale shared connection ignored"
            );
            return;
        }

        if entry.refcount == 0 {
            warn!(
                datasource = %key.datasource_id,
                username = %key.username,
                "Refcount underflow detected - extra release call"
            );
            return;
        }

        entry.refcount -= 1;
        if entry.refcount > 0 {
            debug!(
                datasource = %key.datasource_id,
                username = %key.username,
                refcount = entry.refcount,
                "Released shared connection"
            );
            return;
        }

        // Close while holding the slot so a concurrent acquire opens a fresh one
        if let Some(handle) = entry.handle.take() {
            handle.close().await;
            info!(
                datasource = %key.datasource_id,
                username = %key.username,
                handle_id = %handle.id(),
                "Closed shared connection"
            );
        }
    }

    /// Close a private connection.
    pub async fn release_private(&self, handle: Arc<ConnectionHandle>) {
        handle.close().await;
        info!(
            datasource = %handle.datasource_id(),
            handle_id = %handle.id(),
            "Closed private connection"
        );
    }

    /// Current refcount for a key (0 for unknown keys).
    pub async fn refcount(&self, key: &PoolKey) -> usize {
        let Some(slot) = self.existing_slot(key) else {
            return 0;
        };
        let entry = slot.lock().await;
        entry.refcount
    }

    /// The open shared handle for a key, if any.
    pub async fn handle(&self, key: &PoolKey) -> Option<Arc<ConnectionHandle>> {
        let slot = self.existing_slot(key)?;
        let entry = slot.lock().await;
        entry.handle.clone()
    }

    /// Number of keys with an open shared connection.
    pub async fn open_count(&self) -> usize {
        let mut count = 0;
        for (_, slot) in self.all_slots() {
            if slot.lock().await.handle.is_some() {
                count += 1;
            }
        }
        count
    }

    /// List every registered key with its state, sorted by key.
    pub async fn summaries(&self) -> Vec<PoolEntrySummary> {
        let mut slots = self.all_slots();
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let mut summaries = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            let entry = slot.lock().await;
            summaries.push(PoolEntrySummary {
                datasource_id: key.datasource_id,
                username: key.username,
                refcount: entry.refcount,
                open: entry.handle.is_some(),
            });
        }
        summaries
    }

    /// Close every shared connection and reset refcounts.
    ///
    /// Accessors still holding a lease will see their later release ignored,
    /// even after the key has been acquired again.
    pub async fn close_all(&self) {
        for (key, slot) in self.all_slots() {
            let mut entry = slot.lock().await;
            if let Some(handle) = entry.handle.take() {
                info!(
                    datasource = %key.datasource_id,
                    username = %key.username,
                    refcount = entry.refcount,
                    "Closing shared connection"
                );
                handle.close().await;
            }
            entry.refcount = 0;
        }
        info!("All shared connections closed");
    }
}
