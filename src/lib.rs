//! db-record Library
//!
//! A single-row data-access layer: a [`RecordAccessor`] loads and stores named
//! fields of one record (one table, one static predicate) over a connection it
//! acquires from a shared, refcounted [`ConnectionPool`] (SQLite, PostgreSQL, MySQL).

pub mod accessor;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;

pub use accessor::RecordAccessor;
pub use config::Config;
pub use db::{ConnectionHandle, ConnectionPool, PoolKey};
pub use error::{DbError, DbResult};
pub use models::{AccessorConfig, DataSource, DriverKind, FieldValue, Predicate, Record};
pub use report::{ErrorReport, ErrorReporter, Severity, TracingReporter};
