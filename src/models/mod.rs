//! Data models for db-record.
//!
//! This module re-exports all model types used throughout the library.

pub mod connection;
pub mod record;

// Re-export commonly used types
pub use connection::{AccessorConfig, DataSource, DriverKind, PoolKey};
pub use record::{FieldValue, Predicate, Record};
