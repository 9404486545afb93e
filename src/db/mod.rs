//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Shared, refcounted connection registry
//! - Statement preparation and execution
//! - Driver-specific value quoting
//! - SELECT/UPDATE/WHERE construction
//! - Row decoding into field values
//! - Database dispatch macros for reducing code duplication

pub mod executor;
#[macro_use]
pub mod macros;
pub mod pool;
pub mod quote;
pub mod statement;
pub mod types;

pub use crate::models::PoolKey;
pub use executor::ExecutedStatement;
pub use pool::{ConnectionHandle, ConnectionPool, DbPool, PoolEntrySummary};
pub use quote::quote;
