//! Error types for db-record.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Hard failures carry the datasource or the offending SQL so a reporter can log
//! something actionable; no-op conditions (missing table or predicate) are never errors.

use crate::report::{ErrorKind, ErrorReport, Severity};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Missing parameters: {}", missing.join(", "))]
    MissingParameters { missing: Vec<&'static str> },

    #[error("Connection to {datasource} failed: {message}")]
    ConnectionFailed {
        datasource: String,
        message: String,
        suggestion: String,
    },

    #[error("Syntax error: {message} (sql: {sql})")]
    SyntaxError { sql: String, message: String },

    #[error("Execution error: {message} (sql: {sql})")]
    ExecutionError { sql: String, message: String },

    #[error("Not connected: connection to {datasource} was already released")]
    NotConnected { datasource: String },
}

impl DbError {
    /// Create a missing parameters error listing every absent field.
    pub fn missing_parameters(missing: Vec<&'static str>) -> Self {
        Self::MissingParameters { missing }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection_failed(
        datasource: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::ConnectionFailed {
            datasource: datasource.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a syntax error for a statement that failed to prepare.
    pub fn syntax(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SyntaxError {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create an execution error for a prepared statement that failed to run.
    pub fn execution(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExecutionError {
            sql: sql.into(),
            message: message.into(),
        }
    }

    pub fn not_connected(datasource: impl Into<String>) -> Self {
        Self::NotConnected {
            datasource: datasource.into(),
        }
    }

    /// Symbolic kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingParameters { .. } => ErrorKind::MissingParameters,
            Self::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Self::SyntaxError { .. } => ErrorKind::SyntaxError,
            Self::ExecutionError { .. } => ErrorKind::ExecutionError,
            Self::NotConnected { .. } => ErrorKind::NotConnected,
        }
    }

    /// Missing configuration and failed connects leave the accessor unusable.
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingParameters { .. } | Self::ConnectionFailed { .. } => Severity::Fatal,
            _ => Severity::NonFatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ConnectionFailed { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// The SQL text that triggered this error, for statement failures.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::SyntaxError { sql, .. } | Self::ExecutionError { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// Build the structured message handed to an [`ErrorReporter`](crate::ErrorReporter).
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            severity: self.severity(),
            kind: self.kind(),
            detail: self.to_string(),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
