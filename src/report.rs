//! Error reporting hook.
//!
//! Every hard failure raised by a [`RecordAccessor`](crate::RecordAccessor) is
//! handed to an [`ErrorReporter`] before it is returned to the caller. The
//! reporter only observes: deciding whether to abort is left to the caller.

use serde::Serialize;
use tracing::{error, warn};

/// How bad a reported failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Fatal,
    NonFatal,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::NonFatal => write!(f, "non-fatal"),
        }
    }
}

/// Symbolic error kind carried by a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    MissingParameters,
    ConnectionFailed,
    SyntaxError,
    ExecutionError,
    NotConnected,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MissingParameters => "MissingParameters",
            Self::ConnectionFailed => "ConnectionFailed",
            Self::SyntaxError => "SyntaxError",
            Self::ExecutionError => "ExecutionError",
            Self::NotConnected => "NotConnected",
        };
        f.write_str(name)
    }
}

/// Structured failure message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub detail: String,
}

/// Receives structured failure reports synchronously.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, report: &ErrorReport);
}

/// Default reporter: fatal reports at error level, the rest at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, report: &ErrorReport) {
        match report.severity {
            Severity::Fatal => error!(
                kind = %report.kind,
                detail = %report.detail,
                "Fatal database error"
            ),
            Severity::NonFatal => warn!(
                kind = %report.kind,
                detail = %report.detail,
                "Database error"
            ),
        }
    }
}
