//! Normalized database error types.
//!
//! Every failure that leaves the adapter is one of these variants, whichever
//! backend produced it. Callers branch on [`DbError::kind`], never on raw
//! backend codes. Uses miette for diagnostic output and thiserror for derives.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;

/// Error taxonomy shared by all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFilter,
    RelationMissing,
    PermissionDenied,
    ConnectionFailed,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidFilter => "invalid_filter",
            ErrorKind::RelationMissing => "relation_missing",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Database operation errors.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("Invalid filter: {message}")]
    #[diagnostic(
        code(fraudwatch::db::invalid_filter),
        help("This is a caller bug: check operators, operand shapes and delete scoping")
    )]
    InvalidFilter { message: String },

    #[error("Relation missing: {message}")]
    #[diagnostic(
        code(fraudwatch::db::relation_missing),
        help("Run `fwdb migrate` or create the table in the remote project")
    )]
    RelationMissing {
        message: String,
        raw_code: Option<String>,
    },

    #[error("Permission denied: {message}")]
    #[diagnostic(
        code(fraudwatch::db::permission_denied),
        help("Check the API key role or row level security policies")
    )]
    PermissionDenied {
        message: String,
        raw_code: Option<String>,
    },

    #[error("Connection failed: {message}")]
    #[diagnostic(code(fraudwatch::db::connection_failed))]
    ConnectionFailed {
        message: String,
        raw_code: Option<String>,
    },

    #[error("Database error: {message}")]
    #[diagnostic(code(fraudwatch::db::unknown))]
    Unknown {
        message: String,
        raw_code: Option<String>,
    },
}

impl DbError {
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        DbError::InvalidFilter {
            message: message.into(),
        }
    }

    /// Build an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>, raw_code: Option<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidFilter => DbError::InvalidFilter { message },
            ErrorKind::RelationMissing => DbError::RelationMissing { message, raw_code },
            ErrorKind::PermissionDenied => DbError::PermissionDenied { message, raw_code },
            ErrorKind::ConnectionFailed => DbError::ConnectionFailed { message, raw_code },
            ErrorKind::Unknown => DbError::Unknown { message, raw_code },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::InvalidFilter { .. } => ErrorKind::InvalidFilter,
            DbError::RelationMissing { .. } => ErrorKind::RelationMissing,
            DbError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            DbError::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            DbError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DbError::InvalidFilter { message }
            | DbError::RelationMissing { message, .. }
            | DbError::PermissionDenied { message, .. }
            | DbError::ConnectionFailed { message, .. }
            | DbError::Unknown { message, .. } => message,
        }
    }

    /// The backend-native code this error was classified from, if any.
    pub fn raw_code(&self) -> Option<&str> {
        match self {
            DbError::InvalidFilter { .. } => None,
            DbError::RelationMissing { raw_code, .. }
            | DbError::PermissionDenied { raw_code, .. }
            | DbError::ConnectionFailed { raw_code, .. }
            | DbError::Unknown { raw_code, .. } => raw_code.as_deref(),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Failure to build a [`ConnectionManager`](crate::db::ConnectionManager).
///
/// Settings problems stay configuration errors; only failures to reach or
/// open the backend are classified.
#[derive(Error, Diagnostic, Debug)]
pub enum ConnectError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),
}
