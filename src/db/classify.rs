//! Backend failure classification.
//!
//! Backends report failures as [`RawError`] and this module is the only
//! place that looks at backend-native codes or message text. Everything it
//! does not recognise becomes `Unknown` with the original message intact.

use serde::Deserialize;

use crate::config::ClientType;
use crate::db::{DbError, ErrorKind};

/// A failure exactly as a backend reported it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawError {
    /// Backend-native code: a SQLite result code, Postgres SQLSTATE or
    /// PostgREST `PGRST` code.
    pub code: Option<String>,
    pub message: String,
    /// HTTP status for REST responses.
    pub status: Option<u16>,
    /// The request never got a usable answer (refused, reset, timed out).
    pub transport: bool,
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

impl RawError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transport: true,
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Build from a non-success REST response.
    pub fn from_rest_response(status: u16, body: &str) -> Self {
        let parsed: Option<RestErrorBody> = serde_json::from_str(body).ok();
        let (code, message) = match parsed {
            Some(body) => {
                let mut message = body.message.unwrap_or_default();
                for extra in [body.details, body.hint].into_iter().flatten() {
                    if !extra.is_empty() {
                        message.push_str(" | ");
                        message.push_str(&extra);
                    }
                }
                (body.code, message)
            }
            None => (None, body.trim().to_string()),
        };

        Self {
            code,
            message: if message.is_empty() {
                format!("HTTP {status}")
            } else {
                message
            },
            status: Some(status),
            transport: false,
        }
    }
}

impl From<sqlx::Error> for RawError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => RawError {
                code: db.code().map(|c| c.into_owned()),
                message: db.message().to_string(),
                status: None,
                transport: false,
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => RawError::transport(e.to_string()),
            _ => RawError::new(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for RawError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_request() {
            RawError::transport(e.to_string())
        } else {
            RawError {
                code: None,
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
                transport: false,
            }
        }
    }
}

/// Map a raw backend failure onto the normalized taxonomy.
pub fn classify(raw: &RawError, client: ClientType) -> DbError {
    let kind = if raw.transport {
        ErrorKind::ConnectionFailed
    } else {
        let by_code = match client {
            ClientType::Local => classify_sqlite_code(raw.code.as_deref()),
            ClientType::Supabase => classify_rest(raw.code.as_deref(), raw.status),
        };
        by_code.unwrap_or_else(|| classify_message(&raw.message))
    };

    DbError::new(kind, raw.message.clone(), raw.code.clone())
}

/// SQLite reports extended result codes; the primary code is the low byte.
fn classify_sqlite_code(code: Option<&str>) -> Option<ErrorKind> {
    let primary = code?.parse::<i64>().ok()? & 0xff;
    match primary {
        // SQLITE_PERM, SQLITE_READONLY, SQLITE_AUTH
        3 | 8 | 23 => Some(ErrorKind::PermissionDenied),
        // SQLITE_CANTOPEN, SQLITE_NOTADB
        14 | 26 => Some(ErrorKind::ConnectionFailed),
        _ => None,
    }
}

fn classify_rest(code: Option<&str>, status: Option<u16>) -> Option<ErrorKind> {
    if let Some(code) = code {
        let kind = match code {
            "42P01" | "PGRST205" => Some(ErrorKind::RelationMissing),
            "42501" | "PGRST301" | "PGRST302" => Some(ErrorKind::PermissionDenied),
            "PGRST000" | "PGRST001" | "PGRST002" | "08000" | "08001" | "08003" | "08006"
            | "57P01" => Some(ErrorKind::ConnectionFailed),
            "PGRST100" => Some(ErrorKind::InvalidFilter),
            // Unknown column: the relation exists, so never let the
            // "does not exist" message fallback call it missing.
            "42703" | "PGRST204" => Some(ErrorKind::Unknown),
            _ => None,
        };
        if kind.is_some() {
            return kind;
        }
    }

    match status? {
        401 | 403 => Some(ErrorKind::PermissionDenied),
        502..=504 => Some(ErrorKind::ConnectionFailed),
        _ => None,
    }
}

fn classify_message(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    if message.contains("no such table")
        || (message.contains("relation") && message.contains("does not exist"))
        || (message.contains("could not find the table") && message.contains("schema cache"))
    {
        ErrorKind::RelationMissing
    } else if message.contains("permission denied")
        || message.contains("not authorized")
        || message.contains("readonly database")
    {
        ErrorKind::PermissionDenied
    } else if message.contains("unable to open database")
        || message.contains("connection refused")
        || message.contains("timed out")
    {
        ErrorKind::ConnectionFailed
    } else {
        ErrorKind::Unknown
    }
}
