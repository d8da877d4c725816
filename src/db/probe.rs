//! Table reachability by probing.
//!
//! Neither backend is asked for its catalogue. A table is probed with the
//! smallest possible select and the classified outcome decides its status.

use std::fmt;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::db::adapter::DatabaseAdapter;
use crate::db::models::{Columns, QueryFilter, QueryOptions};
use crate::db::{DbError, ErrorKind};

/// Tables the dashboard needs before it can serve requests.
pub const REQUIRED_TABLES: &[&str] = &["users", "drivers", "vehicles", "trips", "fraud_alerts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Accessible,
    Missing,
    PermissionDenied,
    Unknown,
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableStatus::Accessible => "accessible",
            TableStatus::Missing => "missing",
            TableStatus::PermissionDenied => "permission_denied",
            TableStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl From<&DbError> for TableStatus {
    fn from(err: &DbError) -> Self {
        match err.kind() {
            ErrorKind::RelationMissing => TableStatus::Missing,
            ErrorKind::PermissionDenied => TableStatus::PermissionDenied,
            _ => TableStatus::Unknown,
        }
    }
}

/// One probed table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub status: TableStatus,
    /// Classified failure message, absent when accessible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Status of every probed table, in probe order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadinessReport {
    pub tables: Vec<TableReport>,
}

impl ReadinessReport {
    fn with_status(&self, status: TableStatus) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.table.as_str())
            .collect()
    }

    pub fn missing(&self) -> Vec<&str> {
        self.with_status(TableStatus::Missing)
    }

    pub fn denied(&self) -> Vec<&str> {
        self.with_status(TableStatus::PermissionDenied)
    }

    pub fn unknown(&self) -> Vec<&str> {
        self.with_status(TableStatus::Unknown)
    }

    pub fn is_ready(&self) -> bool {
        self.tables
            .iter()
            .all(|t| t.status == TableStatus::Accessible)
    }
}

pub struct SchemaProbe {
    adapter: DatabaseAdapter,
}

impl SchemaProbe {
    pub fn new(adapter: DatabaseAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &DatabaseAdapter {
        &self.adapter
    }

    pub async fn table_status(&self, table: &str) -> TableStatus {
        self.probe(table).await.status
    }

    #[instrument(skip(self))]
    async fn probe(&self, table: &str) -> TableReport {
        let result = self
            .adapter
            .select(
                table,
                &Columns::list(["id"]),
                &QueryFilter::new(),
                &QueryOptions::new().limit(1),
            )
            .await;

        let (status, detail) = match result {
            Ok(_) => (TableStatus::Accessible, None),
            Err(err) => (TableStatus::from(&err), Some(err.message().to_string())),
        };
        debug!(%status, "probed table");

        TableReport {
            table: table.to_string(),
            status,
            detail,
        }
    }

    /// Probe each table in turn. Every table is probed even after a failure.
    pub async fn readiness_report(&self, tables: &[&str]) -> ReadinessReport {
        let mut report = ReadinessReport::default();
        for table in tables {
            report.tables.push(self.probe(table).await);
        }
        report
    }
}
