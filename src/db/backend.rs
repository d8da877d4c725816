//! Backend strategy trait.
//!
//! One implementation per storage backend, chosen once when the
//! [`ConnectionManager`](crate::db::ConnectionManager) is built. Backends
//! receive predicates already rendered for them and report failures as
//! [`RawError`]; classification happens in the adapter.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::config::ClientType;
use crate::db::classify::RawError;
use crate::db::filter::BackendPredicate;
use crate::db::models::{Columns, QueryOptions, Row};

/// Rows returned by a backend select, with the total when it was requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRows {
    pub rows: Vec<Row>,
    pub total: Option<u64>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    fn client_type(&self) -> ClientType;

    /// Cheapest possible round trip.
    async fn ping(&self) -> Result<(), RawError>;

    async fn count(&self, table: &str) -> Result<u64, RawError>;

    async fn select(
        &self,
        table: &str,
        columns: &Columns,
        predicate: &BackendPredicate,
        options: &QueryOptions,
    ) -> Result<FetchedRows, RawError>;

    /// Insert all rows or none. Returns the inserted rows as stored.
    async fn insert(&self, table: &str, rows: &[Row]) -> Result<Vec<Row>, RawError>;

    /// Returns the number of deleted rows.
    async fn delete(&self, table: &str, predicate: &BackendPredicate) -> Result<u64, RawError>;

    /// Release pooled connections. Safe to call more than once.
    async fn close(&self);
}

/// Error for a predicate rendered for the other backend.
pub(crate) fn predicate_mismatch(expected: ClientType) -> RawError {
    RawError::new(format!("predicate was not rendered for the {expected} backend"))
}
