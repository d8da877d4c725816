//! Backend-agnostic facade over the active strategy.
//!
//! Every operation validates its inputs and renders its filter before the
//! backend is touched, runs under the connection timeout, and passes any
//! backend failure through [`classify`].

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::db::classify::{RawError, classify};
use crate::db::connection::ConnectionManager;
use crate::db::filter::render;
use crate::db::models::{
    Columns, CountResult, DeleteResult, InsertResult, QueryFilter, QueryOptions, Row,
    SelectResult,
};
use crate::db::{DbError, DbResult};

#[derive(Clone)]
pub struct DatabaseAdapter {
    conn: Arc<ConnectionManager>,
}

impl DatabaseAdapter {
    pub fn new(conn: Arc<ConnectionManager>) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.conn
    }

    #[instrument(skip(self), fields(client = %self.conn.client_type()))]
    pub async fn count(&self, table: &str) -> DbResult<CountResult> {
        check_table(table)?;
        let backend = self.conn.backend()?;

        let count = self.run(backend.count(table)).await?;
        Ok(CountResult { count })
    }

    /// Rows matching `filter`. Pass `QueryOptions::default()` for no options.
    #[instrument(skip(self), fields(client = %self.conn.client_type()))]
    pub async fn select(
        &self,
        table: &str,
        columns: &Columns,
        filter: &QueryFilter,
        options: &QueryOptions,
    ) -> DbResult<SelectResult> {
        check_table(table)?;
        check_columns(columns)?;
        options.validate()?;
        let predicate = render(filter, self.conn.client_type())?;
        let backend = self.conn.backend()?;

        let fetched = self
            .run(backend.select(table, columns, &predicate, options))
            .await?;

        Ok(SelectResult {
            data: fetched.rows,
            count: fetched.total,
        })
    }

    /// Insert a batch as a unit: either every row is stored or none is.
    #[instrument(skip(self, rows), fields(client = %self.conn.client_type(), rows = rows.len()))]
    pub async fn insert(&self, table: &str, rows: &[Row]) -> DbResult<InsertResult> {
        check_table(table)?;
        check_batch(rows)?;
        let backend = self.conn.backend()?;

        let stored = self.run(backend.insert(table, rows)).await?;

        let ids = stored
            .iter()
            .filter_map(|row| row.get("id"))
            .filter(|id| !id.is_null())
            .cloned()
            .collect::<Vec<Value>>();

        Ok(InsertResult {
            inserted: stored.len() as u64,
            ids,
        })
    }

    /// Delete rows matching `filter`. An empty filter is refused.
    #[instrument(skip(self), fields(client = %self.conn.client_type()))]
    pub async fn delete(&self, table: &str, filter: &QueryFilter) -> DbResult<DeleteResult> {
        check_table(table)?;
        if filter.is_empty() {
            return Err(DbError::invalid_filter(format!(
                "refusing to delete from '{table}' without a filter"
            )));
        }
        let predicate = render(filter, self.conn.client_type())?;
        let backend = self.conn.backend()?;

        let deleted = self.run(backend.delete(table, &predicate)).await?;
        Ok(DeleteResult { deleted })
    }

    /// Await a backend call under the connection timeout and classify any
    /// failure.
    async fn run<T, F>(&self, call: F) -> DbResult<T>
    where
        F: Future<Output = Result<T, RawError>>,
    {
        let client = self.conn.client_type();
        let timeout = self.conn.timeout();

        let raw = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(raw)) => raw,
            Err(_) => RawError::transport(format!(
                "operation timed out after {}ms",
                timeout.as_millis()
            ))
            .with_code("timeout"),
        };

        let err = classify(&raw, client);
        warn!(kind = %err.kind(), raw_code = ?err.raw_code(), error = %err.message(), "database operation failed");
        Err(err)
    }
}

fn check_table(table: &str) -> DbResult<()> {
    if table.trim().is_empty() {
        return Err(DbError::invalid_filter("table name must not be empty"));
    }
    Ok(())
}

fn check_columns(columns: &Columns) -> DbResult<()> {
    match columns {
        Columns::All => Ok(()),
        Columns::List(names) if names.is_empty() => Err(DbError::invalid_filter(
            "column list must not be empty; use Columns::All for every column",
        )),
        Columns::List(names) if names.iter().any(|n| n.trim().is_empty()) => {
            Err(DbError::invalid_filter("column names must not be empty"))
        }
        Columns::List(_) => Ok(()),
    }
}

/// Rows must be non-empty and share one column set.
fn check_batch(rows: &[Row]) -> DbResult<()> {
    let Some(first) = rows.first() else {
        return Err(DbError::invalid_filter("insert requires at least one row"));
    };
    if first.is_empty() {
        return Err(DbError::invalid_filter("insert rows must have at least one column"));
    }

    let shape: BTreeSet<&str> = first.keys().map(String::as_str).collect();
    for (index, row) in rows.iter().enumerate().skip(1) {
        let keys: BTreeSet<&str> = row.keys().map(String::as_str).collect();
        if keys != shape {
            return Err(DbError::invalid_filter(format!(
                "row {index} has different columns than row 0"
            )));
        }
    }
    Ok(())
}
