//! SQLite backend: pooled connection and query execution.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use super::helpers::{
    MAX_BIND_PARAMS, push_columns, push_page, push_value, push_where, quote_ident, row_to_json,
};
use crate::config::ClientType;
use crate::db::backend::{Backend, FetchedRows, predicate_mismatch};
use crate::db::classify::RawError;
use crate::db::filter::{BackendPredicate, SqlPredicate, SqlValue};
use crate::db::models::{Columns, QueryOptions, Row};

/// SQLite implementation of [`Backend`].
///
/// The pool is safe for concurrent use, so no extra locking is needed.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Open a database from a `sqlite://` URL.
    pub async fn open(url: &str, max_connections: u32, timeout: Duration) -> Result<Self, RawError> {
        // PostgREST `like` is case-sensitive; SQLite's is not by default.
        let options = SqliteConnectOptions::from_str(url)?
            .foreign_keys(true)
            .pragma("case_sensitive_like", "ON");
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        // Every connection to an in-memory database is a separate database,
        // so keep exactly one alive for the pool's lifetime.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .acquire_timeout(timeout)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (useful for testing).
    pub async fn in_memory() -> Result<Self, RawError> {
        Self::open("sqlite::memory:", 1, Duration::from_secs(5)).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn sql_predicate(predicate: &BackendPredicate) -> Result<&SqlPredicate, RawError> {
        match predicate {
            BackendPredicate::Sql(p) => Ok(p),
            BackendPredicate::Rest(_) => Err(predicate_mismatch(ClientType::Local)),
        }
    }

    async fn count_matching(&self, table: &str, predicate: &SqlPredicate) -> Result<u64, RawError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        qb.push(quote_ident(table));
        push_where(&mut qb, predicate);

        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn client_type(&self) -> ClientType {
        ClientType::Local
    }

    async fn ping(&self) -> Result<(), RawError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64, RawError> {
        self.count_matching(table, &SqlPredicate::default()).await
    }

    async fn select(
        &self,
        table: &str,
        columns: &Columns,
        predicate: &BackendPredicate,
        options: &QueryOptions,
    ) -> Result<FetchedRows, RawError> {
        let predicate = Self::sql_predicate(predicate)?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        push_columns(&mut qb, columns);
        qb.push(" FROM ");
        qb.push(quote_ident(table));
        push_where(&mut qb, predicate);
        push_page(&mut qb, options);
        debug!(sql = qb.sql(), "sqlite select");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(row_to_json)
            .collect::<Result<Vec<_>, _>>()?;

        let total = if options.with_count {
            Some(self.count_matching(table, predicate).await?)
        } else {
            None
        };

        Ok(FetchedRows { rows, total })
    }

    async fn insert(&self, table: &str, rows: &[Row]) -> Result<Vec<Row>, RawError> {
        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Vec<&String> = first.keys().collect();
        let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let rows_per_statement = (MAX_BIND_PARAMS / columns.len().max(1)).max(1);

        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());

        for chunk in rows.chunks(rows_per_statement) {
            let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
            qb.push(quote_ident(table));
            qb.push(format!(" ({}) VALUES ", quoted.join(", ")));
            for (i, row) in chunk.iter().enumerate() {
                qb.push(if i == 0 { "(" } else { ", (" });
                for (j, column) in columns.iter().enumerate() {
                    if j > 0 {
                        qb.push(", ");
                    }
                    let value = row.get(column.as_str()).map(SqlValue::from);
                    push_value(&mut qb, &value.unwrap_or(SqlValue::Null));
                }
                qb.push(")");
            }
            qb.push(" RETURNING *");
            debug!(sql = qb.sql(), rows = chunk.len(), "sqlite insert");

            for row in qb.build().fetch_all(&mut *tx).await? {
                inserted.push(row_to_json(&row)?);
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn delete(&self, table: &str, predicate: &BackendPredicate) -> Result<u64, RawError> {
        let predicate = Self::sql_predicate(predicate)?;

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(quote_ident(table));
        push_where(&mut qb, predicate);
        debug!(sql = qb.sql(), "sqlite delete");

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
