//! Remote backend speaking the PostgREST dialect used by Supabase.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::client::{RestClient, content_range_total};
use crate::config::ClientType;
use crate::db::backend::{Backend, FetchedRows, predicate_mismatch};
use crate::db::classify::RawError;
use crate::db::filter::{BackendPredicate, RestPredicate};
use crate::db::models::{Columns, QueryOptions, Row, SortOrder};

/// PostgREST implementation of [`Backend`].
///
/// `reqwest::Client` is safe for concurrent use; there is nothing to lock.
pub struct SupabaseBackend {
    client: RestClient,
}

impl SupabaseBackend {
    pub fn new(project_url: &str, api_key: &str, timeout: Duration) -> Result<Self, RawError> {
        Ok(Self {
            client: RestClient::new(project_url, api_key, timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    fn rest_predicate(predicate: &BackendPredicate) -> Result<&RestPredicate, RawError> {
        match predicate {
            BackendPredicate::Rest(p) => Ok(p),
            BackendPredicate::Sql(_) => Err(predicate_mismatch(ClientType::Supabase)),
        }
    }
}

fn select_param(columns: &Columns) -> String {
    match columns {
        Columns::All => "*".to_string(),
        Columns::List(names) => names.join(","),
    }
}

fn page_params(options: &QueryOptions) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(order) = &options.order_by {
        let direction = match order.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = options.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = options.offset.filter(|o| *o > 0) {
        params.push(("offset".to_string(), offset.to_string()));
    }
    params
}

async fn json_rows(response: reqwest::Response) -> Result<Vec<Row>, RawError> {
    response
        .json::<Vec<Row>>()
        .await
        .map_err(|e| RawError::new(format!("invalid response body: {e}")))
}

#[async_trait]
impl Backend for SupabaseBackend {
    fn client_type(&self) -> ClientType {
        ClientType::Supabase
    }

    async fn ping(&self) -> Result<(), RawError> {
        RestClient::send(self.client.root()).await?;
        Ok(())
    }

    async fn count(&self, table: &str) -> Result<u64, RawError> {
        let response = RestClient::send(
            self.client
                .get(table)
                .query(&[("select", "*"), ("limit", "1")])
                .header("Prefer", "count=exact"),
        )
        .await?;

        content_range_total(&response)
            .ok_or_else(|| RawError::new("response is missing a Content-Range total"))
    }

    async fn select(
        &self,
        table: &str,
        columns: &Columns,
        predicate: &BackendPredicate,
        options: &QueryOptions,
    ) -> Result<FetchedRows, RawError> {
        let predicate = Self::rest_predicate(predicate)?;

        let mut params = vec![("select".to_string(), select_param(columns))];
        params.extend(predicate.params.iter().cloned());
        params.extend(page_params(options));
        debug!(table, ?params, "rest select");

        let mut request = self.client.get(table).query(&params);
        if options.with_count {
            request = request.header("Prefer", "count=exact");
        }
        let response = RestClient::send(request).await?;

        let total = if options.with_count {
            content_range_total(&response)
        } else {
            None
        };
        let rows = json_rows(response).await?;

        Ok(FetchedRows { rows, total })
    }

    async fn insert(&self, table: &str, rows: &[Row]) -> Result<Vec<Row>, RawError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        debug!(table, rows = rows.len(), "rest insert");

        // A bulk POST is executed by PostgREST as a single statement.
        let response = RestClient::send(
            self.client
                .post(table)
                .header("Prefer", "return=representation")
                .json(rows),
        )
        .await?;

        json_rows(response).await
    }

    async fn delete(&self, table: &str, predicate: &BackendPredicate) -> Result<u64, RawError> {
        let predicate = Self::rest_predicate(predicate)?;
        debug!(table, params = ?predicate.params, "rest delete");

        let response = RestClient::send(
            self.client
                .delete(table)
                .query(&predicate.params)
                .header("Prefer", "return=minimal,count=exact"),
        )
        .await?;

        content_range_total(&response)
            .ok_or_else(|| RawError::new("delete response is missing a Content-Range total"))
    }

    async fn close(&self) {}
}
