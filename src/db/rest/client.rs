use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use crate::db::classify::RawError;

/// HTTP client for a PostgREST endpoint.
pub struct RestClient {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestClient {
    /// Create a client for `{project_url}/rest/v1`.
    ///
    /// Every request carries `timeout` as its upper bound.
    pub fn new(project_url: &str, api_key: &str, timeout: Duration) -> Result<Self, RawError> {
        // reqwest is built without a default crypto provider
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| RawError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            client,
        })
    }

    /// Get the base URL being used
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// URL for a table, e.g. `{base}/drivers`.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    /// Create a GET request builder for the API root.
    pub fn root(&self) -> RequestBuilder {
        self.with_auth(self.client.get(format!("{}/", self.base_url)))
    }

    /// Create a GET request builder
    pub fn get(&self, table: &str) -> RequestBuilder {
        self.with_auth(self.client.get(self.table_url(table)))
    }

    /// Create a POST request builder
    pub fn post(&self, table: &str) -> RequestBuilder {
        self.with_auth(self.client.post(self.table_url(table)))
    }

    /// Create a DELETE request builder
    pub fn delete(&self, table: &str) -> RequestBuilder {
        self.with_auth(self.client.delete(self.table_url(table)))
    }

    /// Send a request and turn any non-success status into a [`RawError`]
    /// parsed from the PostgREST error body.
    pub async fn send(builder: RequestBuilder) -> Result<Response, RawError> {
        let response = builder.send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(RawError::from_rest_response(status, &body))
        }
    }
}

/// Total row count from a `Content-Range` header such as `0-9/42` or `*/0`.
pub fn content_range_total(response: &Response) -> Option<u64> {
    let header = response.headers().get("content-range")?.to_str().ok()?;
    parse_content_range_total(header)
}

pub fn parse_content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}
