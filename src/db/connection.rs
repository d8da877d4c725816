//! Backend client lifecycle.
//!
//! [`ConnectionManager`] is the only owner of the backend handle. It is
//! built once from a [`DbConfig`], shared behind an `Arc`, and torn down
//! exactly once no matter how many times [`ConnectionManager::teardown`]
//! is called.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::{ClientType, DbConfig};
use crate::db::backend::Backend;
use crate::db::classify::classify;
use crate::db::rest::SupabaseBackend;
use crate::db::sqlite::SqliteBackend;
use crate::db::{ConnectError, DbError, DbResult};

pub struct ConnectionManager {
    client_type: ClientType,
    backend: Arc<dyn Backend>,
    /// Present only for the local backend; orchestration uses it for
    /// migrations and fixture loading.
    local_pool: Option<SqlitePool>,
    timeout: Duration,
    closed: AtomicBool,
}

impl ConnectionManager {
    /// Build the backend selected by `config.client_type`.
    pub async fn connect(config: &DbConfig) -> Result<Self, ConnectError> {
        config.validate()?;

        let client_type = config.client_type;
        let manager = match client_type {
            ClientType::Local => {
                let backend = SqliteBackend::open(
                    &config.database_url,
                    config.max_connections,
                    config.timeout,
                )
                .await
                .map_err(|raw| classify(&raw, client_type))?;
                let pool = backend.pool().clone();
                let mut manager = Self::from_backend(Arc::new(backend), config.timeout);
                manager.local_pool = Some(pool);
                manager
            }
            ClientType::Supabase => {
                // validate() guarantees both are present
                let url = config.supabase_url.as_deref().unwrap_or_default();
                let key = config.supabase_key.as_deref().unwrap_or_default();
                let backend = SupabaseBackend::new(url, key, config.timeout)
                    .map_err(|raw| classify(&raw, client_type))?;
                Self::from_backend(Arc::new(backend), config.timeout)
            }
        };

        info!(client = %client_type, "database client initialised");
        Ok(manager)
    }

    /// Wrap an already constructed backend.
    pub fn from_backend(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        Self {
            client_type: backend.client_type(),
            backend,
            local_pool: None,
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn client_type(&self) -> ClientType {
        self.client_type
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The backend handle, or `ConnectionFailed` after teardown.
    pub fn backend(&self) -> DbResult<Arc<dyn Backend>> {
        if self.is_closed() {
            return Err(DbError::ConnectionFailed {
                message: "connection manager has been torn down".to_string(),
                raw_code: None,
            });
        }
        Ok(Arc::clone(&self.backend))
    }

    /// The SQLite pool when the local backend is active.
    pub fn local_pool(&self) -> Option<&SqlitePool> {
        if self.is_closed() {
            return None;
        }
        self.local_pool.as_ref()
    }

    /// Lightweight round trip. Never errors: any failure, including a
    /// timeout, yields `false`.
    pub async fn test_connection(&self) -> bool {
        let Ok(backend) = self.backend() else {
            return false;
        };

        match tokio::time::timeout(self.timeout, backend.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(raw)) => {
                let err = classify(&raw, self.client_type);
                warn!(client = %self.client_type, kind = %err.kind(), error = %err, "connection test failed");
                false
            }
            Err(_) => {
                warn!(client = %self.client_type, timeout = ?self.timeout, "connection test timed out");
                false
            }
        }
    }

    /// Release backend resources. Idempotent.
    pub async fn teardown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.backend.close().await;
        info!(client = %self.client_type, "database client closed");
    }
}

/// Run `f` with a freshly connected manager and tear it down afterwards,
/// whether `f` succeeds or fails.
pub async fn with_connection<F, Fut, T, E>(config: &DbConfig, f: F) -> Result<T, E>
where
    F: FnOnce(Arc<ConnectionManager>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ConnectError>,
{
    let manager = Arc::new(ConnectionManager::connect(config).await?);
    let result = f(Arc::clone(&manager)).await;
    manager.teardown().await;
    result
}
