//! Database orchestration: migrations, fixture loading and setup checks.
//!
//! These run on top of the adapter layer. Only fixture clearing reaches
//! past the adapter, straight to the local pool.

mod error;
pub mod fixtures;


use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sqlx::migrate::Migrator;
use tracing::{info, instrument};

use crate::config::ClientType;
use crate::db::{
    ConnectionManager, DatabaseAdapter, DbError, ErrorKind, REQUIRED_TABLES, RawError,
    ReadinessReport, Row, SchemaProbe, classify,
};

pub use error::{SetupError, SetupResult};

/// Schema migrations embedded at compile time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Migrations applied by one `migrate` run. Empty means nothing was pending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub applied: Vec<AppliedMigration>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: i64,
    pub description: String,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Rows loaded per table, in load order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub tables: Vec<(String, u64)>,
}

impl SeedReport {
    pub fn total(&self) -> u64 {
        self.tables.iter().map(|(_, n)| n).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "client", rename_all = "lowercase")]
pub enum SetupOutcome {
    Local {
        migrations: MigrationReport,
        seed: SeedReport,
    },
    Supabase {
        readiness: ReadinessReport,
    },
}

fn local_pool(conn: &ConnectionManager) -> SetupResult<&sqlx::SqlitePool> {
    conn.local_pool().ok_or_else(|| {
        SetupError::Database(DbError::new(
            ErrorKind::ConnectionFailed,
            "local database pool is not available",
            None,
        ))
    })
}

fn sql_error(e: sqlx::Error) -> SetupError {
    SetupError::Database(classify(&RawError::from(e), ClientType::Local))
}

async fn applied_versions(pool: &sqlx::SqlitePool) -> SetupResult<HashSet<i64>> {
    let versions: Result<Vec<i64>, sqlx::Error> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await;

    match versions {
        Ok(versions) => Ok(versions.into_iter().collect()),
        // first run: the bookkeeping table does not exist yet
        Err(e) => {
            let err = classify(&RawError::from(e), ClientType::Local);
            if err.kind() == ErrorKind::RelationMissing {
                Ok(HashSet::new())
            } else {
                Err(err.into())
            }
        }
    }
}

/// Apply pending migrations.
///
/// The remote schema is managed by the hosting project, so on that backend
/// this is a no-op.
#[instrument(skip(conn), fields(client = %conn.client_type()))]
pub async fn migrate(conn: &ConnectionManager) -> SetupResult<MigrationReport> {
    if conn.client_type() == ClientType::Supabase {
        info!("remote schema is externally managed; nothing to migrate");
        return Ok(MigrationReport::default());
    }

    let pool = local_pool(conn)?;
    let before = applied_versions(pool).await?;
    MIGRATOR.run(pool).await?;

    let applied: Vec<AppliedMigration> = MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration() && !before.contains(&m.version))
        .map(|m| AppliedMigration {
            version: m.version,
            description: m.description.to_string(),
        })
        .collect();

    if applied.is_empty() {
        info!("database schema is up to date");
    } else {
        for m in &applied {
            info!(version = m.version, description = %m.description, "applied migration");
        }
    }

    Ok(MigrationReport { applied })
}

/// Delete every fixture row, children first, in one transaction.
///
/// Goes straight to the pool: the adapter refuses unfiltered deletes and
/// fixture loading is the only caller that empties tables.
async fn clear_fixture_tables(pool: &sqlx::SqlitePool) -> SetupResult<()> {
    let mut tx = pool.begin().await.map_err(sql_error)?;
    for table in fixtures::FIXTURE_TABLES.iter().rev() {
        sqlx::query(&format!("DELETE FROM \"{table}\""))
            .execute(&mut *tx)
            .await
            .map_err(sql_error)?;
    }
    tx.commit().await.map_err(sql_error)?;
    Ok(())
}

async fn load(
    adapter: &DatabaseAdapter,
    report: &mut SeedReport,
    table: &str,
    rows: Vec<Row>,
) -> SetupResult<Vec<Value>> {
    let result = adapter.insert(table, &rows).await?;
    info!(table, rows = result.inserted, "loaded fixtures");
    report.tables.push((table.to_string(), result.inserted));
    Ok(result.ids)
}

/// Replace the local database contents with the demo dataset.
#[instrument(skip(conn), fields(client = %conn.client_type()))]
pub async fn seed(conn: &Arc<ConnectionManager>) -> SetupResult<SeedReport> {
    let client = conn.client_type();
    if client == ClientType::Supabase {
        return Err(SetupError::SeedUnsupported { client });
    }

    clear_fixture_tables(local_pool(conn)?).await?;

    let adapter = DatabaseAdapter::new(Arc::clone(conn));
    let mut report = SeedReport::default();

    load(&adapter, &mut report, "users", fixtures::users()).await?;
    let drivers = load(&adapter, &mut report, "drivers", fixtures::drivers()).await?;
    let vehicles = load(&adapter, &mut report, "vehicles", fixtures::vehicles(&drivers)).await?;
    let trips = load(
        &adapter,
        &mut report,
        "trips",
        fixtures::trips(&drivers, &vehicles),
    )
    .await?;
    load(
        &adapter,
        &mut report,
        "fraud_alerts",
        fixtures::fraud_alerts(&trips, &drivers),
    )
    .await?;

    info!(rows = report.total(), "seed complete");
    Ok(report)
}

/// Check connectivity, then prepare the local database or report on the
/// remote one.
#[instrument(skip(conn), fields(client = %conn.client_type()))]
pub async fn setup(conn: &Arc<ConnectionManager>) -> SetupResult<SetupOutcome> {
    let client = conn.client_type();
    if !conn.test_connection().await {
        return Err(SetupError::ConnectionCheck { client });
    }

    match client {
        ClientType::Local => {
            let migrations = migrate(conn).await?;
            let seed = seed(conn).await?;
            Ok(SetupOutcome::Local { migrations, seed })
        }
        ClientType::Supabase => {
            let probe = SchemaProbe::new(DatabaseAdapter::new(Arc::clone(conn)));
            let readiness = probe.readiness_report(REQUIRED_TABLES).await;
            info!(ready = readiness.is_ready(), "readiness report complete");
            Ok(SetupOutcome::Supabase { readiness })
        }
    }
}
