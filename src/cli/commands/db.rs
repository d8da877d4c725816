use std::sync::Arc;

use tabled::{Table, Tabled};

use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::{apply_table_style, truncate_with_ellipsis};
use crate::db::{
    ConnectionManager, DatabaseAdapter, REQUIRED_TABLES, ReadinessReport, SchemaProbe, TableReport,
};
use crate::setup::{MigrationReport, SeedReport, SetupOutcome};

#[derive(Tabled)]
pub(crate) struct TableStatusDisplay {
    #[tabled(rename = "Table")]
    pub(crate) table: String,
    #[tabled(rename = "Status")]
    pub(crate) status: String,
    #[tabled(rename = "Detail")]
    pub(crate) detail: String,
}

impl From<&TableReport> for TableStatusDisplay {
    fn from(report: &TableReport) -> Self {
        Self {
            table: report.table.clone(),
            status: report.status.to_string(),
            detail: report
                .detail
                .as_deref()
                .map(|d| truncate_with_ellipsis(d, 60))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Tabled)]
pub(crate) struct SeedDisplay {
    #[tabled(rename = "Table")]
    pub(crate) table: String,
    #[tabled(rename = "Rows")]
    pub(crate) rows: u64,
}

pub(crate) fn format_migrations(report: &MigrationReport) -> String {
    if report.is_noop() {
        return "No pending migrations.".to_string();
    }
    let mut output = format!("Applied {} migration(s):", report.applied.len());
    for m in &report.applied {
        output.push_str(&format!("\n  {} {}", m.version, m.description));
    }
    output
}

pub(crate) fn format_seed(report: &SeedReport) -> String {
    let rows: Vec<SeedDisplay> = report
        .tables
        .iter()
        .map(|(table, rows)| SeedDisplay {
            table: table.clone(),
            rows: *rows,
        })
        .collect();
    let mut table = Table::new(rows);
    apply_table_style(&mut table);
    format!("{table}\nSeeded {} row(s).", report.total())
}

pub(crate) fn format_readiness(report: &ReadinessReport) -> String {
    let rows: Vec<TableStatusDisplay> = report.tables.iter().map(Into::into).collect();
    let mut table = Table::new(rows);
    apply_table_style(&mut table);

    let mut output = table.to_string();
    if report.is_ready() {
        output.push_str("\nAll required tables are accessible.");
        return output;
    }
    for (label, tables) in [
        ("Missing tables", report.missing()),
        ("Permission denied", report.denied()),
        ("Unclassified failures", report.unknown()),
    ] {
        if !tables.is_empty() {
            output.push_str(&format!("\n{label}: {}", tables.join(", ")));
        }
    }
    output
}

pub async fn ping(conn: &ConnectionManager) -> CliResult<String> {
    let client = conn.client_type();
    if conn.test_connection().await {
        Ok(format!("{client} database is reachable."))
    } else {
        Err(CliError::Unreachable { client })
    }
}

pub async fn migrate(conn: &ConnectionManager) -> CliResult<String> {
    let report = crate::setup::migrate(conn).await?;
    Ok(format_migrations(&report))
}

pub async fn seed(conn: &Arc<ConnectionManager>) -> CliResult<String> {
    let report = crate::setup::seed(conn).await?;
    Ok(format_seed(&report))
}

pub async fn status(conn: &Arc<ConnectionManager>) -> CliResult<String> {
    let probe = SchemaProbe::new(DatabaseAdapter::new(Arc::clone(conn)));
    let report = probe.readiness_report(REQUIRED_TABLES).await;
    Ok(format_readiness(&report))
}

pub async fn setup(conn: &Arc<ConnectionManager>) -> CliResult<String> {
    let output = match crate::setup::setup(conn).await? {
        SetupOutcome::Local { migrations, seed } => {
            format!("{}\n{}", format_migrations(&migrations), format_seed(&seed))
        }
        SetupOutcome::Supabase { readiness } => format_readiness(&readiness),
    };
    Ok(output)
}
