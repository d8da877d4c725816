mod commands;
pub mod error;
pub mod utils;


use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ClientType, DbConfig};
use crate::db::with_connection;
use error::CliResult;

#[derive(Parser)]
#[command(name = "fwdb")]
#[command(author, version, about = "Fraud dashboard database tool", long_about = None)]
pub struct Cli {
    /// Backend to use: local or supabase (default: DB_CLIENT env or local)
    #[arg(long, global = true)]
    pub client: Option<ClientType>,

    /// SQLite URL for the local backend (default: DATABASE_URL env)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Supabase project URL (default: SUPABASE_URL env)
    #[arg(long, global = true)]
    pub supabase_url: Option<String>,

    /// Supabase API key (default: SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY env)
    #[arg(long, global = true)]
    pub supabase_key: Option<String>,

    /// Upper bound for every database call, in seconds (default: DB_TIMEOUT_SECS env or 10)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Apply pending migrations
    Migrate,
    /// Replace local data with the demo fixtures
    Seed,
    /// Check the connection, then migrate and seed (local) or report table status (remote)
    Setup,
    /// Report which required tables are reachable
    Status,
    /// Check that the database answers
    Ping,
}

impl Cli {
    /// Environment settings with command-line overrides applied.
    pub fn resolve_config(&self) -> CliResult<DbConfig> {
        let mut config = DbConfig::from_env()?;
        if let Some(client) = self.client {
            config = config.with_client_type(client);
        }
        if let Some(url) = &self.database_url {
            config = config.with_database_url(url);
        }
        if let Some(url) = &self.supabase_url {
            config.supabase_url = Some(url.clone());
        }
        if let Some(key) = &self.supabase_key {
            config.supabase_key = Some(key.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn execute(command: Commands, config: &DbConfig) -> CliResult<String> {
    with_connection(config, |conn| async move {
        match command {
            Commands::Migrate => commands::db::migrate(&conn).await,
            Commands::Seed => commands::db::seed(&conn).await,
            Commands::Setup => commands::db::setup(&conn).await,
            Commands::Status => commands::db::status(&conn).await,
            Commands::Ping => commands::db::ping(&conn).await,
        }
    })
    .await
}

pub async fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.resolve_config()?;
    let output = execute(cli.command, &config).await?;
    println!("{}", output);
    Ok(())
}
