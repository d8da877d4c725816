use miette::Diagnostic;
use thiserror::Error;

use crate::config::ClientType;
use crate::db::DbError;

#[derive(Error, Diagnostic, Debug)]
pub enum SetupError {
    #[error("Could not reach the {client} database")]
    #[diagnostic(
        code(fraudwatch::setup::connection_check),
        help("Check DATABASE_URL for the local backend, or SUPABASE_URL and the API key for the remote one")
    )]
    ConnectionCheck { client: ClientType },

    #[error("Migration failed: {message}")]
    #[diagnostic(code(fraudwatch::setup::migration))]
    Migration { message: String },

    #[error("Seeding is not supported on the {client} backend")]
    #[diagnostic(
        code(fraudwatch::setup::seed_unsupported),
        help("Load fixtures into the remote project with its own tooling")
    )]
    SeedUnsupported { client: ClientType },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::migrate::MigrateError> for SetupError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        SetupError::Migration {
            message: e.to_string(),
        }
    }
}

pub type SetupResult<T> = Result<T, SetupError>;
