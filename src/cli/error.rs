use miette::Diagnostic;
use thiserror::Error;

use crate::config::{ClientType, ConfigError};
use crate::db::{ConnectError, DbError};
use crate::setup::SetupError;

#[derive(Error, Diagnostic, Debug)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Setup(#[from] SetupError),

    #[error("The {client} database did not answer")]
    #[diagnostic(
        code(fraudwatch::cli::unreachable),
        help("Run with RUST_LOG=fraudwatch=debug for the underlying error")
    )]
    Unreachable { client: ClientType },
}

impl From<ConnectError> for CliError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Config(e) => CliError::Config(e),
            ConnectError::Database(e) => CliError::Database(e),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
