//! Database configuration.
//!
//! Resolution order for every field: explicit override (CLI flag) >
//! environment variable > built-in default.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://fraudwatch.db?mode=rwc";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Errors raised while resolving configuration.
#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Unknown database client type: '{value}'")]
    #[diagnostic(
        code(fraudwatch::config::unknown_client),
        help("Set DB_CLIENT (or --client) to 'local' or 'supabase'")
    )]
    UnknownClientType { value: String },

    #[error("Missing required setting: {name} (hint: {help})")]
    #[diagnostic(code(fraudwatch::config::missing))]
    Missing { name: String, help: String },

    #[error("Invalid value for {name}: '{value}'")]
    #[diagnostic(code(fraudwatch::config::invalid_value))]
    InvalidValue { name: String, value: String },
}

/// Which backend strategy every adapter operation dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    #[default]
    Local,
    Supabase,
}

impl FromStr for ClientType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "sqlite" => Ok(ClientType::Local),
            "supabase" | "remote" => Ok(ClientType::Supabase),
            _ => Err(ConfigError::UnknownClientType {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientType::Local => write!(f, "local"),
            ClientType::Supabase => write!(f, "supabase"),
        }
    }
}

/// Connection settings for both backends.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConfig {
    pub client_type: ClientType,
    /// SQLite connection URL used by the local backend.
    pub database_url: String,
    /// Project URL of the remote backend (without the `/rest/v1` suffix).
    pub supabase_url: Option<String>,
    /// API key sent as both `apikey` and bearer token.
    pub supabase_key: Option<String>,
    /// Upper bound for every backend round trip.
    pub timeout: Duration,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            client_type: ClientType::Local,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            supabase_url: None,
            supabase_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl DbConfig {
    /// Build a configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(client) = non_empty_var("DB_CLIENT") {
            config.client_type = client.parse()?;
        }
        if let Some(url) = non_empty_var("DATABASE_URL") {
            config.database_url = url;
        }
        config.supabase_url = non_empty_var("SUPABASE_URL");
        config.supabase_key = non_empty_var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|| non_empty_var("SUPABASE_ANON_KEY"));

        if let Some(secs) = non_empty_var("DB_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| ConfigError::InvalidValue {
                name: "DB_TIMEOUT_SECS".to_string(),
                value: secs.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(max) = non_empty_var("DB_MAX_CONNECTIONS") {
            config.max_connections = max.parse().map_err(|_| ConfigError::InvalidValue {
                name: "DB_MAX_CONNECTIONS".to_string(),
                value: max.clone(),
            })?;
        }

        Ok(config)
    }

    pub fn with_client_type(mut self, client_type: ClientType) -> Self {
        self.client_type = client_type;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_supabase(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.supabase_url = Some(url.into());
        self.supabase_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check that the active backend has everything it needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "timeout".to_string(),
                value: "0".to_string(),
            });
        }

        match self.client_type {
            ClientType::Local => {
                if self.database_url.trim().is_empty() {
                    return Err(ConfigError::Missing {
                        name: "DATABASE_URL".to_string(),
                        help: "Provide a sqlite:// URL".to_string(),
                    });
                }
            }
            ClientType::Supabase => {
                if self.supabase_url.is_none() {
                    return Err(ConfigError::Missing {
                        name: "SUPABASE_URL".to_string(),
                        help: "Set SUPABASE_URL or pass --supabase-url".to_string(),
                    });
                }
                if self.supabase_key.is_none() {
                    return Err(ConfigError::Missing {
                        name: "SUPABASE_SERVICE_ROLE_KEY".to_string(),
                        help: "Set SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}
