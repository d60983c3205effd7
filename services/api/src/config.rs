//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where reading data lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatabaseBackend {
    Postgres(String),
    /// `DATABASE_URL=memory:` keeps everything in process; handy for demos.
    InMemory,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database: DatabaseBackend,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub timer_state_dir: PathBuf,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let database = if database_url.starts_with("memory:") {
            DatabaseBackend::InMemory
        } else {
            DatabaseBackend::Postgres(database_url)
        };

        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS".to_string(), e.to_string())
            })?,
            None => 5,
        };

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Timer and Browser Settings ---
        let timer_state_dir = var("TIMER_STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./timer-state"));

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database,
            database_max_connections,
            log_level,
            timer_state_dir,
            cors_origin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/bookflow")]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(
            config.database,
            DatabaseBackend::Postgres("postgres://localhost/bookflow".to_string())
        );
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.timer_state_dir, PathBuf::from("./timer-state"));
    }

    #[test]
    fn memory_url_selects_in_memory_backend() {
        let config = load(&[("DATABASE_URL", "memory:")]).unwrap();
        assert_eq!(config.database, DatabaseBackend::InMemory);
    }

    #[test]
    fn missing_database_url_is_reported() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(name)) if name == "DATABASE_URL"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(
            load(&[("DATABASE_URL", "memory:"), ("BIND_ADDRESS", "nowhere")]),
            Err(ConfigError::InvalidValue(name, _)) if name == "BIND_ADDRESS"
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "memory:"), ("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidValue(name, _)) if name == "RUST_LOG"
        ));
    }
}
