//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;

use chrono::Duration;
use school_directory_core::StoreSettings;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which implementation of the directory port serves requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Postgres,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub backend: Backend,
    /// Required only for the Postgres backend.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub seed_demo_data: bool,
    pub referential_checks: bool,
    pub token_ttl_hours: i64,
    pub token_max_attempts: u32,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let backend = match lookup("DIRECTORY_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .to_lowercase()
            .as_str()
        {
            "memory" => Backend::Memory,
            "postgres" => Backend::Postgres,
            other => {
                return Err(ConfigError::InvalidValue(
                    "DIRECTORY_BACKEND".to_string(),
                    format!("'{}' is not one of memory, postgres", other),
                ))
            }
        };

        // --- Database ---
        let database_url = lookup("DATABASE_URL");
        if backend == Backend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }
        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5u32)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Directory behaviour ---
        let seed_demo_data = parse_or(&lookup, "SEED_DEMO_DATA", backend == Backend::Memory)?;
        let referential_checks = parse_or(&lookup, "REFERENTIAL_CHECKS", true)?;
        let token_ttl_hours: i64 = parse_or(&lookup, "TOKEN_TTL_HOURS", 7 * 24)?;
        if token_ttl_hours < 1 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_TTL_HOURS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let token_max_attempts: u32 = parse_or(&lookup, "TOKEN_MAX_ATTEMPTS", 3)?;
        if token_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            backend,
            database_url,
            database_max_connections,
            log_level,
            seed_demo_data,
            referential_checks,
            token_ttl_hours,
            token_max_attempts,
            cors_origin,
        })
    }

    /// Store tunables derived from the environment.
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            referential_checks: self.referential_checks,
            token_ttl: Duration::hours(self.token_ttl_hours),
            max_token_attempts: self.token_max_attempts,
            ..StoreSettings::default()
        }
    }
}

/// Parses `key` when set, otherwise falls back to `default`.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
