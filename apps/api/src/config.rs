//! API server configuration.
//!
//! Loaded in three layers, later layers winning:
//!
//! ```text
//! defaults ──► TOML file at $PAWS_CONFIG ──► PAWS_* environment variables
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use paws_db::{DbConfig, OperatorPolicy};

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// HTTP listen port
    pub http_port: u16,

    /// HTTP listen address
    pub bind_addr: String,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Connection pool size
    pub max_connections: u32,

    /// Default log filter, overridden by RUST_LOG
    pub log_level: String,

    /// Reject sales without an authenticated operator
    pub require_operator: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            http_port: 8080,
            bind_addr: "0.0.0.0".to_string(),
            database_path: PathBuf::from("paws.db"),
            max_connections: 5,
            log_level: "info,paws=debug,sqlx=warn".to_string(),
            require_operator: false,
        }
    }
}

impl ApiConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Load configuration using `lookup` for environment variables.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup("PAWS_CONFIG") {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => ApiConfig::default(),
        };

        if let Some(value) = lookup("PAWS_HTTP_PORT") {
            config.http_port = parse("PAWS_HTTP_PORT", &value)?;
        }
        if let Some(value) = lookup("PAWS_BIND_ADDR") {
            config.bind_addr = value;
        }
        if let Some(value) = lookup("PAWS_DATABASE_PATH") {
            config.database_path = PathBuf::from(value);
        }
        if let Some(value) = lookup("PAWS_MAX_CONNECTIONS") {
            config.max_connections = parse("PAWS_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = lookup("PAWS_LOG_LEVEL") {
            config.log_level = value;
        }
        if let Some(value) = lookup("PAWS_REQUIRE_OPERATOR") {
            config.require_operator = parse("PAWS_REQUIRE_OPERATOR", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(toml::from_str(&contents)?)
    }

    /// Rejects settings the server can't run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http_port == 0 {
            return Err(ConfigError::InvalidValue("http_port".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        if self.bind_addr.trim().is_empty() {
            return Err(ConfigError::MissingRequired("bind_addr".to_string()));
        }
        Ok(())
    }

    /// Database pool settings.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }

    /// Operator attribution for sales without an authenticated user.
    pub fn operator_policy(&self) -> OperatorPolicy {
        if self.require_operator {
            OperatorPolicy::Require
        } else {
            OperatorPolicy::FallbackToFirstUser
        }
    }

    /// Socket address string to bind.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.http_port)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
}
