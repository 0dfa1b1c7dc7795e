//! Connection-related data models.
//!
//! This module defines the SQL backend configuration and the database kinds it
//! can reach.

use crate::config::{DatabaseConfig, PoolOptions};
use crate::db::ConnectionSettings;
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Human readable database name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Driver name reported in log fields.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for a SQL connection pool.
///
/// Constructed through [`SqlConfig::new`], which rejects anything that could
/// not be opened. The handle shares it behind an `Arc` and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    pub id: String,
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    connection_string: String,
    /// Default: false for safety
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl SqlConfig {
    /// Create a validated config.
    pub fn new(
        id: impl Into<String>,
        connection_string: impl Into<String>,
        writable: bool,
        pool_options: PoolOptions,
    ) -> Result<Self, ConfigError> {
        let id = id.into();
        let connection_string = connection_string.into();

        if id.is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::InvalidId(id));
        }
        if connection_string.trim().is_empty() {
            return Err(ConfigError::EmptyConnectionString);
        }

        let db_type = DatabaseType::from_connection_string(&connection_string)
            .ok_or_else(|| ConfigError::UnknownDatabaseType(scheme_of(&connection_string)))?;

        pool_options
            .validate()
            .map_err(ConfigError::InvalidPoolOptions)?;

        Ok(Self {
            id,
            db_type,
            connection_string,
            writable,
            pool_options,
        })
    }

    /// Shorthand for a writable config with default pool options.
    pub fn writable(
        id: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::new(id, connection_string, true, PoolOptions::default())
    }

    /// Get the raw connection string. Use `masked_connection_string` for logs.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Check if this config targets SQLite.
    pub fn is_sqlite(&self) -> bool {
        self.db_type == DatabaseType::SQLite
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        if let Some(at_pos) = self.connection_string.find('@') {
            if let Some(colon_pos) = self.connection_string[..at_pos].rfind(':') {
                let prefix = &self.connection_string[..colon_pos + 1];
                let suffix = &self.connection_string[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.connection_string.clone()
    }
}

impl TryFrom<&DatabaseConfig> for SqlConfig {
    type Error = ConfigError;

    fn try_from(config: &DatabaseConfig) -> Result<Self, Self::Error> {
        Self::new(
            config.id.clone(),
            config.connection_string.clone(),
            config.writable,
            config.pool_options.clone(),
        )
    }
}

impl ConnectionSettings for SqlConfig {
    fn connect_timeout(&self) -> Duration {
        self.pool_options.connect_timeout_or_default()
    }

    fn validate(&self) -> DbResult<()> {
        if self.connection_string.trim().is_empty() {
            return Err(ConfigError::EmptyConnectionString.into());
        }
        if DatabaseType::from_connection_string(&self.connection_string) != Some(self.db_type) {
            return Err(ConfigError::UnknownDatabaseType(scheme_of(&self.connection_string)).into());
        }
        self.pool_options
            .validate()
            .map_err(|e| ConfigError::InvalidPoolOptions(e).into())
    }
}

/// Only the scheme ends up in error messages; the rest may carry credentials.
pub(crate) fn scheme_of(connection_string: &str) -> String {
    connection_string
        .split(':')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Errors that can occur when creating a backend configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Connection ID cannot be empty")]
    EmptyId,

    #[error("Connection ID contains invalid characters: {0}")]
    InvalidId(String),

    #[error("Connection string cannot be empty")]
    EmptyConnectionString,

    /// Could not determine database type from connection string
    #[error("Unknown database type in connection string: {0}")]
    UnknownDatabaseType(String),

    #[error("Invalid pool options: {0}")]
    InvalidPoolOptions(String),

    #[error("Invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl From<ConfigError> for DbError {
    fn from(err: ConfigError) -> Self {
        DbError::invalid_config(err.to_string())
    }
}
