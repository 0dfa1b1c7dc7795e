//! Redis backend (cargo feature `redis`).
//!
//! The client is a multiplexed async connection, which is cheap to clone and
//! safe to share between tasks. Redis has no transaction envelope here; only
//! the connection lifecycle is provided.

use crate::config::DEFAULT_CONNECT_TIMEOUT_SECS;
use crate::db::{ConnectionSettings, Driver};
use crate::error::{DbError, DbResult};
use crate::models::ConfigError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use url::Url;

/// Separator between key segments.
pub const KEY_SEPARATOR: &str = ":";

/// Build a namespaced key: `key("42", &["app", "session"])` is `app:session:42`.
pub fn key(key: &str, prefixes: &[&str]) -> String {
    let mut parts = prefixes.to_vec();
    parts.push(key);
    parts.join(KEY_SEPARATOR)
}

#[derive(Clone)]
pub struct RedisConfig {
    address: String,
    password: Option<String>,
    database: u32,
    connect_timeout: Duration,
}

impl RedisConfig {
    /// `address` is `host:port`. An empty password means none.
    pub fn new(
        address: impl Into<String>,
        password: Option<String>,
        database: u32,
    ) -> Result<Self, ConfigError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                field: "address",
                message: "cannot be empty".to_string(),
            });
        }

        let config = Self {
            address,
            password: password.filter(|p| !p.is_empty()),
            database,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        config.url()?;
        Ok(config)
    }

    /// Replace the connect timeout. Zero is rejected.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "connect_timeout",
                message: "must be greater than 0".to_string(),
            });
        }
        self.connect_timeout = timeout;
        Ok(self)
    }

    /// Get the `host:port` address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Get the logical database index.
    pub fn database(&self) -> u32 {
        self.database
    }

    fn url(&self) -> Result<Url, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidField {
            field: "address",
            message,
        };
        let mut url = Url::parse(&format!("redis://{}/{}", self.address, self.database))
            .map_err(|e| invalid(e.to_string()))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| invalid("cannot carry a password".to_string()))?;
        }
        Ok(url)
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("address", &self.address)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ConnectionSettings for RedisConfig {
    fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn validate(&self) -> DbResult<()> {
        self.url()?;
        Ok(())
    }
}

fn redis_error(e: redis::RedisError) -> DbError {
    DbError::database(e.to_string(), e.code().map(String::from))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RedisDriver;

#[async_trait]
impl Driver for RedisDriver {
    type Config = RedisConfig;
    type Client = MultiplexedConnection;

    fn name(&self) -> &'static str {
        "redis"
    }

    async fn open(&self, config: &RedisConfig) -> DbResult<MultiplexedConnection> {
        let client = redis::Client::open(config.url()?.as_str())
            .map_err(|e| DbError::invalid_config(e.to_string()))?;
        client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                DbError::connection_failed(
                    format!("Failed to connect: {}", e),
                    "Check that the Redis server is running and accessible",
                )
            })
    }

    async fn probe(&self, conn: &MultiplexedConnection) -> DbResult<()> {
        let mut conn = conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        if pong != "PONG" {
            return Err(DbError::ping_failed(format!("unexpected reply: {}", pong)));
        }
        Ok(())
    }

    /// The multiplexed connection closes once its last clone is dropped.
    async fn close(&self, conn: MultiplexedConnection) -> DbResult<()> {
        drop(conn);
        Ok(())
    }
}
