//! Typed PostgreSQL pool driver.
//!
//! Unlike [`SqlDriver`](crate::backends::sql::SqlDriver) the client is a bare
//! `PgPool` and the transaction a bare `sqlx::Transaction`, so work functions
//! get the full PostgreSQL type surface without going through an enum.

use crate::backends::sql::{connection_suggestion, sqlx_pool_options};
use crate::config::PoolOptions;
use crate::db::{ConnectionSettings, Driver, Transactional};
use crate::error::{DbError, DbResult};
use crate::models::{ConfigError, DatabaseType, connection::scheme_of};
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection as _, PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// PostgreSQL pool configuration. The data source name is parsed once, here.
#[derive(Debug, Clone)]
pub struct PgPoolConfig {
    connect_options: PgConnectOptions,
    pool_options: PoolOptions,
}

impl PgPoolConfig {
    /// Parse `data_source_name` once and validate `pool_options`.
    pub fn new(
        data_source_name: &str,
        pool_options: PoolOptions,
    ) -> Result<Self, ConfigError> {
        if data_source_name.trim().is_empty() {
            return Err(ConfigError::EmptyConnectionString);
        }
        if DatabaseType::from_connection_string(data_source_name) != Some(DatabaseType::PostgreSQL)
        {
            return Err(ConfigError::UnknownDatabaseType(scheme_of(data_source_name)));
        }
        let connect_options =
            PgConnectOptions::from_str(data_source_name).map_err(|e| ConfigError::InvalidField {
                field: "data source name",
                message: e.to_string(),
            })?;
        pool_options
            .validate()
            .map_err(ConfigError::InvalidPoolOptions)?;

        Ok(Self {
            connect_options,
            pool_options,
        })
    }

    /// Get the parsed connect options.
    pub fn connect_options(&self) -> &PgConnectOptions {
        &self.connect_options
    }

    /// Get the pool sizing options.
    pub fn pool_options(&self) -> &PoolOptions {
        &self.pool_options
    }
}

impl ConnectionSettings for PgPoolConfig {
    fn connect_timeout(&self) -> Duration {
        self.pool_options.connect_timeout_or_default()
    }

    fn validate(&self) -> DbResult<()> {
        self.pool_options
            .validate()
            .map_err(|e| ConfigError::InvalidPoolOptions(e).into())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PgPoolDriver;

#[async_trait]
impl Driver for PgPoolDriver {
    type Config = PgPoolConfig;
    type Client = PgPool;

    fn name(&self) -> &'static str {
        "pgpool"
    }

    async fn open(&self, config: &PgPoolConfig) -> DbResult<PgPool> {
        sqlx_pool_options::<Postgres>(&config.pool_options, false)
            .connect_with(config.connect_options.clone())
            .await
            .map_err(|e| {
                DbError::connection_failed(
                    format!("Failed to connect: {}", e),
                    connection_suggestion(DatabaseType::PostgreSQL, &e),
                )
            })
    }

    async fn probe(&self, pool: &PgPool) -> DbResult<()> {
        pool.acquire().await?.ping().await?;
        Ok(())
    }

    async fn close(&self, pool: PgPool) -> DbResult<()> {
        pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl Transactional for PgPoolDriver {
    type Transaction = Transaction<'static, Postgres>;

    async fn begin(&self, pool: &PgPool) -> DbResult<Self::Transaction> {
        Ok(pool.begin().await?)
    }

    async fn commit(&self, tx: Self::Transaction) -> DbResult<()> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: Self::Transaction) -> DbResult<()> {
        Ok(tx.rollback().await?)
    }
}
