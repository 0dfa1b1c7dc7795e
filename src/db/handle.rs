//! Connection handle lifecycle.
//!
//! A [`ConnectionHandle`] owns at most one live backend client or pool and
//! guards its establishment and teardown:
//!
//! - `connect` opens a client, probes it, and only then publishes it
//! - `client` returns the published client without side effects
//! - `disconnect` closes the client; the handle is disconnected afterwards
//!   even if the close failed
//!
//! State transitions are serialized by a single handle-scoped lock. Queries
//! issued on the client are not serialized by the handle.

use crate::db::driver::{ConnectionSettings, Driver, Transactional};
use crate::db::transaction::run_transaction;
use crate::error::{DbError, DbResult};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// Outcome of [`ConnectionHandle::connect`].
#[derive(Debug, Clone)]
pub enum Connection<C> {
    /// This call opened and probed the client.
    Established(C),
    /// The handle was already connected; this is the existing client.
    AlreadyConnected(C),
}

impl<C> Connection<C> {
    /// Borrow the client, however it was obtained.
    pub fn client(&self) -> &C {
        match self {
            Self::Established(client) | Self::AlreadyConnected(client) => client,
        }
    }

    /// Take the client, however it was obtained.
    pub fn into_client(self) -> C {
        match self {
            Self::Established(client) | Self::AlreadyConnected(client) => client,
        }
    }

    /// True when this call opened the client.
    pub fn is_established(&self) -> bool {
        matches!(self, Self::Established(_))
    }

    /// Treat an already-connected handle as an error.
    pub fn established(self) -> DbResult<C> {
        match self {
            Self::Established(client) => Ok(client),
            Self::AlreadyConnected(_) => Err(DbError::AlreadyConnected),
        }
    }
}

struct Inner<D: Driver> {
    driver: D,
    config: Arc<D::Config>,
    /// `Some` iff the handle is connected.
    client: Mutex<Option<D::Client>>,
}

/// Lazily-established, thread-safe handle to one backend client or pool.
///
/// Clones share the same state.
pub struct ConnectionHandle<D: Driver> {
    inner: Arc<Inner<D>>,
}

impl<D: Driver> Clone for ConnectionHandle<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> std::fmt::Debug for ConnectionHandle<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("backend", &self.inner.driver.name())
            .field("connected", &self.inner.client.try_lock().map(|c| c.is_some()).ok())
            .finish_non_exhaustive()
    }
}

impl<D: Driver> ConnectionHandle<D> {
    /// Create a disconnected handle after validating the configuration.
    pub fn new(driver: D, config: impl Into<Arc<D::Config>>) -> DbResult<Self> {
        let config = config.into();
        config.validate()?;

        Ok(Self {
            inner: Arc::new(Inner {
                driver,
                config,
                client: Mutex::new(None),
            }),
        })
    }

    /// Get the driver backing this handle.
    pub fn driver(&self) -> &D {
        &self.inner.driver
    }

    /// Get the validated configuration.
    pub fn config(&self) -> &D::Config {
        &self.inner.config
    }

    /// Open, probe and publish a client, or return the one already published.
    ///
    /// The transition runs on a spawned task, so dropping the returned future
    /// does not interrupt an open or probe that is already in flight.
    pub async fn connect(&self) -> DbResult<Connection<D::Client>> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.connect().await })
            .await
            .map_err(|e| task_failed("connect", e))?
    }

    /// Get the live client, or [`DbError::NotConnected`].
    pub async fn client(&self) -> DbResult<D::Client> {
        self.inner
            .client
            .lock()
            .await
            .clone()
            .ok_or(DbError::NotConnected)
    }

    /// Check whether a client is currently published.
    pub async fn is_connected(&self) -> bool {
        self.inner.client.lock().await.is_some()
    }

    /// Close the client. A no-op when already disconnected.
    ///
    /// The handle is disconnected when this returns, whether or not the
    /// backend close succeeded.
    pub async fn disconnect(&self) -> DbResult<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.disconnect().await })
            .await
            .map_err(|e| task_failed("disconnect", e))?
    }
}

impl<D: Transactional> ConnectionHandle<D> {
    /// Run `work` inside a transaction on the live client.
    ///
    /// See [`run_transaction`] for the commit/rollback protocol.
    pub async fn transaction<T, F>(&self, work: F) -> DbResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut D::Transaction) -> BoxFuture<'t, DbResult<T>> + Send,
    {
        let client = self.client().await?;
        run_transaction(&self.inner.driver, &client, work).await
    }
}

impl<D: Driver> Inner<D> {
    async fn connect(&self) -> DbResult<Connection<D::Client>> {
        let backend = self.driver.name();
        let mut slot = self.client.lock().await;

        if let Some(client) = slot.as_ref() {
            debug!(backend, "Connection already established");
            return Ok(Connection::AlreadyConnected(client.clone()));
        }

        let limit = self.config.connect_timeout();
        let start = Instant::now();

        let client = match tokio::time::timeout(limit, self.driver.open(&self.config)).await {
            Ok(Ok(client)) => client,
            Ok(Err(e @ (DbError::ConnectionFailed { .. } | DbError::InvalidConfig { .. }))) => {
                return Err(e);
            }
            Ok(Err(e)) => {
                return Err(DbError::connection_failed(
                    e.to_string(),
                    "Check that the server is running and the connection settings are correct",
                ));
            }
            Err(_) => {
                return Err(DbError::connection_failed(
                    format!("open timed out after {}", format_duration(limit)),
                    "Check that the server is reachable or raise the connect timeout",
                ));
            }
        };

        let probe = match tokio::time::timeout(limit, self.driver.probe(&client)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e @ DbError::PingFailed { .. })) => Err(e),
            Ok(Err(e)) => Err(DbError::ping_failed(e.to_string())),
            Err(_) => Err(DbError::ping_failed(format!(
                "probe timed out after {}",
                format_duration(limit)
            ))),
        };

        if let Err(e) = probe {
            warn!(backend, error = %e, "Liveness probe failed, discarding client");
            self.discard(client, limit).await;
            return Err(e);
        }

        *slot = Some(client.clone());
        info!(
            backend,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Connected to database"
        );

        Ok(Connection::Established(client))
    }

    async fn disconnect(&self) -> DbResult<()> {
        let backend = self.driver.name();
        let mut slot = self.client.lock().await;

        let Some(client) = slot.take() else {
            debug!(backend, "Disconnect on a disconnected handle");
            return Ok(());
        };

        let limit = self.config.connect_timeout();
        let result = match tokio::time::timeout(limit, self.driver.close(client)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DbError::failed_to_disconnect(e.to_string())),
            Err(_) => Err(DbError::failed_to_disconnect(format!(
                "close timed out after {}",
                format_duration(limit)
            ))),
        };

        match &result {
            Ok(()) => info!(backend, "Disconnected from database"),
            Err(e) => warn!(backend, error = %e, "Close failed, handle marked disconnected"),
        }

        result
    }

    /// Best-effort close of a client that never got published.
    async fn discard(&self, client: D::Client, limit: Duration) {
        match tokio::time::timeout(limit, self.driver.close(client)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(backend = self.driver.name(), error = %e, "Failed to close discarded client"),
            Err(_) => warn!(backend = self.driver.name(), "Timed out closing discarded client"),
        }
    }
}

fn task_failed(operation: &str, err: JoinError) -> DbError {
    DbError::internal(format!("{} task failed: {}", operation, err))
}

fn format_duration(d: Duration) -> String {
    format!("{}ms", d.as_millis())
}
