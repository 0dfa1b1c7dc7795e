//! Backend capabilities consumed by the connection handle and transaction runner.
//!
//! A backend plugs into the generic core by implementing [`Driver`] (open,
//! probe and close a raw client) and, when it supports transactions,
//! [`Transactional`] (begin, commit and rollback). The core never looks at
//! the backend's wire protocol.

use crate::error::DbResult;
use async_trait::async_trait;
use std::time::Duration;

/// Settings every backend configuration exposes to the handle.
pub trait ConnectionSettings: Send + Sync + 'static {
    /// Upper bound for a single open, probe or close call.
    fn connect_timeout(&self) -> Duration;

    /// Re-check the invariants established by the config's constructor.
    fn validate(&self) -> DbResult<()>;
}

/// Opens, probes and closes raw clients for one backend.
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    type Config: ConnectionSettings;
    /// The raw client or pool. Cloning must share the underlying connection.
    type Client: Clone + Send + Sync + 'static;

    /// Backend name used in log fields.
    fn name(&self) -> &'static str;

    async fn open(&self, config: &Self::Config) -> DbResult<Self::Client>;

    /// Liveness check run immediately after [`Driver::open`].
    async fn probe(&self, client: &Self::Client) -> DbResult<()>;

    async fn close(&self, client: Self::Client) -> DbResult<()>;
}

/// Transaction support for a [`Driver`].
#[async_trait]
pub trait Transactional: Driver {
    type Transaction: Send + 'static;

    async fn begin(&self, client: &Self::Client) -> DbResult<Self::Transaction>;

    async fn commit(&self, tx: Self::Transaction) -> DbResult<()>;

    async fn rollback(&self, tx: Self::Transaction) -> DbResult<()>;
}
