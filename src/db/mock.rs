//! In-memory driver used by the unit tests of the core.

use crate::db::driver::{ConnectionSettings, Driver, Transactional};
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub connect_timeout: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl ConnectionSettings for MockConfig {
    fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn validate(&self) -> DbResult<()> {
        if self.connect_timeout.is_zero() {
            return Err(DbError::invalid_config("connect timeout must be positive"));
        }
        Ok(())
    }
}

/// Committed rows live on the client so tests can observe commit/rollback.
#[derive(Debug, Default)]
pub struct MockClient {
    rows: Mutex<Vec<i64>>,
}

impl MockClient {
    /// Committed rows.
    pub fn rows(&self) -> Vec<i64> {
        self.rows.lock().unwrap().clone()
    }
}

pub struct MockTx {
    client: Arc<MockClient>,
    staged: Vec<i64>,
}

impl MockTx {
    /// Stage a row until commit.
    pub fn insert(&mut self, row: i64) {
        self.staged.push(row);
    }
}

#[derive(Debug, Default)]
pub struct MockDriver {
    pub open_delay: Duration,
    pub probe_delay: Duration,
    pub close_delay: Duration,
    pub fail_open: bool,
    pub fail_probe: bool,
    pub fail_close: bool,
    pub fail_begin: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
}

#[async_trait]
impl Driver for MockDriver {
    type Config = MockConfig;
    type Client = Arc<MockClient>;

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn open(&self, _config: &MockConfig) -> DbResult<Arc<MockClient>> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.fail_open {
            return Err(DbError::database("connection refused", None));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockClient::default()))
    }

    async fn probe(&self, _client: &Arc<MockClient>) -> DbResult<()> {
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        if self.fail_probe {
            return Err(DbError::database("server closed the connection", None));
        }
        Ok(())
    }

    async fn close(&self, _client: Arc<MockClient>) -> DbResult<()> {
        if !self.close_delay.is_zero() {
            tokio::time::sleep(self.close_delay).await;
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(DbError::database("broken pipe", None));
        }
        Ok(())
    }
}

#[async_trait]
impl Transactional for MockDriver {
    type Transaction = MockTx;

    async fn begin(&self, client: &Arc<MockClient>) -> DbResult<MockTx> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        if self.fail_begin {
            return Err(DbError::database("cannot begin", None));
        }
        Ok(MockTx {
            client: Arc::clone(client),
            staged: Vec::new(),
        })
    }

    async fn commit(&self, tx: MockTx) -> DbResult<()> {
        if self.fail_commit {
            return Err(DbError::database("commit rejected", None));
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        tx.client.rows.lock().unwrap().extend(tx.staged);
        Ok(())
    }

    async fn rollback(&self, _tx: MockTx) -> DbResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.fail_rollback {
            return Err(DbError::database("connection reset", None));
        }
        Ok(())
    }
}
