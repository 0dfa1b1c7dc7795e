//! Concurrent execution of independent operations against a shared client.
//!
//! Every operation runs on its own tokio task. The runner waits for all of
//! them and reports every failure, in the order the tasks finished.
//!
//! The fail-fast variant hands each operation a [`CancellationToken`] that is
//! cancelled as soon as any operation fails. Cancellation is cooperative: no
//! task is aborted, each operation decides when to stop and still reports its
//! own outcome. An operation that stops early should return
//! [`DbError::Cancelled`], which is counted separately and never reported as
//! a failure.
//!
//! Dropping the runner future stops waiting but leaves every operation still
//! in flight running to completion in the background.

use crate::db::driver::Driver;
use crate::db::handle::ConnectionHandle;
use crate::error::{BatchError, DbError, DbResult};
use std::future::Future;
use std::ops::{Deref, DerefMut};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Run every operation concurrently and wait for all of them.
///
/// Returns `Ok(())` only if no operation failed.
pub async fn run_concurrently<C, F, Fut>(client: &C, operations: Vec<F>) -> Result<(), BatchError>
where
    C: Clone + Send + Sync + 'static,
    F: FnOnce(C) -> Fut,
    Fut: Future<Output = DbResult<()>> + Send + 'static,
{
    let mut tasks = DetachOnDrop::default();
    for operation in operations {
        tasks.spawn(operation(client.clone()));
    }

    wait_all(tasks, None).await
}

/// Like [`run_concurrently`], but the first failure cancels the token shared
/// by all operations.
pub async fn run_concurrently_with_cancel<C, F, Fut>(
    client: &C,
    operations: Vec<F>,
) -> Result<(), BatchError>
where
    C: Clone + Send + Sync + 'static,
    F: FnOnce(C, CancellationToken) -> Fut,
    Fut: Future<Output = DbResult<()>> + Send + 'static,
{
    let token = CancellationToken::new();
    let mut tasks = DetachOnDrop::default();

    for operation in operations {
        let future = operation(client.clone(), token.clone());
        let token = token.clone();
        tasks.spawn(async move {
            let result = future.await;
            if matches!(&result, Err(e) if !matches!(e, DbError::Cancelled)) {
                token.cancel();
            }
            result
        });
    }

    wait_all(tasks, Some(&token)).await
}

/// Task set that detaches, rather than aborts, its tasks when dropped.
#[derive(Default)]
struct DetachOnDrop(JoinSet<DbResult<()>>);

impl Deref for DetachOnDrop {
    type Target = JoinSet<DbResult<()>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DetachOnDrop {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        if !self.0.is_empty() {
            debug!(remaining = self.0.len(), "Runner dropped, detaching in-flight operations");
            self.0.detach_all();
        }
    }
}

/// Drain the set. Every task has terminated when this returns.
async fn wait_all(
    mut tasks: DetachOnDrop,
    token: Option<&CancellationToken>,
) -> Result<(), BatchError> {
    let total = tasks.len();
    let mut errors = Vec::new();
    let mut cancelled = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(DbError::Cancelled)) => cancelled += 1,
            Ok(Err(e)) => errors.push(e),
            Err(e) => {
                error!(error = %e, "Query task failed to complete");
                if let Some(token) = token {
                    token.cancel();
                }
                errors.push(DbError::internal(format!("query task failed: {}", e)));
            }
        }
    }

    debug!(total, failed = errors.len(), cancelled, "Concurrent batch finished");

    if errors.is_empty() {
        Ok(())
    } else {
        Err(BatchError { errors, total })
    }
}

impl<D: Driver> ConnectionHandle<D> {
    /// [`run_concurrently`] on the live client.
    pub async fn run_concurrently<F, Fut>(&self, operations: Vec<F>) -> DbResult<()>
    where
        F: FnOnce(D::Client) -> Fut,
        Fut: Future<Output = DbResult<()>> + Send + 'static,
    {
        let client = self.client().await?;
        Ok(run_concurrently(&client, operations).await?)
    }

    /// [`run_concurrently_with_cancel`] on the live client.
    pub async fn run_concurrently_with_cancel<F, Fut>(&self, operations: Vec<F>) -> DbResult<()>
    where
        F: FnOnce(D::Client, CancellationToken) -> Fut,
        Fut: Future<Output = DbResult<()>> + Send + 'static,
    {
        let client = self.client().await?;
        Ok(run_concurrently_with_cancel(&client, operations).await?)
    }
}
