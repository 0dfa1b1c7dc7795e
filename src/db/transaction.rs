//! Transaction envelope around a caller-supplied unit of work.
//!
//! The protocol is strictly sequential: begin, run the work function exactly
//! once, then either commit (work succeeded) or roll back (work failed). The
//! transaction is consumed on every path, and nothing is retried.

use crate::db::driver::Transactional;
use crate::error::{DbError, DbResult};
use futures_util::future::BoxFuture;
use std::time::Instant;
use tracing::{debug, warn};

/// Run `work` inside a transaction on `client`.
///
/// - If `begin` fails its error is returned and `work` is never invoked.
/// - If `work` fails the transaction is rolled back and the work error is
///   returned. When the rollback fails as well, both errors are returned in
///   [`DbError::TransactionWorkFailed`].
/// - If `work` succeeds the transaction is committed; a commit error is
///   returned as-is.
///
/// # Example
///
/// ```ignore
/// let inserted = run_transaction(&driver, &pool, |tx| {
///     Box::pin(async move {
///         tx.execute("INSERT INTO users (name) VALUES (?)", &[QueryParam::from("ada")])
///             .await
///     })
/// })
/// .await?;
/// ```
pub async fn run_transaction<D, T, F>(driver: &D, client: &D::Client, work: F) -> DbResult<T>
where
    D: Transactional,
    T: Send,
    F: for<'t> FnOnce(&'t mut D::Transaction) -> BoxFuture<'t, DbResult<T>> + Send,
{
    let backend = driver.name();
    let start = Instant::now();

    let mut tx = driver.begin(client).await?;
    debug!(backend, "Transaction started");

    let outcome = work(&mut tx).await;

    match outcome {
        Ok(value) => {
            driver.commit(tx).await?;
            debug!(
                backend,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Transaction committed"
            );
            Ok(value)
        }
        Err(work_err) => match driver.rollback(tx).await {
            Ok(()) => {
                debug!(backend, error = %work_err, "Transaction rolled back");
                Err(work_err)
            }
            Err(rollback_err) => {
                warn!(
                    backend,
                    error = %work_err,
                    rollback_error = %rollback_err,
                    "Rollback failed after work error"
                );
                Err(DbError::TransactionWorkFailed {
                    work: Box::new(work_err),
                    rollback: Box::new(rollback_err),
                })
            }
        },
    }
}
