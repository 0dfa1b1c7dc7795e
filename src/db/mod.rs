//! Backend-agnostic connection lifecycle core.
//!
//! This module provides:
//! - Driver capability traits implemented by each backend
//! - The connection handle state machine
//! - The transaction envelope (begin, work, commit or rollback)
//! - The concurrent multi-query runner with fail-fast cancellation

pub mod concurrent;
pub mod driver;
pub mod handle;
#[cfg(test)]
pub(crate) mod mock;
pub mod transaction;

pub use concurrent::{run_concurrently, run_concurrently_with_cancel};
pub use driver::{ConnectionSettings, Driver, Transactional};
pub use handle::{Connection, ConnectionHandle};
pub use transaction::run_transaction;
pub use tokio_util::sync::CancellationToken;
