//! Uniform connection lifecycle for database backends.
//!
//! A [`ConnectionHandle`] owns one backend client and moves it through an
//! idempotent connect/disconnect state machine. On top of it sit a
//! begin/commit/rollback transaction envelope and a concurrent runner with
//! fail-fast cancellation. Backends plug in through the [`db::Driver`] and
//! [`db::Transactional`] traits: SQL pools via sqlx, a typed PostgreSQL pool,
//! and optionally Redis and MongoDB.

pub mod backends;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use backends::{SqlDriver, SqlService};
pub use config::Config;
pub use db::{Connection, ConnectionHandle};
pub use error::{BatchError, DbError, DbErrorKind, DbResult};
