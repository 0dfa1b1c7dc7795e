//! Backend adapters plugging concrete clients into the lifecycle core.

mod params;
pub mod postgres;
pub mod sql;

#[cfg(feature = "mongodb")]
pub mod mongodb;
#[cfg(feature = "redis")]
pub mod redis;

pub use postgres::{PgPoolConfig, PgPoolDriver};
pub use sql::{DbPool, DbTransaction, FromDbRow, SqlDriver, SqlService};
