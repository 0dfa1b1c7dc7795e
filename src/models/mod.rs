//! Data models shared by the backends.

pub mod connection;
pub mod query;

pub use connection::{ConfigError, DatabaseType, SqlConfig};
pub use query::QueryParam;
