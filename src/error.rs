//! Error types for connection handles and transaction execution.
//!
//! Every failure condition maps to a distinct [`DbErrorKind`] so callers can
//! branch on the condition instead of matching on message text. The same
//! enumeration is shared by every backend adapter.

use thiserror::Error;

/// Boxed error type used for caller-supplied failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Connection to database already established")]
    AlreadyConnected,

    #[error("Failed to connect to database: {message}")]
    ConnectionFailed { message: String, suggestion: String },

    #[error("Failed to ping database: {message}")]
    PingFailed { message: String },

    #[error("Connection to database not established")]
    NotConnected,

    #[error("Failed to disconnect from database: {message}")]
    FailedToDisconnect { message: String },

    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("No rows returned")]
    RowNotFound,

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "23505" for a PostgreSQL unique violation
        sql_state: Option<String>,
        constraint: Option<String>,
    },

    #[error("{0}")]
    Work(#[source] BoxError),

    /// The work function failed and the rollback that followed failed too.
    #[error("Transaction work failed: {work}; rollback failed: {rollback}")]
    TransactionWorkFailed {
        work: Box<DbError>,
        rollback: Box<DbError>,
    },

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Stable classification of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbErrorKind {
    InvalidConfig,
    AlreadyConnected,
    ConnectionFailed,
    PingFailed,
    NotConnected,
    FailedToDisconnect,
    EmptyQuery,
    RowNotFound,
    Database,
    Work,
    TransactionWorkFailed,
    Batch,
    Cancelled,
    Internal,
}

impl DbError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection_failed(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a ping (liveness probe) error.
    pub fn ping_failed(message: impl Into<String>) -> Self {
        Self::PingFailed {
            message: message.into(),
        }
    }

    /// Create a disconnect error.
    pub fn failed_to_disconnect(message: impl Into<String>) -> Self {
        Self::FailedToDisconnect {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            constraint: None,
        }
    }

    /// Wrap a caller-supplied failure, typically returned from a work function.
    pub fn work(err: impl Into<BoxError>) -> Self {
        Self::Work(err.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the stable kind of this error.
    pub fn kind(&self) -> DbErrorKind {
        match self {
            Self::InvalidConfig { .. } => DbErrorKind::InvalidConfig,
            Self::AlreadyConnected => DbErrorKind::AlreadyConnected,
            Self::ConnectionFailed { .. } => DbErrorKind::ConnectionFailed,
            Self::PingFailed { .. } => DbErrorKind::PingFailed,
            Self::NotConnected => DbErrorKind::NotConnected,
            Self::FailedToDisconnect { .. } => DbErrorKind::FailedToDisconnect,
            Self::EmptyQuery => DbErrorKind::EmptyQuery,
            Self::RowNotFound => DbErrorKind::RowNotFound,
            Self::Database { .. } => DbErrorKind::Database,
            Self::Work(_) => DbErrorKind::Work,
            Self::TransactionWorkFailed { .. } => DbErrorKind::TransactionWorkFailed,
            Self::Batch(_) => DbErrorKind::Batch,
            Self::Cancelled => DbErrorKind::Cancelled,
            Self::Internal { .. } => DbErrorKind::Internal,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ConnectionFailed { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    ///
    /// Nothing in this crate retries on its own; this only tells the caller
    /// whether a retry layered above could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::PingFailed { .. }
        )
    }

    /// Returns the violated constraint when the backend reported a unique violation.
    ///
    /// The constraint name is empty when the backend does not report one.
    pub fn unique_violation(&self) -> Option<&str> {
        match self {
            Self::Database {
                sql_state: Some(code),
                constraint,
                ..
            } if is_unique_violation_code(code) => Some(constraint.as_deref().unwrap_or("")),
            Self::TransactionWorkFailed { work, .. } => work.unique_violation(),
            _ => None,
        }
    }
}

/// PostgreSQL, MySQL and SQLite (extended) codes for unique violations.
fn is_unique_violation_code(code: &str) -> bool {
    matches!(code, "23505" | "1062" | "2067" | "1555")
}

/// Every failure collected by a concurrent batch, in completion order.
#[derive(Error, Debug)]
#[error("{} of {total} operations failed: {}", .errors.len(), summarize(.errors))]
pub struct BatchError {
    pub errors: Vec<DbError>,
    pub total: usize,
}

impl BatchError {
    /// Number of failed operations.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True when no operation failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterate over the failures in completion order.
    pub fn iter(&self) -> std::slice::Iter<'_, DbError> {
        self.errors.iter()
    }
}

fn summarize(errors: &[DbError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::invalid_config(msg.to_string()),
            sqlx::Error::Database(db_err) => DbError::Database {
                message: db_err.message().to_string(),
                sql_state: db_err.code().map(|c| c.to_string()),
                constraint: db_err.constraint().map(String::from),
            },
            sqlx::Error::RowNotFound => DbError::RowNotFound,
            sqlx::Error::PoolTimedOut => DbError::connection_failed(
                "Timed out acquiring a pooled connection",
                "Increase acquire_timeout or max_connections",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection_failed("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection_failed(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection_failed(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection_failed(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::database(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
