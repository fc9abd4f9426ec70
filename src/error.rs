//! Error types for the database driver.
//!
//! Every failure the driver can report is a variant of [`DriverError`]. Bind-time
//! problems (bad parameter index, wrong value type) are reported synchronously by
//! the binding call; backend problems keep the server's message and SQLSTATE.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Invalid connection URL: {message}")]
    InvalidUrl { message: String },

    #[error("No suitable driver found for '{url}'")]
    NoSuitableDriver { url: String },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Connection is busy: another statement is still executing")]
    ConnectionBusy,

    #[error("Statement is closed")]
    StatementClosed,

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Statement did not produce a result set")]
    NotAQuery,

    #[error("Statement produced a result set, not an update count")]
    NotAnUpdate,

    #[error("Parameter {index} has no bound value")]
    UnboundParameter { index: usize },

    #[error("Parameter index {index} is out of range (statement has {count} parameters)")]
    InvalidParameterIndex { index: usize, count: usize },

    #[error("Parameter {index} expects a {expected} value, got {actual}")]
    ParameterTypeMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid column: {column}")]
    InvalidColumn { column: String },

    #[error("Cursor is not positioned on a row")]
    CursorNotPositioned,

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout { operation: String, elapsed_secs: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DriverError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid URL error.
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }

    pub fn no_suitable_driver(url: impl Into<String>) -> Self {
        Self::NoSuitableDriver { url: url.into() }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    pub fn invalid_column(column: impl Into<String>) -> Self {
        Self::InvalidColumn {
            column: column.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::ConnectionBusy => {
                Some("Wait for the running statement or open a separate connection")
            }
            Self::UnboundParameter { .. } => Some("Bind every placeholder before executing"),
            _ => None,
        }
    }

    /// SQLSTATE reported by the backend, when the error came from the server.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Execution { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    ///
    /// The driver never retries on its own; this only classifies.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionBusy | Self::Timeout { .. }
        )
    }

    /// Errors raised while binding parameters, before anything reaches the backend.
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameterIndex { .. } | Self::ParameterTypeMismatch { .. }
        )
    }
}

/// Convert sqlx errors to DriverError.
impl From<sqlx::Error> for DriverError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DriverError::connection(
                msg.to_string(),
                "Check the connection URL format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DriverError::execution(db_err.message(), code)
            }
            sqlx::Error::Io(io_err) => DriverError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DriverError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DriverError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => DriverError::invalid_column(col),
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                DriverError::invalid_column(format!("#{} (len: {})", index + 1, len))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DriverError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                DriverError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => DriverError::internal("Database worker crashed"),
            _ => DriverError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
