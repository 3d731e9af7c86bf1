//! Error types for adapters.

use thiserror::Error;

/// Errors that can occur when talking to a backend.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for response.
    #[error("Request timed out")]
    Timeout,

    /// The remote API asked us to slow down.
    #[error("Rate limited by remote API")]
    RateLimited,

    /// A requested remote object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Adapter was configured with invalid or missing settings.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AdapterError {
    /// Whether retrying on a later pass may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::Timeout
                | AdapterError::Connection(_)
                | AdapterError::RateLimited
                | AdapterError::Http(_)
        )
    }
}

#[cfg(feature = "statuspage")]
impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout
        } else if err.is_connect() {
            AdapterError::Connection(err.to_string())
        } else if err.is_decode() {
            AdapterError::Parse(err.to_string())
        } else {
            AdapterError::Http(err.to_string())
        }
    }
}

#[cfg(feature = "mysql")]
impl From<sqlx::Error> for AdapterError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => AdapterError::Timeout,
            sqlx::Error::Io(e) => AdapterError::Connection(e.to_string()),
            sqlx::Error::Tls(e) => AdapterError::Connection(e.to_string()),
            sqlx::Error::PoolClosed => AdapterError::Connection("pool closed".to_string()),
            sqlx::Error::Configuration(e) => AdapterError::Config(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                AdapterError::Parse(err.to_string())
            }
            other => AdapterError::Query(other.to_string()),
        }
    }
}
