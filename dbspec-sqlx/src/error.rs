//! Error types for the SQLx connector.

use dbspec_core::ConfigError;
use thiserror::Error;

/// Result type alias for SQLx operations.
pub type SqlxResult<T> = Result<T, SqlxError>;

/// Errors that can occur while building or checking a SQLx pool.
#[derive(Error, Debug)]
pub enum SqlxError {
    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The connection target cannot be turned into pool settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The backend named by the target is not compiled in.
    #[error("Database backend {0} not enabled. Enable the corresponding feature.")]
    BackendDisabled(&'static str),
}

impl SqlxError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<SqlxError> for ConfigError {
    fn from(err: SqlxError) -> Self {
        ConfigError::establish(err.to_string())
    }
}
