//! Connection pool management for SQLx.

use crate::config::{DatabaseBackend, SqlxConfig};
use crate::error::{SqlxError, SqlxResult};
use sqlx::Connection;
use std::str::FromStr;

/// A wrapper around SQLx connection pools supporting multiple databases.
#[derive(Clone, Debug)]
pub enum SqlxPool {
    /// PostgreSQL connection pool
    #[cfg(feature = "postgres")]
    Postgres(sqlx::PgPool),
    /// MySQL connection pool
    #[cfg(feature = "mysql")]
    MySql(sqlx::MySqlPool),
    /// SQLite connection pool
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqlitePool),
}

fn pool_options<DB: sqlx::Database>(config: &SqlxConfig) -> sqlx::pool::PoolOptions<DB> {
    sqlx::pool::PoolOptions::<DB>::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
}

impl SqlxPool {
    /// Create a new pool from configuration.
    ///
    /// Lazy configurations only validate the URL here; the first checkout
    /// opens the first connection.
    pub async fn connect(config: &SqlxConfig) -> SqlxResult<Self> {
        match config.backend {
            #[cfg(feature = "postgres")]
            DatabaseBackend::Postgres => {
                let options = sqlx::postgres::PgConnectOptions::from_str(&config.url)?;
                let builder = pool_options::<sqlx::Postgres>(config);
                let pool = if config.lazy {
                    builder.connect_lazy_with(options)
                } else {
                    builder.connect_with(options).await?
                };
                Ok(Self::Postgres(pool))
            }
            #[cfg(feature = "mysql")]
            DatabaseBackend::MySql => {
                let options = sqlx::mysql::MySqlConnectOptions::from_str(&config.url)?;
                let builder = pool_options::<sqlx::MySql>(config);
                let pool = if config.lazy {
                    builder.connect_lazy_with(options)
                } else {
                    builder.connect_with(options).await?
                };
                Ok(Self::MySql(pool))
            }
            #[cfg(feature = "sqlite")]
            DatabaseBackend::Sqlite => {
                let mut options = sqlx::sqlite::SqliteConnectOptions::from_str(&config.url)?
                    .create_if_missing(true);
                if let Some(timeout) = config.busy_timeout {
                    options = options.busy_timeout(timeout);
                }
                let builder = pool_options::<sqlx::Sqlite>(config);
                let pool = if config.lazy {
                    builder.connect_lazy_with(options)
                } else {
                    builder.connect_with(options).await?
                };
                Ok(Self::Sqlite(pool))
            }
            #[allow(unreachable_patterns)]
            backend => Err(SqlxError::BackendDisabled(backend.name())),
        }
    }

    /// Get the database backend type.
    pub fn backend(&self) -> DatabaseBackend {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => DatabaseBackend::Postgres,
            #[cfg(feature = "mysql")]
            Self::MySql(_) => DatabaseBackend::MySql,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => DatabaseBackend::Sqlite,
        }
    }

    /// Check out a connection and ping the server.
    pub async fn ping(&self) -> SqlxResult<()> {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => pool.acquire().await?.ping().await?,
            #[cfg(feature = "mysql")]
            Self::MySql(pool) => pool.acquire().await?.ping().await?,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => pool.acquire().await?.ping().await?,
        }
        Ok(())
    }

    /// Close the pool.
    pub async fn close(&self) {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => pool.close().await,
            #[cfg(feature = "mysql")]
            Self::MySql(pool) => pool.close().await,
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => pool.close().await,
        }
    }

    /// Check if the pool is closed.
    pub fn is_closed(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => pool.is_closed(),
            #[cfg(feature = "mysql")]
            Self::MySql(pool) => pool.is_closed(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => pool.is_closed(),
        }
    }

    /// Get the pool status.
    pub fn status(&self) -> PoolStatus {
        let (size, idle) = match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => (pool.size(), pool.num_idle()),
            #[cfg(feature = "mysql")]
            Self::MySql(pool) => (pool.size(), pool.num_idle()),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => (pool.size(), pool.num_idle()),
        };
        PoolStatus {
            size,
            idle,
            is_closed: self.is_closed(),
            backend: self.backend(),
        }
    }

    /// Get the underlying PostgreSQL pool.
    #[cfg(feature = "postgres")]
    pub fn as_postgres(&self) -> Option<&sqlx::PgPool> {
        match self {
            Self::Postgres(pool) => Some(pool),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Get the underlying MySQL pool.
    #[cfg(feature = "mysql")]
    pub fn as_mysql(&self) -> Option<&sqlx::MySqlPool> {
        match self {
            Self::MySql(pool) => Some(pool),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Get the underlying SQLite pool.
    #[cfg(feature = "sqlite")]
    pub fn as_sqlite(&self) -> Option<&sqlx::SqlitePool> {
        match self {
            Self::Sqlite(pool) => Some(pool),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// Pool status information.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    /// Total pool size
    pub size: u32,
    /// Number of idle connections
    pub idle: usize,
    /// Whether the pool is closed
    pub is_closed: bool,
    /// Database backend type
    pub backend: DatabaseBackend,
}
