//! # dbspec SQLx Backend
//!
//! A [`Connector`] that opens SQLx pools for resolved connection targets.
//!
//! ## Features
//!
//! - **Adapter aliases** - `postgresql`, `mysql2`, `sqlite3` and friends map
//!   onto the SQLx drivers
//! - **Pool attributes** - `pool`, `checkout_timeout`, `idle_timeout` and
//!   the rest become pool settings instead of driver parameters
//! - **Lazy pools** - connections open on first checkout unless asked
//!   otherwise
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dbspec_core::{Bootstrap, DatabaseSettings};
//! use dbspec_sqlx::SqlxConnector;
//!
//! let settings = DatabaseSettings::register(SqlxConnector::new(), &Bootstrap::new()).await?;
//!
//! let handle = settings.database().checkout()?;
//! if let Some(pg) = handle.pool().and_then(|pool| pool.as_postgres()) {
//!     sqlx::query("SELECT 1").execute(pg).await?;
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod pool;

pub use config::{DatabaseBackend, SqlxConfig};
pub use error::{SqlxError, SqlxResult};
pub use pool::{PoolStatus, SqlxPool};

/// Re-export SQLx for convenience
pub use sqlx;

use async_trait::async_trait;
use dbspec_core::{ConfigResult, ConnectionTarget, Connector};
use tracing::{debug, info};

/// Opens SQLx pools for connection targets.
#[derive(Debug, Clone, Copy)]
pub struct SqlxConnector {
    eager: bool,
}

impl Default for SqlxConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlxConnector {
    /// A connector whose pools connect on first checkout.
    pub fn new() -> Self {
        Self { eager: false }
    }

    /// Connect as soon as the pool is created, so unreachable databases fail
    /// the apply instead of the first request.
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }

    /// The pool configuration this connector would use for `target`.
    pub fn config_for(&self, target: &ConnectionTarget) -> SqlxResult<SqlxConfig> {
        let config = SqlxConfig::from_target(target)?;
        Ok(if self.eager { config.eager() } else { config })
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    type Pool = SqlxPool;

    async fn establish(&self, target: &ConnectionTarget) -> ConfigResult<SqlxPool> {
        let config = self.config_for(target)?;
        let pool = SqlxPool::connect(&config).await?;
        info!(
            environment = %target.environment,
            database = %target.name,
            backend = %config.backend,
            max_connections = config.max_connections,
            lazy = config.lazy,
            "Connection pool created"
        );
        Ok(pool)
    }

    async fn verify(&self, pool: &SqlxPool) -> ConfigResult<()> {
        pool.ping().await?;
        Ok(())
    }

    /// Handles hold a pool clone, not a checked-out connection, so there is
    /// nothing to hand back; only the pool status is logged.
    async fn release(&self, pool: &SqlxPool) {
        let status = pool.status();
        debug!(size = status.size, idle = status.idle, "Handle released");
    }

    async fn close(&self, pool: SqlxPool) {
        pool.close().await;
        debug!(backend = %pool.backend(), "Connection pool closed");
    }
}
