//! # dbspec
//!
//! Database connection configuration for server processes.
//!
//! dbspec decides which database an application talks to from three
//! sources: `config/database.yml`, the `DATABASE_URL` variable and the
//! running environment. It provides:
//! - A YAML configuration file with `${VAR}` templates and merge keys
//! - `DATABASE_URL` overrides merged into single-database environments
//! - Multi-database environments that never take a URL override
//! - SQLx connection pools (PostgreSQL, MySQL, SQLite)
//! - Axum request hooks that verify and release connections
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use axum::{Router, routing::get};
//! use dbspec::prelude::*;
//! use dbspec::sqlx::SqlxConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DbspecAxumError> {
//!     dbspec::logging::init();
//!
//!     let settings = DatabaseSettingsBuilder::new(SqlxConnector::new()).build().await?;
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "ok" }))
//!         .layer(DatabaseLayer::new(settings.clone()))
//!         .with_state(settings);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use dbspec_core::{config, connection, error, logging, mapping, value};

/// SQLx connection pools.
#[cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "postgres", feature = "mysql", feature = "sqlite"))))]
pub mod sqlx {
    pub use dbspec_sqlx::*;
}

/// Axum integration.
#[cfg(feature = "axum")]
#[cfg_attr(docsrs, doc(cfg(feature = "axum")))]
pub mod axum {
    pub use dbspec_axum::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    #[cfg(feature = "axum")]
    pub use dbspec_axum::prelude::*;
    pub use dbspec_core::prelude::*;
}

// Re-export key types at the crate root
pub use dbspec_core::{
    Bootstrap, Capability, ConfigError, ConfigResult, ConfigurationRegistry, ConnectionHandle,
    ConnectionSpec, ConnectionTarget, Connector, Database, DatabaseSettings, Mapping, Value,
};
