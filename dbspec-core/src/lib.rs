//! # dbspec-core
//!
//! Database connection configuration for server processes.
//!
//! This crate decides how an application connects to its database:
//! - Configuration file loading with environment-variable templates
//! - `DATABASE_URL` decomposition into connection attributes
//! - Resolution of file and URL sources into one [`ConnectionSpec`]
//! - A configuration registry with multi-database environments
//! - Applying a spec through a pluggable [`Connector`]
//!
//! ## Resolving and Applying
//!
//! ```rust,ignore
//! use dbspec_core::connection::{Bootstrap, DatabaseSettings};
//!
//! let bootstrap = Bootstrap::new();
//! let settings = DatabaseSettings::register(connector, &bootstrap).await?;
//!
//! // Per request
//! let database = settings.database();
//! let mut handle = database.checkout()?;
//! // ...
//! database.release(&mut handle).await;
//! ```
//!
//! ## Configuration Values
//!
//! Parsed configuration is a tree of [`Value`]s keyed by string:
//!
//! ```rust
//! use dbspec_core::{mapping, Value};
//!
//! let config = mapping! {
//!     "adapter" => "postgresql",
//!     "pool" => 5i64,
//! };
//! assert_eq!(config.get("pool").and_then(Value::as_i64), Some(5));
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod logging;
pub mod value;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{ConfigLoader, EnvSource, EnvTemplate, MapEnvSource, StdEnvSource};
pub use connection::{
    Bootstrap, Capability, ConfigurationRegistry, ConnectionHandle, ConnectionSpec,
    ConnectionTarget, Connector, Database, DatabaseSettings, HandleState, SpecResolver,
};
pub use error::{ConfigError, ConfigResult};
pub use value::{Mapping, Value, is_multi_database};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{ConfigLoader, EnvSource, StdEnvSource};
    pub use crate::connection::{
        Bootstrap, Capability, ConnectionHandle, ConnectionSpec, ConnectionTarget, Connector,
        Database, DatabaseSettings,
    };
    pub use crate::error::{ConfigError, ConfigResult};
    pub use crate::mapping;
    pub use crate::value::{Mapping, Value};
}
