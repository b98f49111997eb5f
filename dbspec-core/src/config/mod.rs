//! Configuration sources: the process environment, template expansion and
//! the YAML configuration file.
//!
//! # Loading a configuration file
//!
//! ```rust
//! use dbspec_core::config::{parse_document, EnvTemplate, MapEnvSource, TemplateEngine};
//!
//! let env = MapEnvSource::new().set("DB_NAME", "app_dev");
//! let text = EnvTemplate::with_source(env)
//!     .render("development:\n  adapter: sqlite3\n  database: ${DB_NAME}\n")
//!     .unwrap();
//! let file = parse_document(&text).unwrap();
//! assert_eq!(file.len(), 1);
//! ```

mod env;
mod loader;
mod parser;
mod template;

pub use env::{
    DATABASE_URL, DEFAULT_ENVIRONMENT, ENVIRONMENT_VARS, EnvSource, MapEnvSource, StdEnvSource,
    database_url, environment_name,
};
pub use loader::{ConfigLoader, DEFAULT_CONFIG_PATH};
pub use parser::parse_document;
pub use template::{EnvTemplate, PlainText, TemplateEngine};
