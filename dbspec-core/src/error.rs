//! Error types for configuration loading, resolution and connection setup.
//!
//! Resolution errors (template, parse, URL) are fatal at startup and are
//! never caught inside this crate. Connection errors raised while a request
//! is being served go through one reconnect attempt first, see
//! [`Database::verify`](crate::connection::Database::verify).

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or applying a connection specification.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigFileNotFound(PathBuf),

    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template directives in the file could not be expanded.
    #[error("Template expansion failed: {message}")]
    TemplateExpansion { message: String },

    /// The expanded file content is not a valid configuration document.
    #[error("Failed to parse configuration: {message}")]
    Parse { message: String },

    /// A connection URL could not be decomposed.
    #[error("Invalid connection URL '{url}': {message}")]
    MalformedUrl { url: String, message: String },

    /// An environment entry cannot take a URL override.
    #[error("Configuration for environment '{environment}' must be a mapping")]
    InvalidEnvironmentEntry { environment: String },

    /// The connection collaborator failed to open a connection.
    #[error("Failed to establish connection: {0}")]
    ConnectionEstablish(String),

    /// A connection was requested before any specification was applied.
    #[error("No database configuration has been applied")]
    NotConfigured,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create a template expansion error.
    pub fn template(message: impl Into<String>) -> Self {
        Self::TemplateExpansion {
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a malformed URL error.
    pub fn malformed_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedUrl {
            url: redact(&url.into()),
            message: message.into(),
        }
    }

    /// Create a connection establishment error.
    pub fn establish(message: impl Into<String>) -> Self {
        Self::ConnectionEstablish(message.into())
    }

    /// Whether this error is a missing configuration file.
    ///
    /// Callers treat a missing file as "no file configuration" rather than
    /// a startup failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ConfigFileNotFound(_))
    }
}

/// Strip the password from a URL before it ends up in an error message.
fn redact(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let Some(at) = rest[..authority_end].rfind('@') else {
        return url.to_string();
    };
    match rest[..at].split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:***{}", &rest[at..]),
        None => url.to_string(),
    }
}
