//! What a connector is asked to connect to.

use super::registry::DatabaseEntry;
use super::url::{Capability, percent_encode};
use crate::error::ConfigResult;
use crate::value::{Mapping, Value};
use std::time::Duration;

/// Attributes that describe where the database is. Everything else is an
/// adapter option.
const LOCATION_KEYS: [&str; 7] = [
    "adapter", "username", "password", "host", "port", "database", "url",
];

/// A single database to connect to, with its attributes fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionTarget {
    /// Environment the target was selected for.
    pub environment: String,
    /// Logical database name.
    pub name: String,
    /// Connection attributes.
    pub attributes: Mapping,
    /// The URL the attributes came from, when the spec was a bare URL.
    pub url: Option<String>,
}

impl ConnectionTarget {
    /// Build a target from a registry entry.
    ///
    /// A `url` attribute inside the entry is decomposed and sits underneath
    /// the explicitly listed attributes.
    pub fn from_entry(entry: DatabaseEntry<'_>, capability: Capability) -> ConfigResult<Self> {
        let attributes = match entry.attributes.get("url").and_then(Value::as_str) {
            Some(url) => {
                let mut attributes = capability.decompose(url)?;
                attributes.extend(
                    entry
                        .attributes
                        .iter()
                        .filter(|(key, _)| key.as_str() != "url")
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                attributes
            }
            None => entry.attributes.clone(),
        };

        Ok(Self {
            environment: entry.environment.to_string(),
            name: entry.name.to_string(),
            attributes,
            url: None,
        })
    }

    /// Build a target from a bare connection URL.
    pub fn from_url(
        environment: impl Into<String>,
        url: impl Into<String>,
        capability: Capability,
    ) -> ConfigResult<Self> {
        let url = url.into();
        let attributes = capability.decompose(&url)?;
        Ok(Self {
            environment: environment.into(),
            name: super::registry::PRIMARY.to_string(),
            attributes,
            url: Some(url),
        })
    }

    /// Get an attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Get a string attribute.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// The adapter name.
    pub fn adapter(&self) -> Option<&str> {
        self.get_str("adapter")
    }

    /// The host.
    pub fn host(&self) -> Option<&str> {
        self.get_str("host")
    }

    /// The port.
    pub fn port(&self) -> Option<u16> {
        self.get("port")
            .and_then(Value::as_i64)
            .and_then(|p| u16::try_from(p).ok())
    }

    /// The database name, or file path for SQLite.
    pub fn database(&self) -> Option<&str> {
        self.get_str("database")
    }

    /// The username.
    pub fn username(&self) -> Option<&str> {
        self.get_str("username")
    }

    /// The password.
    pub fn password(&self) -> Option<&str> {
        self.get_str("password")
    }

    /// Maximum pool size (`pool`).
    pub fn pool_size(&self) -> Option<u32> {
        self.get("pool")
            .and_then(Value::as_i64)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// A duration attribute given in seconds.
    pub fn seconds(&self, key: &str) -> Option<Duration> {
        self.get(key)
            .and_then(Value::as_f64)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
    }

    /// Attributes that are not part of the database location.
    pub fn options(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes
            .iter()
            .filter(|(key, _)| !LOCATION_KEYS.contains(&key.as_str()))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Build a URL for `scheme` from the attributes.
    ///
    /// Options for which `include_option` returns false are left out of the
    /// query string. Without a host the database is appended verbatim, which
    /// is what file-based adapters expect.
    pub fn url_with_scheme(&self, scheme: &str, include_option: impl Fn(&str) -> bool) -> String {
        let mut url = format!("{scheme}://");

        if let Some(user) = self.username() {
            url.push_str(&percent_encode(user));
            if let Some(pass) = self.password() {
                url.push(':');
                url.push_str(&percent_encode(pass));
            }
            url.push('@');
        }

        if let Some(host) = self.host() {
            if host.contains(':') {
                url.push_str(&format!("[{host}]"));
            } else {
                url.push_str(host);
            }
            if let Some(port) = self.port() {
                url.push(':');
                url.push_str(&port.to_string());
            }
        }

        if let Some(db) = self.database() {
            if self.host().is_some() && !db.starts_with('/') {
                url.push('/');
            }
            url.push_str(db);
        }

        let params: Vec<String> = self
            .options()
            .filter(|(key, _)| include_option(key))
            .filter_map(|(key, value)| {
                value
                    .to_scalar_string()
                    .map(|v| format!("{}={}", percent_encode(key), percent_encode(&v)))
            })
            .collect();
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }

        url
    }

    /// The URL this target was built from, or one rebuilt from its
    /// attributes using the adapter as scheme.
    pub fn to_url(&self) -> String {
        match (&self.url, self.adapter()) {
            (Some(url), _) => url.clone(),
            (None, Some(adapter)) => self.url_with_scheme(adapter, |_| true),
            (None, None) => self.url_with_scheme("unknown", |_| true),
        }
    }
}
