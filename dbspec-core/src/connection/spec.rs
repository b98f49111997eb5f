//! The resolved connection specification.

use crate::value::{Mapping, Value};
use std::fmt;

/// How to connect, in exactly one of three shapes.
///
/// The resolver decides the shape; everything downstream matches on the
/// variant instead of inspecting the payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionSpec {
    /// Environment name to either a flat attribute mapping or, for
    /// multi-database setups, logical database name to attribute mapping.
    PerEnvironment(Mapping),
    /// One attribute mapping, scoped to whatever environment is running.
    Flat(Mapping),
    /// A connection URL, decomposed only when the spec is applied.
    Url(String),
}

impl ConnectionSpec {
    /// Tag a mapping for `environment`.
    ///
    /// A mapping is per-environment when it has an entry for `environment`
    /// or when every value is itself a mapping. Anything else, including an
    /// empty mapping, is a single flat configuration.
    pub fn from_mapping(mapping: Mapping, environment: &str) -> Self {
        let keyed_by_environment = mapping.contains_key(environment)
            || (!mapping.is_empty() && mapping.values().all(Value::is_map));
        if keyed_by_environment {
            Self::PerEnvironment(mapping)
        } else {
            Self::Flat(mapping)
        }
    }

    /// Short name of the shape, for logs.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::PerEnvironment(_) => "per-environment",
            Self::Flat(_) => "flat",
            Self::Url(_) => "url",
        }
    }

    /// Borrow the mapping payload, if this spec has one.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::PerEnvironment(map) | Self::Flat(map) => Some(map),
            Self::Url(_) => None,
        }
    }

    /// The entry for `environment` in a per-environment spec.
    pub fn environment(&self, environment: &str) -> Option<&Value> {
        match self {
            Self::PerEnvironment(map) => map.get(environment),
            _ => None,
        }
    }
}

impl From<String> for ConnectionSpec {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<&str> for ConnectionSpec {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl fmt::Display for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PerEnvironment(map) => {
                let names: Vec<&str> = map.keys().map(String::as_str).collect();
                write!(f, "per-environment [{}]", names.join(", "))
            }
            Self::Flat(map) => write!(f, "flat ({} attributes)", map.len()),
            Self::Url(_) => write!(f, "url"),
        }
    }
}
