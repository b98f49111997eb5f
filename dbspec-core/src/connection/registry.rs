//! The process-wide configuration registry.

use crate::value::{Mapping, Value, is_multi_database};

/// Logical name given to the database of a single-database entry.
pub const PRIMARY: &str = "primary";

/// Every configuration set known to the process, keyed by environment.
///
/// Each environment maps to either one flat attribute mapping or, in a
/// multi-database setup, a mapping of logical database name to attributes.
/// The registry is rebuilt from scratch on every apply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationRegistry {
    configurations: Mapping,
}

/// One database configuration inside an environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatabaseEntry<'a> {
    /// Environment the entry belongs to.
    pub environment: &'a str,
    /// Logical database name (`primary` for single-database entries).
    pub name: &'a str,
    /// Connection attributes.
    pub attributes: &'a Mapping,
}

impl ConfigurationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every environment of a per-environment mapping.
    pub fn from_environments(configurations: Mapping) -> Self {
        Self { configurations }
    }

    /// Register a single configuration under `environment`.
    pub fn single(environment: impl Into<String>, attributes: Mapping) -> Self {
        let mut configurations = Mapping::new();
        configurations.insert(environment.into(), Value::Map(attributes));
        Self { configurations }
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    /// Registered environment names, in declaration order.
    pub fn environments(&self) -> impl Iterator<Item = &str> {
        self.configurations.keys().map(String::as_str)
    }

    /// The raw entry for `environment`.
    pub fn get(&self, environment: &str) -> Option<&Value> {
        self.configurations.get(environment)
    }

    /// Whether `environment` has a registered entry.
    pub fn contains(&self, environment: &str) -> bool {
        self.configurations.contains_key(environment)
    }

    /// Whether `environment` is a multi-database entry.
    pub fn is_multi_database(&self, environment: &str) -> bool {
        self.get(environment).is_some_and(is_multi_database)
    }

    /// Every database configured for `environment`.
    ///
    /// A single-database entry yields one entry named [`PRIMARY`]. Values of
    /// a multi-database entry that are not mappings are skipped.
    pub fn configs_for<'a>(&'a self, environment: &'a str) -> Vec<DatabaseEntry<'a>> {
        let Some(Value::Map(entry)) = self.configurations.get(environment) else {
            return Vec::new();
        };
        if entry.is_empty() {
            return Vec::new();
        }
        if entry.values().all(Value::is_map) {
            entry
                .iter()
                .filter_map(|(name, value)| {
                    value.as_map().map(|attributes| DatabaseEntry {
                        environment,
                        name,
                        attributes,
                    })
                })
                .collect()
        } else {
            vec![DatabaseEntry {
                environment,
                name: PRIMARY,
                attributes: entry,
            }]
        }
    }

    /// The database named `name` in `environment`.
    pub fn find<'a>(&'a self, environment: &'a str, name: &str) -> Option<DatabaseEntry<'a>> {
        self.configs_for(environment)
            .into_iter()
            .find(|entry| entry.name == name)
    }

    /// The database a connection for `environment` should use: `primary`
    /// when one is named so, otherwise the first declared.
    pub fn default_for<'a>(&'a self, environment: &'a str) -> Option<DatabaseEntry<'a>> {
        let configs = self.configs_for(environment);
        configs
            .iter()
            .find(|entry| entry.name == PRIMARY)
            .or_else(|| configs.first())
            .copied()
    }

    /// Borrow the underlying mapping.
    pub fn as_mapping(&self) -> &Mapping {
        &self.configurations
    }
}
