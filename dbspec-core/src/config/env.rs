//! Process environment access.

use std::collections::HashMap;

/// Variable holding the connection URL override.
pub const DATABASE_URL: &str = "DATABASE_URL";

/// Variables consulted, in order, for the environment name.
pub const ENVIRONMENT_VARS: [&str; 2] = ["APP_ENV", "RACK_ENV"];

/// Environment name used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Source for environment variables.
pub trait EnvSource: Send + Sync {
    /// Get an environment variable value.
    fn get(&self, name: &str) -> Option<String>;

    /// Check if a variable exists.
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get a variable, treating blank values as unset.
    fn get_non_blank(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.trim().is_empty())
    }
}

/// Default environment source using std::env.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Environment source backed by a HashMap.
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    /// Create a new map-based environment source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Add multiple variables.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars.extend(vars);
        self
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl<S: EnvSource + ?Sized> EnvSource for &S {
    fn get(&self, name: &str) -> Option<String> {
        (**self).get(name)
    }
}

/// Name of the running environment, from `APP_ENV`, then `RACK_ENV`,
/// falling back to `development`.
pub fn environment_name(source: &impl EnvSource) -> String {
    ENVIRONMENT_VARS
        .iter()
        .find_map(|var| source.get_non_blank(var))
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string())
}

/// The connection URL override, if one is set and not blank.
pub fn database_url(source: &impl EnvSource) -> Option<String> {
    source.get_non_blank(DATABASE_URL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_name_precedence() {
        let source = MapEnvSource::new().set("APP_ENV", "staging").set("RACK_ENV", "test");
        assert_eq!(environment_name(&source), "staging");

        let source = MapEnvSource::new().set("RACK_ENV", "test");
        assert_eq!(environment_name(&source), "test");

        let source = MapEnvSource::new().set("APP_ENV", "  ");
        assert_eq!(environment_name(&source), DEFAULT_ENVIRONMENT);
    }

    #[test]
    fn test_blank_database_url_is_absent() {
        let source = MapEnvSource::new().set(DATABASE_URL, "");
        assert_eq!(database_url(&source), None);
        assert!(source.contains(DATABASE_URL));

        let source = MapEnvSource::new().set(DATABASE_URL, "postgres://db/app");
        assert_eq!(database_url(&source).as_deref(), Some("postgres://db/app"));
    }
}
