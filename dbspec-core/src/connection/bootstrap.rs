//! Startup discovery of the connection specification.

use super::resolver::SpecResolver;
use super::spec::ConnectionSpec;
use super::url::Capability;
use crate::config::{
    ConfigLoader, EnvSource, EnvTemplate, StdEnvSource, database_url, environment_name,
};
use crate::error::ConfigResult;
use std::path::PathBuf;
use tracing::{debug, info};

/// What startup discovery found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Discovery {
    /// The spec to apply, if anything is configured.
    pub spec: Option<ConnectionSpec>,
    /// The configuration file the spec was read from.
    pub database_file: Option<PathBuf>,
}

/// Finds the connection specification for an application at startup.
///
/// Looks at `DATABASE_URL` and `<root>/config/database.yml`:
///
/// - both present: the file, with the URL merged in
/// - URL only: the URL
/// - file only: the file
/// - neither: nothing is configured
///
/// ```rust
/// use dbspec_core::config::MapEnvSource;
/// use dbspec_core::connection::{Bootstrap, ConnectionSpec};
///
/// let env = MapEnvSource::new()
///     .set("RACK_ENV", "production")
///     .set("DATABASE_URL", "postgres://app@db/app");
/// let bootstrap = Bootstrap::with_source(env).root("/nonexistent");
///
/// let discovery = bootstrap.discover().unwrap();
/// assert_eq!(bootstrap.environment(), "production");
/// assert_eq!(discovery.spec, Some(ConnectionSpec::from("postgres://app@db/app")));
/// ```
#[derive(Debug, Clone)]
pub struct Bootstrap<S: EnvSource = StdEnvSource> {
    source: S,
    loader: ConfigLoader,
    capability: Capability,
    environment: String,
}

impl Bootstrap<StdEnvSource> {
    /// Discover from the process environment and working directory.
    pub fn new() -> Self {
        let bootstrap = Self::with_source(StdEnvSource);
        match std::env::current_dir() {
            Ok(dir) => bootstrap.root(dir),
            Err(_) => bootstrap,
        }
    }
}

impl Default for Bootstrap<StdEnvSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EnvSource + Clone + 'static> Bootstrap<S> {
    /// Discover from `source`. The environment name and the file's
    /// `${VAR}` templates are read from it too.
    pub fn with_source(source: S) -> Self {
        let environment = environment_name(&source);
        let loader = ConfigLoader::new().with_template(EnvTemplate::with_source(source.clone()));
        Self {
            source,
            loader,
            capability: Capability::default(),
            environment,
        }
    }
}

impl<S: EnvSource> Bootstrap<S> {
    /// Application root the configuration file is looked up under.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.loader = self.loader.with_root(root);
        self
    }

    /// Use `loader` for the configuration file, replacing its template
    /// engine and root.
    pub fn loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// URL decomposition strategy.
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }

    /// Override the environment name.
    pub fn environment_name(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// The running environment.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// The configured capability.
    pub fn configured_capability(&self) -> Capability {
        self.capability
    }

    /// The configuration loader.
    pub fn config_loader(&self) -> &ConfigLoader {
        &self.loader
    }

    /// Look for configuration.
    ///
    /// A missing file is not an error; an unreadable or invalid one is.
    pub fn discover(&self) -> ConfigResult<Discovery> {
        let url = database_url(&self.source);
        let path = self.loader.default_path();
        let file = self.loader.load_optional(&path)?;
        let database_file = file.is_some().then_some(path);

        debug!(
            environment = %self.environment,
            url = url.is_some(),
            file = database_file.is_some(),
            "Discovering database configuration"
        );

        let spec = SpecResolver::new(self.capability).resolve(file, url.as_deref(), &self.environment)?;
        if spec.is_none() {
            info!(environment = %self.environment, "No database configuration found");
        }

        Ok(Discovery {
            spec,
            database_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_CONFIG_PATH, MapEnvSource};
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    const FILE: &str = "\
development:
  adapter: sqlite3
  database: db/development.sqlite3
production:
  primary:
    adapter: postgresql
  replica:
    adapter: postgresql
";

    fn app_root(file: Option<&str>) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        if let Some(contents) = file {
            let path = dir.path().join(DEFAULT_CONFIG_PATH);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        dir
    }

    #[test]
    fn test_url_and_file_are_merged() {
        let root = app_root(Some(FILE));
        let env = MapEnvSource::new().set("DATABASE_URL", "postgres://app@db.internal/app");
        let discovery = Bootstrap::with_source(env).root(root.path()).discover().unwrap();

        let spec = discovery.spec.unwrap();
        let development = spec.environment("development").and_then(Value::as_map).unwrap();
        assert_eq!(development.get("host"), Some(&Value::from("db.internal")));
        assert_eq!(development.get("adapter"), Some(&Value::from("postgres")));
        assert_eq!(
            discovery.database_file,
            Some(root.path().join(DEFAULT_CONFIG_PATH))
        );
    }

    #[test]
    fn test_url_only() {
        let root = app_root(None);
        let env = MapEnvSource::new().set("DATABASE_URL", "mysql2://root@localhost/app");
        let discovery = Bootstrap::with_source(env).root(root.path()).discover().unwrap();

        assert_eq!(discovery.spec, Some(ConnectionSpec::from("mysql2://root@localhost/app")));
        assert_eq!(discovery.database_file, None);
    }

    #[test]
    fn test_file_only() {
        let root = app_root(Some(FILE));
        let bootstrap = Bootstrap::with_source(MapEnvSource::new()).root(root.path());
        let discovery = bootstrap.discover().unwrap();

        assert_eq!(bootstrap.environment(), "development");
        assert_eq!(discovery.spec.unwrap().shape(), "per-environment");
    }

    #[test]
    fn test_nothing_configured() {
        let root = app_root(None);
        let env = MapEnvSource::new().set("DATABASE_URL", "  ");
        let discovery = Bootstrap::with_source(env).root(root.path()).discover().unwrap();
        assert_eq!(discovery, Discovery::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let root = app_root(Some("- just\n- a list\n"));
        let result = Bootstrap::with_source(MapEnvSource::new())
            .root(root.path())
            .discover();
        assert!(result.is_err());
    }

    #[test]
    fn test_file_templates_read_the_same_source() {
        let root = app_root(Some(
            "development:\n  adapter: postgresql\n  host: ${DBSPEC_BOOTSTRAP_HOST}\n",
        ));
        let env = MapEnvSource::new().set("DBSPEC_BOOTSTRAP_HOST", "db.harness");
        let discovery = Bootstrap::with_source(env).root(root.path()).discover().unwrap();

        let spec = discovery.spec.unwrap();
        let development = spec.environment("development").and_then(Value::as_map).unwrap();
        assert_eq!(development.get("host"), Some(&Value::from("db.harness")));
    }

    #[test]
    fn test_environment_override() {
        let env = MapEnvSource::new().set("RACK_ENV", "test");
        let bootstrap = Bootstrap::with_source(env).environment_name("staging");
        assert_eq!(bootstrap.environment(), "staging");
    }
}
