//! Application-facing database settings.

use super::applier::{ConnectionHandle, Connector, Database};
use super::bootstrap::Bootstrap;
use super::spec::ConnectionSpec;
use super::url::Capability;
use crate::config::{ConfigLoader, EnvSource};
use crate::error::ConfigResult;
use crate::logging;
use crate::value::Mapping;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Database settings of one application.
///
/// Owns the shared [`Database`] and remembers where its configuration came
/// from. Cloning is cheap and every clone sees the same database.
pub struct DatabaseSettings<C: Connector> {
    database: Arc<Database<C>>,
    loader: ConfigLoader,
    environment: String,
    verify_before_request: bool,
    database_file: Arc<RwLock<Option<PathBuf>>>,
}

impl<C: Connector> Clone for DatabaseSettings<C> {
    fn clone(&self) -> Self {
        Self {
            database: Arc::clone(&self.database),
            loader: self.loader.clone(),
            environment: self.environment.clone(),
            verify_before_request: self.verify_before_request,
            database_file: Arc::clone(&self.database_file),
        }
    }
}

impl<C: Connector> std::fmt::Debug for DatabaseSettings<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("environment", &self.environment)
            .field("verify_before_request", &self.verify_before_request)
            .field("database_file", &*self.database_file.read())
            .field("database", &self.database)
            .finish()
    }
}

impl<C: Connector> DatabaseSettings<C> {
    /// Unconfigured settings for `environment`.
    ///
    /// Pre-request verification defaults to what `capability` calls for.
    pub fn new(connector: C, capability: Capability, environment: impl Into<String>) -> Self {
        Self {
            database: Arc::new(Database::new(connector, capability)),
            loader: ConfigLoader::new(),
            environment: environment.into(),
            verify_before_request: capability.verifies_before_request(),
            database_file: Arc::new(RwLock::new(None)),
        }
    }

    /// Register with an application: discover configuration, turn on stdout
    /// logging where appropriate and connect if anything was found.
    pub async fn register<S: EnvSource>(connector: C, bootstrap: &Bootstrap<S>) -> ConfigResult<Self> {
        let settings = Self::new(
            connector,
            bootstrap.configured_capability(),
            bootstrap.environment(),
        )
        .with_loader(bootstrap.config_loader().clone());

        logging::init_for_environment(&settings.environment);

        let discovery = bootstrap.discover()?;
        *settings.database_file.write() = discovery.database_file;
        if let Some(spec) = discovery.spec {
            let mut handle = settings.set_database(spec).await?;
            settings.database.release(&mut handle).await;
        }
        Ok(settings)
    }

    /// Resolve relative configuration paths with `loader`.
    pub fn with_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Turn the pre-request liveness check on or off.
    pub fn with_verify_before_request(mut self, verify: bool) -> Self {
        self.verify_before_request = verify;
        self
    }

    /// The shared database.
    pub fn database(&self) -> &Arc<Database<C>> {
        &self.database
    }

    /// The running environment.
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Whether requests check the connection before running.
    pub fn verify_before_request(&self) -> bool {
        self.verify_before_request
    }

    /// The configuration file last loaded, if any.
    pub fn database_file(&self) -> Option<PathBuf> {
        self.database_file.read().clone()
    }

    /// Apply `spec` for the running environment.
    pub async fn set_database(
        &self,
        spec: impl Into<ConnectionSpec>,
    ) -> ConfigResult<ConnectionHandle<C::Pool>> {
        self.database.apply(spec.into(), &self.environment).await
    }

    /// Apply a configuration mapping, tagged per-environment or flat by
    /// [`ConnectionSpec::from_mapping`].
    pub async fn set_database_config(
        &self,
        config: Mapping,
    ) -> ConfigResult<ConnectionHandle<C::Pool>> {
        let spec = ConnectionSpec::from_mapping(config, &self.environment);
        self.set_database(spec).await
    }

    /// Load the configuration file at `path` and apply it.
    ///
    /// Relative paths are resolved against the application root.
    pub async fn set_database_file(
        &self,
        path: impl AsRef<Path>,
    ) -> ConfigResult<ConnectionHandle<C::Pool>> {
        let path = self.loader.resolve_path(path);
        let config = self.loader.load(&path)?;
        info!(path = %path.display(), "Using database configuration file");

        let handle = self.set_database_config(config).await?;
        *self.database_file.write() = Some(path);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapEnvSource;
    use crate::mapping;
    use crate::testing::MemoryConnector;
    use std::fs;

    fn settings() -> DatabaseSettings<MemoryConnector> {
        DatabaseSettings::new(MemoryConnector::new(), Capability::Current, "test")
    }

    #[test]
    fn test_verify_default_follows_capability() {
        assert!(!settings().verify_before_request());
        let legacy = DatabaseSettings::new(MemoryConnector::new(), Capability::Legacy, "test");
        assert!(legacy.verify_before_request());
        assert!(!legacy.with_verify_before_request(false).verify_before_request());
    }

    #[tokio::test]
    async fn test_set_database_config_dispatches_on_environment_key() {
        let settings = settings();
        settings
            .set_database_config(mapping! {
                "test" => mapping! { "adapter" => "sqlite3", "database" => "test.db" },
                "development" => mapping! { "adapter" => "sqlite3" },
            })
            .await
            .unwrap();
        assert!(settings.database().registry().unwrap().contains("development"));

        settings
            .set_database_config(mapping! { "adapter" => "sqlite3", "database" => "flat.db" })
            .await
            .unwrap();
        let registry = settings.database().registry().unwrap();
        assert!(!registry.contains("development"));
        assert!(registry.contains("test"));
    }

    #[tokio::test]
    async fn test_set_database_file_resolves_relative_paths() {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            root.path().join("db.yml"),
            "test:\n  adapter: sqlite3\n  database: test.db\n",
        )
        .unwrap();

        let settings = settings().with_loader(ConfigLoader::new().with_root(root.path()));
        settings.set_database_file("db.yml").await.unwrap();

        assert_eq!(settings.database_file(), Some(root.path().join("db.yml")));
        assert_eq!(settings.database().target().unwrap().database(), Some("test.db"));
    }

    #[tokio::test]
    async fn test_set_database_file_missing() {
        let settings = settings();
        let err = settings.set_database_file("/nonexistent/db.yml").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(settings.database_file(), None);
    }

    #[tokio::test]
    async fn test_register_connects_and_returns_the_connection() {
        let env = MapEnvSource::new()
            .set("RACK_ENV", "test")
            .set("DATABASE_URL", "sqlite3:db/test.sqlite3");
        let bootstrap = Bootstrap::with_source(env).root("/nonexistent");
        let settings = DatabaseSettings::register(MemoryConnector::new(), &bootstrap)
            .await
            .unwrap();

        let connector = settings.database().connector();
        assert_eq!(connector.established(), 1);
        assert_eq!(connector.released(), 1);
        assert_eq!(settings.database().environment().as_deref(), Some("test"));
    }

    #[tokio::test]
    async fn test_register_without_configuration() {
        let bootstrap = Bootstrap::with_source(MapEnvSource::new()).root("/nonexistent");
        let settings = DatabaseSettings::register(MemoryConnector::new(), &bootstrap)
            .await
            .unwrap();
        assert!(!settings.database().is_configured());
    }
}
