//! Integration tests for configuration loading and resolution.
//!
//! These tests write real configuration files and run them through
//! template expansion, parsing and spec resolution.

use dbspec::config::{ConfigLoader, EnvTemplate, MapEnvSource, DEFAULT_CONFIG_PATH};
use dbspec::connection::{Bootstrap, Capability, ConnectionSpec, SpecResolver};
use dbspec::{ConfigError, Mapping, Value, mapping};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

const DATABASE_YML: &str = r#"
default: &default
  adapter: postgresql
  encoding: unicode
  pool: ${DB_POOL:-5}

development:
  <<: *default
  database: app_development

test:
  <<: *default
  database: app_test

production:
  primary:
    <<: *default
    database: app_production
    password: ${APP_DATABASE_PASSWORD}
  cache:
    <<: *default
    database: app_cache
"#;

fn write_config(root: &Path, contents: &str) {
    let path = root.join(DEFAULT_CONFIG_PATH);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn loader(root: &Path, env: MapEnvSource) -> ConfigLoader {
    ConfigLoader::new()
        .with_root(root)
        .with_template(EnvTemplate::with_source(env))
}

fn env() -> MapEnvSource {
    MapEnvSource::new().set("APP_DATABASE_PASSWORD", "s3cret")
}

fn entry<'a>(spec: &'a ConnectionSpec, environment: &str) -> &'a Mapping {
    spec.environment(environment)
        .and_then(Value::as_map)
        .unwrap_or_else(|| panic!("no mapping for {environment}"))
}

/// Templates are expanded and merge keys applied before resolution.
#[test]
fn test_file_with_templates_and_anchors() {
    let root = tempfile::tempdir().unwrap();
    write_config(root.path(), DATABASE_YML);

    let file = loader(root.path(), env()).load(DEFAULT_CONFIG_PATH).unwrap();
    let spec = SpecResolver::default()
        .resolve(Some(file), None, "development")
        .unwrap()
        .unwrap();

    let development = entry(&spec, "development");
    assert_eq!(development.get("adapter"), Some(&Value::from("postgresql")));
    assert_eq!(development.get("pool"), Some(&Value::Integer(5)));
    assert_eq!(development.get("database"), Some(&Value::from("app_development")));
}

/// The URL wins over file keys in single-database environments only.
#[test]
fn test_database_url_overrides_file() {
    let root = tempfile::tempdir().unwrap();
    write_config(root.path(), DATABASE_YML);
    let file = loader(root.path(), env().set("DB_POOL", "12"))
        .load(DEFAULT_CONFIG_PATH)
        .unwrap();
    let production_before = file.get("production").cloned();

    let url = "postgres://deploy:pw@db.internal:6432/app_live?sslmode=require";
    let spec = SpecResolver::default()
        .resolve(Some(file), Some(url), "test")
        .unwrap()
        .unwrap();

    let test = entry(&spec, "test");
    assert_eq!(test.get("host"), Some(&Value::from("db.internal")));
    assert_eq!(test.get("port"), Some(&Value::Integer(6432)));
    assert_eq!(test.get("database"), Some(&Value::from("app_live")));
    assert_eq!(test.get("adapter"), Some(&Value::from("postgres")));
    assert_eq!(test.get("pool"), Some(&Value::Integer(12)));
    assert_eq!(test.get("encoding"), Some(&Value::from("unicode")));

    // Other single-database environments are merged too.
    assert_eq!(entry(&spec, "development").get("database"), Some(&Value::from("app_live")));

    // Multi-database production is untouched.
    assert_eq!(spec.environment("production").cloned(), production_before);
}

/// A required variable that is unset fails at load time.
#[test]
fn test_missing_required_variable() {
    let root = tempfile::tempdir().unwrap();
    write_config(root.path(), "production:\n  password: ${DB_PASSWORD:?must be set}\n");

    let err = loader(root.path(), MapEnvSource::new())
        .load(DEFAULT_CONFIG_PATH)
        .unwrap_err();
    assert!(matches!(err, ConfigError::TemplateExpansion { .. }));
    assert!(err.to_string().contains("must be set"));
}

/// An empty file is an empty configuration, not an error.
#[test]
fn test_empty_file() {
    let root = tempfile::tempdir().unwrap();
    write_config(root.path(), "# nothing configured yet\n");

    let file = loader(root.path(), MapEnvSource::new()).load(DEFAULT_CONFIG_PATH).unwrap();
    assert!(file.is_empty());

    let spec = SpecResolver::default().resolve(Some(file), None, "development").unwrap();
    assert_eq!(spec, Some(ConnectionSpec::Flat(Mapping::new())));
}

/// Startup discovery picks the file, the URL, or both.
#[test]
fn test_bootstrap_precedence() {
    let root = tempfile::tempdir().unwrap();
    write_config(
        root.path(),
        "development:\n  adapter: sqlite3\n  database: db/development.sqlite3\n",
    );

    let file_only = Bootstrap::with_source(MapEnvSource::new())
        .root(root.path())
        .discover()
        .unwrap();
    assert_eq!(
        file_only.spec,
        Some(ConnectionSpec::PerEnvironment(mapping! {
            "development" => mapping! {
                "adapter" => "sqlite3",
                "database" => "db/development.sqlite3",
            },
        }))
    );

    let with_url = Bootstrap::with_source(MapEnvSource::new().set("DATABASE_URL", "sqlite3:db/override.sqlite3"))
        .root(root.path())
        .capability(Capability::Legacy)
        .discover()
        .unwrap();
    let spec = with_url.spec.unwrap();
    assert_eq!(
        entry(&spec, "development").get("database"),
        Some(&Value::from("db/override.sqlite3"))
    );
}

/// A malformed URL is reported without leaking the password.
#[test]
fn test_malformed_url_is_redacted() {
    let file = mapping! { "development" => mapping! { "adapter" => "sqlite3" } };
    let err = SpecResolver::new(Capability::Legacy)
        .resolve(Some(file), Some("postgres://app:hunter2@db:notaport/app"), "development")
        .unwrap_err();

    assert!(matches!(err, ConfigError::MalformedUrl { .. }));
    assert!(!err.to_string().contains("hunter2"));
}
