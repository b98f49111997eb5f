//! Configuration file loading.

use super::parser::parse_document;
use super::template::{EnvTemplate, TemplateEngine};
use crate::error::{ConfigError, ConfigResult};
use crate::value::Mapping;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Location of the configuration file relative to the application root.
pub const DEFAULT_CONFIG_PATH: &str = "config/database.yml";

/// Reads a configuration file, expands its template directives and parses
/// the result.
///
/// # Example
///
/// ```no_run
/// use dbspec_core::config::ConfigLoader;
///
/// # fn main() -> Result<(), dbspec_core::ConfigError> {
/// let loader = ConfigLoader::new().with_root("/srv/app");
/// let file = loader.load("config/database.yml")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConfigLoader {
    root: Option<PathBuf>,
    template: Arc<dyn TemplateEngine>,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader that expands templates against the process environment.
    pub fn new() -> Self {
        Self {
            root: None,
            template: Arc::new(EnvTemplate::new()),
        }
    }

    /// Resolve relative paths against `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Use a different template engine.
    pub fn with_template(mut self, template: impl TemplateEngine + 'static) -> Self {
        self.template = Arc::new(template);
        self
    }

    /// The application root, if set.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Resolve `path` against the root when it is relative.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// The default configuration file location for this loader.
    pub fn default_path(&self) -> PathBuf {
        self.resolve_path(DEFAULT_CONFIG_PATH)
    }

    /// Load, expand and parse the file at `path`.
    ///
    /// Fails with [`ConfigError::ConfigFileNotFound`] when the file does not
    /// exist, so callers can fall back to "no file configuration".
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<Mapping> {
        let path = self.resolve_path(path);
        if !path.exists() {
            debug!(path = %path.display(), "Configuration file not found");
            return Err(ConfigError::ConfigFileNotFound(path));
        }

        let source = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let expanded = self.template.render(&source)?;
        let mapping = parse_document(&expanded)?;

        info!(
            path = %path.display(),
            entries = mapping.len(),
            "Configuration file loaded"
        );
        Ok(mapping)
    }

    /// Like [`load`](Self::load), but a missing file yields `None`.
    pub fn load_optional(&self, path: impl AsRef<Path>) -> ConfigResult<Option<Mapping>> {
        match self.load(path) {
            Ok(mapping) => Ok(Some(mapping)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
