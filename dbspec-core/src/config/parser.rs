//! YAML document parsing.

use crate::error::{ConfigError, ConfigResult};
use crate::value::{Mapping, Value};
use serde_yaml::Value as Yaml;
use tracing::debug;

/// Parse expanded configuration text into a nested [`Mapping`].
///
/// An empty document (or one containing only `~`) yields an empty mapping.
/// Merge keys (`<<: *default`) are applied before conversion, and every
/// mapping key is normalized to a string.
///
/// ```rust
/// use dbspec_core::config::parse_document;
///
/// let doc = parse_document("development:\n  adapter: sqlite3\n  pool: 5\n").unwrap();
/// assert!(doc.contains_key("development"));
/// ```
pub fn parse_document(text: &str) -> ConfigResult<Mapping> {
    let mut yaml: Yaml =
        serde_yaml::from_str(text).map_err(|e| ConfigError::parse(e.to_string()))?;
    yaml.apply_merge()
        .map_err(|e| ConfigError::parse(e.to_string()))?;

    match convert(yaml)? {
        Value::Null => Ok(Mapping::new()),
        Value::Map(map) => {
            debug!(keys = map.len(), "Configuration document parsed");
            Ok(map)
        }
        other => Err(ConfigError::parse(format!(
            "expected a mapping at the document root, found {}",
            kind(&other)
        ))),
    }
}

fn convert(yaml: Yaml) -> ConfigResult<Value> {
    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::List(
            items
                .into_iter()
                .map(convert)
                .collect::<ConfigResult<Vec<_>>>()?,
        ),
        Yaml::Mapping(entries) => {
            let mut map = Mapping::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(normalize_key(key)?, convert(value)?);
            }
            Value::Map(map)
        }
        Yaml::Tagged(tagged) => convert(tagged.value)?,
    })
}

fn normalize_key(key: Yaml) -> ConfigResult<String> {
    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Null => Ok(String::new()),
        Yaml::Tagged(tagged) => normalize_key(tagged.value),
        Yaml::Sequence(_) | Yaml::Mapping(_) => Err(ConfigError::parse(
            "mapping keys must be scalars",
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Integer(_) | Value::Float(_) => "a number",
        Value::String(_) => "a string",
        Value::List(_) => "a list",
        Value::Map(_) => "a mapping",
    }
}
