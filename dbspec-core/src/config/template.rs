//! Template expansion for configuration files.
//!
//! Configuration files may reference the process environment so that
//! secrets stay out of version control:
//!
//! ```yaml
//! production:
//!   adapter: postgresql
//!   host: ${DB_HOST:-localhost}
//!   password: ${DB_PASSWORD:?DB_PASSWORD must be set}
//! ```
//!
//! Supported syntax:
//! - `${VAR}` - Required variable
//! - `${VAR:-default}` - Variable with default value
//! - `${VAR:?error message}` - Required with custom error
//! - `${VAR:+value}` - `value` if VAR is set, empty otherwise
//! - `$VAR` - Simple variable reference
//! - `$$` - Literal `$`

use super::env::{EnvSource, StdEnvSource};
use crate::error::{ConfigError, ConfigResult};
use std::iter::Peekable;
use std::str::Chars;

/// Expands template directives in raw file content.
pub trait TemplateEngine: Send + Sync {
    /// Render `source` into plain text.
    fn render(&self, source: &str) -> ConfigResult<String>;
}

/// Template engine expanding environment variable references.
#[derive(Debug, Clone)]
pub struct EnvTemplate<S: EnvSource = StdEnvSource> {
    source: S,
}

impl EnvTemplate<StdEnvSource> {
    /// Create a new template engine using the standard environment.
    pub fn new() -> Self {
        Self {
            source: StdEnvSource,
        }
    }
}

impl Default for EnvTemplate<StdEnvSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EnvSource> EnvTemplate<S> {
    /// Create a template engine with a custom environment source.
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    /// Expand environment variables in a string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dbspec_core::config::{EnvTemplate, MapEnvSource};
    ///
    /// let template = EnvTemplate::with_source(MapEnvSource::new().set("DB_HOST", "db"));
    /// let result = template.expand("host: ${DB_HOST}").unwrap();
    /// assert_eq!(result, "host: db");
    /// ```
    pub fn expand(&self, input: &str) -> ConfigResult<String> {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('{') => {
                    chars.next();
                    result.push_str(&self.expand_braced(&mut chars)?);
                }
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some(next) if next.is_alphabetic() || *next == '_' => {
                    result.push_str(&self.expand_simple(&mut chars)?);
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }

    fn expand_braced(&self, chars: &mut Peekable<Chars<'_>>) -> ConfigResult<String> {
        let mut name = String::new();
        let mut modifier = None;
        let mut modifier_value = String::new();
        let mut closed = false;

        while let Some(c) = chars.next() {
            if c == '}' {
                closed = true;
                break;
            } else if c == ':' && modifier.is_none() {
                modifier = Some(chars.next().ok_or_else(|| {
                    ConfigError::template(format!("unterminated '${{{name}:'"))
                })?);
            } else if modifier.is_some() {
                modifier_value.push(c);
            } else {
                name.push(c);
            }
        }

        if !closed {
            return Err(ConfigError::template(format!("unterminated '${{{name}'")));
        }
        if name.is_empty() {
            return Err(ConfigError::template("empty variable name in '${}'"));
        }

        match (self.source.get_non_blank(&name), modifier) {
            (Some(_), Some('+')) => Ok(modifier_value),
            (Some(value), _) => Ok(value),
            (None, Some('-')) => Ok(modifier_value),
            (None, Some('+')) => Ok(String::new()),
            (None, Some('?')) if !modifier_value.is_empty() => {
                Err(ConfigError::template(modifier_value))
            }
            (None, Some(other)) if other != '?' => Err(ConfigError::template(format!(
                "unknown modifier ':{other}' for variable '{name}'"
            ))),
            (None, _) => Err(ConfigError::template(format!(
                "required variable '{name}' is not set"
            ))),
        }
    }

    fn expand_simple(&self, chars: &mut Peekable<Chars<'_>>) -> ConfigResult<String> {
        let mut name = String::new();

        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                chars.next();
            } else {
                break;
            }
        }

        self.source
            .get(&name)
            .ok_or_else(|| ConfigError::template(format!("variable '{name}' is not set")))
    }

    /// Check if a string contains template directives.
    pub fn has_variables(input: &str) -> bool {
        input.contains('$')
    }
}

impl<S: EnvSource> TemplateEngine for EnvTemplate<S> {
    fn render(&self, source: &str) -> ConfigResult<String> {
        self.expand(source)
    }
}

/// Template engine that returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl TemplateEngine for PlainText {
    fn render(&self, source: &str) -> ConfigResult<String> {
        Ok(source.to_string())
    }
}
