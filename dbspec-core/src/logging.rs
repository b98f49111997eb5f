//! Logging setup for dbspec.
//!
//! Structured logging controlled by environment variables.
//!
//! # Environment Variables
//!
//! - `DBSPEC_DEBUG=true` (or `1`, `yes`) - Enable debug logging
//! - `DBSPEC_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `DBSPEC_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//! - `DBSPEC_TASK_RUNNER` - Set by task runners; suppresses per-environment
//!   stdout logging
//!
//! # Usage
//!
//! ```rust,no_run
//! use dbspec_core::logging;
//!
//! // Honour DBSPEC_DEBUG / DBSPEC_LOG_LEVEL only
//! logging::init();
//!
//! // Or log to stdout unless running tests, production, or a task runner
//! logging::init_for_environment("development");
//! ```
//!
//! Without the `tracing-subscriber` feature both calls only decide; events
//! go to whatever subscriber the application installed.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Variable a task runner sets to keep connection logging off stdout.
pub const TASK_RUNNER_VAR: &str = "DBSPEC_TASK_RUNNER";

/// Environments that never get stdout logging from
/// [`init_for_environment`].
pub const QUIET_ENVIRONMENTS: [&str; 2] = ["test", "production"];

/// Check if debug logging is enabled via `DBSPEC_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("DBSPEC_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// The configured log level, or `fallback` when `DBSPEC_LOG_LEVEL` is unset
/// or unrecognised. Debug mode turns the fallback into `debug`.
pub fn log_level_or(fallback: &'static str) -> &'static str {
    let configured = env::var("DBSPEC_LOG_LEVEL").ok();
    select_level(configured.as_deref(), is_debug_enabled(), fallback)
}

fn select_level(configured: Option<&str>, debug: bool, fallback: &'static str) -> &'static str {
    let fallback = if debug { "debug" } else { fallback };
    match configured.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

/// The configured log level. Defaults to `debug` in debug mode, else `warn`.
pub fn get_log_level() -> &'static str {
    log_level_or("warn")
}

/// The configured output format. Defaults to `json`.
pub fn get_log_format() -> &'static str {
    env::var("DBSPEC_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Whether an application in `environment` logs connection activity to
/// stdout.
pub fn logs_to_stdout(environment: &str, under_task_runner: bool) -> bool {
    !under_task_runner && !QUIET_ENVIRONMENTS.contains(&environment)
}

/// Initialize logging if `DBSPEC_DEBUG` or `DBSPEC_LOG_LEVEL` asks for it.
///
/// Subsequent calls, including [`init_for_environment`], are no-ops.
pub fn init() {
    if !is_debug_enabled() && env::var("DBSPEC_LOG_LEVEL").is_err() {
        return;
    }
    install(get_log_level());
}

/// Initialize stdout logging for an application running in `environment`.
///
/// Test and production environments stay quiet, as does anything launched
/// with [`TASK_RUNNER_VAR`] set. Logs at `info` unless overridden.
pub fn init_for_environment(environment: &str) {
    let under_task_runner = env::var_os(TASK_RUNNER_VAR).is_some();
    if !logs_to_stdout(environment, under_task_runner) {
        tracing::debug!(environment, under_task_runner, "Stdout logging disabled");
        return;
    }
    install(log_level_or("info"));
}

fn install(level: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "dbspec={level},dbspec_core={level},dbspec_sqlx={level},dbspec_axum={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));
            let stdout = fmt::layer().with_writer(std::io::stdout);

            let installed = match get_log_format() {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(stdout.json())
                    .try_init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(stdout.compact())
                    .try_init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(stdout.pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format = get_log_format(), "dbspec logging initialized");
            }
        }

        #[cfg(not(feature = "tracing-subscriber"))]
        {
            let _ = level;
        }
    });
}
