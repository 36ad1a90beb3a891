//! Structured logging setup.
//!
//! Console output via the `tracing` ecosystem with uptime timestamps and
//! module paths, plus JSON file logging in debug builds for post-mortem
//! analysis. The filter honors `RUST_LOG`, then the config override, then
//! the built-in default.

use std::path::Path;

use tellus_config::EngineConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - optional directory for JSON log files (debug builds only)
/// * `debug_build` - whether to enable the JSON file layer
/// * `config` - optional configuration carrying a log level override
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&EngineConfig>) {
    let filter_str = config
        .map(|c| c.log_level.as_str())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("tellus.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();
        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// The default filter used when neither `RUST_LOG` nor the config override
/// a level.
#[must_use]
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
