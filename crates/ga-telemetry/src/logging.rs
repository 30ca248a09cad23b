use tracing_subscriber::{fmt, EnvFilter};

use ga_core::LoggingConfig;

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging with human-readable output on stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies (e.g. "info",
/// "ga_agent=debug,warn"). Later calls are no-ops.
pub fn init_logging(service_name: &str, default_level: &str) {
    fmt()
        .with_env_filter(filter(default_level))
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    tracing::debug!(service = service_name, "logging initialised (human-readable)");
}

/// Initialize logging with one JSON object per line. Later calls are no-ops.
pub fn init_logging_json(service_name: &str, default_level: &str) {
    fmt()
        .json()
        .with_env_filter(filter(default_level))
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    tracing::debug!(service = service_name, "logging initialised (json)");
}

/// Pick the output format from the `[logging]` config section.
pub fn init_from_config(service_name: &str, config: &LoggingConfig) {
    if config.json {
        init_logging_json(service_name, &config.level);
    } else {
        init_logging(service_name, &config.level);
    }
}
