use ga_core::LoggingConfig;
use ga_telemetry::logging;

#[test]
fn init_logging_twice_is_a_no_op() {
    logging::init_logging("ga-test", "debug");
    logging::init_logging("ga-test", "info");

    tracing::info!(key = "value", "human-readable log line");
}

#[test]
fn init_logging_json_after_another_subscriber() {
    // Whichever test runs first owns the global subscriber.
    logging::init_logging_json("ga-test-json", "info");

    tracing::info!(key = "value", "json log line");
}

#[test]
fn init_from_config_accepts_both_formats() {
    let mut config = LoggingConfig::default();
    logging::init_from_config("ga-test", &config);
    config.json = true;
    logging::init_from_config("ga-test", &config);
}
