//! Observability for the git agent.
//!
//! - **Logging**: human-readable or JSON output through `tracing-subscriber`
//! - **Metrics**: labelled counters and histograms with Prometheus and JSON
//!   export
//! - **Sink**: an [`OperationSink`](ga_core::OperationSink) that turns agent
//!   events into metrics

pub mod logging;
pub mod metrics;
pub mod sink;

pub use metrics::{global_metrics, Labels, MetricsCollector};
pub use sink::MetricsSink;
