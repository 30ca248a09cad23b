//! Agent events as metrics.

use std::sync::Arc;

use ga_core::{EventKind, OperationEvent, OperationSink};

use crate::metrics::{global_metrics, MetricsCollector};

pub const OPERATIONS_TOTAL: &str = "git_agent_operations_total";
pub const OPERATION_DURATION: &str = "git_agent_operation_duration_seconds";
pub const STREAM_CHUNKS_TOTAL: &str = "git_agent_stream_chunks_total";

enum Target {
    Global,
    Owned(Arc<MetricsCollector>),
}

/// Records every agent event into a [`MetricsCollector`].
pub struct MetricsSink {
    target: Target,
}

impl MetricsSink {
    /// Record into the process-wide collector.
    pub fn global() -> Self {
        Self {
            target: Target::Global,
        }
    }

    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self {
            target: Target::Owned(collector),
        }
    }

    fn collector(&self) -> &MetricsCollector {
        match &self.target {
            Target::Global => global_metrics(),
            Target::Owned(c) => c,
        }
    }
}

impl OperationSink for MetricsSink {
    fn record(&self, event: &OperationEvent) {
        let m = self.collector();
        let operation = event.operation.as_str();
        match event.kind {
            EventKind::StreamChunk => {
                m.increment_counter(STREAM_CHUNKS_TOTAL, &[("operation", operation)]);
            }
            EventKind::Operation | EventKind::Transaction => {
                let cached = if event.cached { "true" } else { "false" };
                let outcome = if event.ok { "ok" } else { "error" };
                m.increment_counter(
                    OPERATIONS_TOTAL,
                    &[
                        ("operation", operation),
                        ("cached", cached),
                        ("outcome", outcome),
                    ],
                );
            }
        }
        m.record_histogram(
            OPERATION_DURATION,
            &[("operation", operation)],
            event.elapsed.as_secs_f64(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event(kind: EventKind, operation: &str, cached: bool, ok: bool) -> OperationEvent {
        OperationEvent {
            agent_id: uuid::Uuid::nil(),
            kind,
            operation: operation.to_string(),
            args: String::new(),
            started_at: chrono::Utc::now(),
            elapsed: Duration::from_millis(2),
            cached,
            ok,
        }
    }

    #[test]
    fn operations_are_counted_by_outcome() {
        let collector = Arc::new(MetricsCollector::new());
        let sink = MetricsSink::new(collector.clone());
        sink.record(&event(EventKind::Operation, "head", false, true));
        sink.record(&event(EventKind::Operation, "head", true, true));
        sink.record(&event(EventKind::Operation, "head", false, false));

        let labels = |cached, outcome| [("operation", "head"), ("cached", cached), ("outcome", outcome)];
        assert_eq!(collector.get_counter(OPERATIONS_TOTAL, &labels("false", "ok")), 1);
        assert_eq!(collector.get_counter(OPERATIONS_TOTAL, &labels("true", "ok")), 1);
        assert_eq!(collector.get_counter(OPERATIONS_TOTAL, &labels("false", "error")), 1);

        let (count, sum) = collector
            .histogram_stats(OPERATION_DURATION, &[("operation", "head")])
            .unwrap();
        assert_eq!(count, 3);
        assert!((sum - 0.006).abs() < 1e-9);
    }

    #[test]
    fn chunks_have_their_own_counter() {
        let collector = Arc::new(MetricsCollector::new());
        let sink = MetricsSink::new(collector.clone());
        sink.record(&event(EventKind::StreamChunk, "history", false, true));
        sink.record(&event(EventKind::StreamChunk, "history", false, true));

        assert_eq!(
            collector.get_counter(STREAM_CHUNKS_TOTAL, &[("operation", "history")]),
            2
        );
        assert_eq!(collector.counter_total(OPERATIONS_TOTAL), 0);
    }
}
