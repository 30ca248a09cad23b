//! Observability hook: one event per executed operation, stream chunk fetch
//! and transaction, delivered to pluggable sinks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Operation,
    StreamChunk,
    Transaction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Operation => "operation",
            EventKind::StreamChunk => "stream_chunk",
            EventKind::Transaction => "transaction",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationEvent {
    pub agent_id: Uuid,
    pub kind: EventKind,
    /// Operation name, or the transaction name (`"transaction"` when unnamed).
    pub operation: String,
    /// Debug rendering of the arguments.
    pub args: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub cached: bool,
    pub ok: bool,
}

/// Consumer of agent events. Called on the agent thread, so implementations
/// should return quickly.
pub trait OperationSink: Send + Sync {
    fn record(&self, event: &OperationEvent);
}

/// Writes every event to the `tracing` pipeline at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl OperationSink for LogSink {
    fn record(&self, event: &OperationEvent) {
        debug!(
            agent_id = %event.agent_id,
            kind = event.kind.as_str(),
            operation = %event.operation,
            args = %event.args,
            elapsed_us = event.elapsed.as_micros() as u64,
            cached = event.cached,
            ok = event.ok,
            "git agent event"
        );
    }
}

/// Wall-clock start plus a monotonic timer.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started_at: DateTime<Utc>,
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Fans events out to every registered sink.
#[derive(Clone)]
pub struct Events {
    agent_id: Uuid,
    sinks: Vec<Arc<dyn OperationSink>>,
}

impl Events {
    pub fn new(agent_id: Uuid, sinks: Vec<Arc<dyn OperationSink>>) -> Self {
        Self { agent_id, sinks }
    }

    pub fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    pub fn record(
        &self,
        kind: EventKind,
        operation: &str,
        args: String,
        timer: &Timer,
        cached: bool,
        ok: bool,
    ) {
        if self.sinks.is_empty() {
            return;
        }
        let event = OperationEvent {
            agent_id: self.agent_id,
            kind,
            operation: operation.to_string(),
            args,
            started_at: timer.started_at,
            elapsed: timer.elapsed(),
            cached,
            ok,
        };
        for sink in &self.sinks {
            // Sink panics stay inside the sink.
            if panic::catch_unwind(AssertUnwindSafe(|| sink.record(&event))).is_err() {
                warn!(operation = %event.operation, "operation sink panicked; event dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Capture(Mutex<Vec<OperationEvent>>);

    impl OperationSink for Capture {
        fn record(&self, event: &OperationEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn events_reach_every_sink() {
        let a = Arc::new(Capture::default());
        let b = Arc::new(Capture::default());
        let sinks: Vec<Arc<dyn OperationSink>> = vec![a.clone(), b.clone(), Arc::new(LogSink)];
        let events = Events::new(Uuid::new_v4(), sinks);
        let timer = Timer::start();
        events.record(EventKind::Operation, "head", "Head".into(), &timer, false, true);

        for sink in [&a, &b] {
            let got = sink.0.lock().unwrap();
            assert_eq!(got.len(), 1);
            assert_eq!(got[0].operation, "head");
            assert_eq!(got[0].agent_id, events.agent_id());
            assert!(got[0].ok);
        }
    }

    struct Exploding;

    impl OperationSink for Exploding {
        fn record(&self, _event: &OperationEvent) {
            panic!("sink failure");
        }
    }

    #[test]
    fn panicking_sink_does_not_stop_the_others() {
        let after = Arc::new(Capture::default());
        let sinks: Vec<Arc<dyn OperationSink>> = vec![Arc::new(Exploding), after.clone()];
        let events = Events::new(Uuid::new_v4(), sinks);
        let timer = Timer::start();
        events.record(EventKind::Operation, "head", "Head".into(), &timer, false, true);
        events.record(EventKind::Operation, "tags", "Tags".into(), &timer, false, true);

        let got = after.0.lock().unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].operation, "tags");
    }

    #[test]
    fn event_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EventKind::StreamChunk).unwrap();
        assert_eq!(json, "\"stream_chunk\"");
    }
}
