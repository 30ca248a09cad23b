//! The agent loop.
//!
//! One OS thread per repository owns the `git2::Repository`, the cache, the
//! open streams and the open indexes. Callers talk to it only through a
//! single flume queue, so exactly one native operation runs at a time and no
//! lock ever guards the handle.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use flume::RecvTimeoutError;
use git2::Repository;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};
use uuid::Uuid;

use ga_core::cache::{Cache, LruCache};
use ga_core::commands::{self, Outcome};
use ga_core::event::{EventKind, Events, OperationSink, Timer};
use ga_core::index::IndexTable;
use ga_core::session::{self, Session, TransactionBody};
use ga_core::stream::{self, ChunkSize, CursorId, StreamTable};
use ga_core::{store, AgentConfig, AgentError, ObjectKind, Operation, Result, Value};

use crate::client::AgentHandle;

pub(crate) type Reply = oneshot::Sender<Result<Value>>;

/// Messages accepted by the agent thread.
pub(crate) enum Request {
    Execute {
        op: Operation,
        chunk: ChunkSize,
        with: Option<ObjectKind>,
        reply: Reply,
    },
    Advance {
        cursor: CursorId,
        n: usize,
        reply: Reply,
    },
    Close {
        cursor: CursorId,
    },
    Transaction {
        name: Option<String>,
        body: TransactionBody,
        reply: Reply,
    },
    Stop,
}

/// Lifecycle of an agent, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    Starting,
    Ready,
    Executing,
    Stopped,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Starting => "starting",
            AgentState::Ready => "ready",
            AgentState::Executing => "executing",
            AgentState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Entry point: `Agent::builder(path).config(..).start().await`.
pub struct Agent;

impl Agent {
    pub fn builder(path: impl Into<PathBuf>) -> AgentBuilder {
        AgentBuilder {
            path: path.into(),
            config: AgentConfig::default(),
            cache: None,
            sinks: Vec::new(),
        }
    }

    /// Start with default settings.
    pub async fn start(path: impl Into<PathBuf>) -> Result<AgentHandle> {
        Self::builder(path).start().await
    }
}

pub struct AgentBuilder {
    path: PathBuf,
    config: AgentConfig,
    cache: Option<Box<dyn Cache>>,
    sinks: Vec<Arc<dyn OperationSink>>,
}

impl AgentBuilder {
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default LRU cache.
    pub fn cache(mut self, cache: impl Cache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    /// Register an event sink. May be called more than once.
    pub fn sink(mut self, sink: Arc<dyn OperationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Spawn the agent thread and wait until the repository is open.
    pub async fn start(self) -> Result<AgentHandle> {
        self.config
            .validate()
            .map_err(|e| AgentError::invalid(e.to_string()))?;

        let id = Uuid::new_v4();
        let (tx, rx) = flume::unbounded();
        let (state_tx, state_rx) = watch::channel(AgentState::Starting);
        let (ready_tx, ready_rx) = oneshot::channel();

        let cache = self
            .cache
            .unwrap_or_else(|| Box::new(LruCache::new(self.config.cache_capacity)));
        let worker = Worker {
            path: self.path,
            config: self.config.clone(),
            rx,
            state: state_tx,
            cache,
            events: Events::new(id, self.sinks),
        };

        std::thread::Builder::new()
            .name(format!("git-agent-{}", &id.simple().to_string()[..8]))
            .spawn(move || worker.run(ready_tx))
            .map_err(|e| AgentError::store("Os", format!("failed to spawn agent thread: {e}")))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(AgentHandle::new(id, tx, state_rx, self.config)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AgentError::AgentUnavailable),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

enum Flow {
    Continue,
    Stop,
}

struct Worker {
    path: PathBuf,
    config: AgentConfig,
    rx: flume::Receiver<Request>,
    state: watch::Sender<AgentState>,
    cache: Box<dyn Cache>,
    events: Events,
}

impl Worker {
    fn run(mut self, ready: oneshot::Sender<Result<()>>) {
        let agent_id = self.events.agent_id();
        let repo = match store::open(&self.path) {
            Ok(repo) => repo,
            Err(e) => {
                self.state.send_replace(AgentState::Stopped);
                info!(
                    %agent_id,
                    path = %self.path.display(),
                    error = %e,
                    "git agent failed to open repository"
                );
                let _ = ready.send(Err(e));
                return;
            }
        };

        info!(%agent_id, path = %self.path.display(), "git agent started");
        self.state.send_replace(AgentState::Ready);
        let _ = ready.send(Ok(()));

        self.serve(&repo);

        self.state.send_replace(AgentState::Stopped);
        info!(%agent_id, path = %self.path.display(), "git agent stopped");
    }

    fn next_request(&self) -> Option<Request> {
        match self.config.idle_timeout() {
            Some(idle) => match self.rx.recv_timeout(idle) {
                Ok(request) => Some(request),
                Err(RecvTimeoutError::Timeout) => {
                    info!(
                        agent_id = %self.events.agent_id(),
                        idle_ms = idle.as_millis() as u64,
                        "git agent idle, stopping"
                    );
                    None
                }
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.rx.recv().ok(),
        }
    }

    /// Native handles (streams, indexes) are created here, on the agent
    /// thread, and dropped before `repo`.
    fn serve(&mut self, repo: &Repository) {
        let mut streams = StreamTable::new(self.config.max_open_streams);
        let mut indexes = IndexTable::new();
        while let Some(request) = self.next_request() {
            self.state.send_replace(AgentState::Executing);
            let flow = self.handle(repo, &mut streams, &mut indexes, request);
            if let Flow::Stop = flow {
                break;
            }
            self.state.send_replace(AgentState::Ready);
        }
        streams.clear();
        indexes.clear();
    }

    fn handle<'r>(
        &mut self,
        repo: &'r Repository,
        streams: &mut StreamTable<'r>,
        indexes: &mut IndexTable,
        request: Request,
    ) -> Flow {
        match request {
            Request::Execute {
                op,
                chunk,
                with,
                reply,
            } => {
                if reply.is_closed() {
                    debug!(operation = op.name(), "skipping request abandoned by caller");
                    return Flow::Continue;
                }
                let timer = Timer::start();
                let mut cached = false;
                let result = session::catch_panic("Panic", op.name(), || {
                    let (result, hit) = self.execute(repo, streams, indexes, &op, chunk, with);
                    cached = hit;
                    result
                });
                debug!(
                    operation = op.name(),
                    cached,
                    ok = result.is_ok(),
                    elapsed_us = timer.elapsed().as_micros() as u64,
                    "operation executed"
                );
                self.events.record(
                    EventKind::Operation,
                    op.name(),
                    format!("{op:?}"),
                    &timer,
                    cached,
                    result.is_ok(),
                );
                let _ = reply.send(result);
            }
            Request::Advance { cursor, n, reply } => {
                if reply.is_closed() {
                    debug!(%cursor, "skipping advance abandoned by caller");
                    return Flow::Continue;
                }
                let timer = Timer::start();
                let operation = streams.operation(cursor).unwrap_or("advance");
                let result = session::catch_panic("Panic", operation, || streams.advance(cursor, n))
                    .map(Value::Chunk);
                if result.is_err() {
                    streams.close(cursor);
                }
                self.events.record(
                    EventKind::StreamChunk,
                    operation,
                    format!("{cursor} n={n}"),
                    &timer,
                    false,
                    result.is_ok(),
                );
                let _ = reply.send(result);
            }
            Request::Close { cursor } => {
                if streams.close(cursor) {
                    debug!(%cursor, "stream closed by caller");
                }
            }
            Request::Transaction { name, body, reply } => {
                if reply.is_closed() {
                    debug!(
                        transaction = name.as_deref().unwrap_or("transaction"),
                        "skipping transaction abandoned by caller"
                    );
                    return Flow::Continue;
                }
                let label = name.as_deref().unwrap_or("transaction");
                let result = session::catch_panic("Panic", label, || {
                    Session::new(repo, self.cache.as_mut(), indexes, &self.events)
                        .run(name.as_deref(), body)
                });
                let _ = reply.send(result);
            }
            Request::Stop => {
                info!(agent_id = %self.events.agent_id(), "git agent stop requested");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Cache lookup, translation, `with` peeling, then either a finished
    /// value, an eager list (unbounded chunks) or a parked cursor.
    fn execute<'r>(
        &mut self,
        repo: &'r Repository,
        streams: &mut StreamTable<'r>,
        indexes: &mut IndexTable,
        op: &Operation,
        chunk: ChunkSize,
        with: Option<ObjectKind>,
    ) -> (Result<Value>, bool) {
        let key = self.cache.key_for(op);
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get(k)) {
            let result = match with {
                Some(kind) => commands::with_target(repo, hit, kind),
                None => Ok(hit),
            };
            return (result, true);
        }

        let outcome = match commands::execute(repo, indexes, op) {
            Ok(outcome) => outcome,
            Err(e) => return (Err(e), false),
        };
        if let (Some(key), Outcome::Value(value)) = (key, &outcome) {
            self.cache.put(key, value.clone());
        }
        let result = commands::apply_with(repo, outcome, with).and_then(|outcome| match outcome {
            Outcome::Value(value) => Ok(value),
            Outcome::Stream(s) if chunk.is_unbounded() => {
                stream::collect_all(s).map(Value::List)
            }
            Outcome::Stream(s) => Ok(Value::Cursor(streams.open(op.name(), s))),
        });
        (result, false)
    }
}
