//! Caller side of the agent: a cheap, cloneable handle with one typed
//! method per operation.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use uuid::Uuid;

use ga_core::session::{Session, TransactionBody};
use ga_core::{
    AgentConfig, AgentError, AheadBehind, Chunk, ChunkSize, Commit, CommitSpec, CursorId, Diff,
    DiffFormat, DiffOptions, DiffStats, FromValue, GitObject, HistoryOptions, IndexEntry, IndexId,
    ObjectId, ObjectKind, Operation, Payload, PeelTarget, Reference, Resolved, Result, Rev,
    TreeEntry, TreeEntryCommit, Value, Worktree,
};

use crate::agent::{AgentState, Request};
use crate::stream::ChunkStream;

/// Per-call options. Unset fields fall back to the agent's configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Caller-side deadline for the reply.
    pub timeout: Option<Duration>,
    /// Elements per chunk for streaming operations.
    pub stream_chunk_size: Option<ChunkSize>,
    /// Peel the primary result to this kind and return both.
    pub with: Option<ObjectKind>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn chunk_size(mut self, size: ChunkSize) -> Self {
        self.stream_chunk_size = Some(size);
        self
    }

    pub fn with(mut self, kind: ObjectKind) -> Self {
        self.with = Some(kind);
        self
    }
}

struct Inner {
    id: Uuid,
    tx: flume::Sender<Request>,
    state: watch::Receiver<AgentState>,
    config: AgentConfig,
}

/// Handle to a running agent. Clones share the same agent; the agent stops
/// once every handle (and every open [`ChunkStream`]) is dropped.
#[derive(Clone)]
pub struct AgentHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl AgentHandle {
    pub(crate) fn new(
        id: Uuid,
        tx: flume::Sender<Request>,
        state: watch::Receiver<AgentState>,
        config: AgentConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                tx,
                state,
                config,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn state(&self) -> AgentState {
        *self.inner.state.borrow()
    }

    /// Resolves once the agent has stopped for any reason.
    pub async fn wait_stopped(&self) {
        let mut state = self.inner.state.clone();
        // A closed channel means the agent thread is gone.
        let _ = state.wait_for(|s| *s == AgentState::Stopped).await;
    }

    /// Ask the agent to stop after the requests already queued, then wait.
    pub async fn stop(&self) {
        if self.inner.tx.send_async(Request::Stop).await.is_ok() {
            self.wait_stopped().await;
        }
    }

    fn timeout(&self, opts: &CallOptions) -> Duration {
        opts.timeout
            .unwrap_or_else(|| self.inner.config.request_timeout())
    }

    fn chunk_size(&self, opts: &CallOptions) -> ChunkSize {
        opts.stream_chunk_size
            .unwrap_or(self.inner.config.stream_chunk_size)
    }

    pub(crate) fn close_stream(&self, cursor: CursorId) {
        let _ = self.inner.tx.send(Request::Close { cursor });
    }

    async fn submit<F>(&self, timeout: Duration, build: F) -> Result<Value>
    where
        F: FnOnce(oneshot::Sender<Result<Value>>) -> Request,
    {
        if self.state() == AgentState::Stopped {
            return Err(AgentError::AgentUnavailable);
        }
        let (reply, rx) = oneshot::channel();
        self.inner
            .tx
            .send_async(build(reply))
            .await
            .map_err(|_| AgentError::AgentUnavailable)?;
        match tokio::time::timeout(timeout, rx).await {
            Err(_) => Err(AgentError::Timeout(timeout)),
            Ok(Err(_)) => Err(AgentError::AgentUnavailable),
            Ok(Ok(result)) => result,
        }
    }

    // -- Generic surface ------------------------------------------------------

    /// Execute any operation. Streaming operations reply with
    /// `Value::Cursor`, or `Value::List` for unbounded chunks.
    pub async fn call(&self, op: Operation, opts: CallOptions) -> Result<Value> {
        let chunk = self.chunk_size(&opts);
        let with = opts.with;
        self.submit(self.timeout(&opts), |reply| Request::Execute {
            op,
            chunk,
            with,
            reply,
        })
        .await
    }

    pub async fn call_as<T: FromValue>(&self, op: Operation, opts: CallOptions) -> Result<T> {
        T::from_value(self.call(op, opts).await?)
    }

    /// Start a streaming operation and return its client-side cursor.
    pub async fn stream<T: FromValue>(&self, op: Operation, opts: CallOptions) -> Result<ChunkStream<T>> {
        if !op.is_stream() {
            return Err(AgentError::invalid(format!(
                "{} is not a streaming operation",
                op.name()
            )));
        }
        let n = match self.chunk_size(&opts) {
            ChunkSize::Bounded(n) => n.get(),
            ChunkSize::Unbounded => usize::MAX,
        };
        let timeout = self.timeout(&opts);
        match self.call(op, opts).await? {
            Value::Cursor(cursor) => Ok(ChunkStream::open(self.clone(), cursor, n, timeout)),
            Value::List(items) => Ok(ChunkStream::buffered(self.clone(), items, timeout)),
            other => Err(AgentError::UnexpectedReply {
                expected: "cursor",
                actual: other.kind_name(),
            }),
        }
    }

    /// Pull up to `n` items from an open cursor.
    pub async fn advance(&self, cursor: CursorId, n: usize, opts: CallOptions) -> Result<Chunk> {
        if n == 0 {
            return Err(AgentError::invalid("advance needs a positive chunk size"));
        }
        let value = self
            .submit(self.timeout(&opts), |reply| Request::Advance { cursor, n, reply })
            .await?;
        match value {
            Value::Chunk(chunk) => Ok(chunk),
            other => Err(AgentError::UnexpectedReply {
                expected: "chunk",
                actual: other.kind_name(),
            }),
        }
    }

    /// Run `body` on the agent thread with the live repository. A named
    /// transaction is memoized; an unnamed one always runs.
    pub async fn transaction<T, F>(&self, name: Option<&str>, opts: CallOptions, body: F) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        F: FnOnce(&mut Session<'_, '_>) -> Result<T> + Send + 'static,
    {
        let body: TransactionBody =
            Box::new(move |session: &mut Session<'_, '_>| body(session).map(Value::custom));
        let name = name.map(str::to_string);
        self.submit(self.timeout(&opts), |reply| Request::Transaction { name, body, reply })
            .await?
            .downcast::<T>()
    }

    async fn get<T: FromValue>(&self, op: Operation) -> Result<T> {
        self.call_as(op, CallOptions::default()).await
    }

    // -- References -----------------------------------------------------------

    pub async fn is_empty(&self) -> Result<bool> {
        self.get(Operation::IsEmpty).await
    }

    pub async fn head(&self) -> Result<Reference> {
        self.get(Operation::Head).await
    }

    pub async fn branch(&self, name: &str) -> Result<Reference> {
        self.get(Operation::Branch { name: name.into() }).await
    }

    pub async fn branches(&self, opts: CallOptions) -> Result<ChunkStream<Reference>> {
        self.stream(Operation::Branches, opts).await
    }

    pub async fn tag(&self, name: &str) -> Result<Reference> {
        self.get(Operation::Tag { name: name.into() }).await
    }

    pub async fn tags(&self, opts: CallOptions) -> Result<ChunkStream<Reference>> {
        self.stream(Operation::Tags, opts).await
    }

    pub async fn reference(&self, name: &str) -> Result<Reference> {
        self.get(Operation::Reference { name: name.into() }).await
    }

    pub async fn references(&self, glob: Option<&str>, opts: CallOptions) -> Result<ChunkStream<Reference>> {
        let glob = glob.map(str::to_string);
        self.stream(Operation::References { glob }, opts).await
    }

    pub async fn reference_create(
        &self,
        name: &str,
        target: ObjectId,
        force: bool,
        message: &str,
    ) -> Result<Reference> {
        self.get(Operation::ReferenceCreate {
            name: name.into(),
            target,
            force,
            message: message.into(),
        })
        .await
    }

    pub async fn reference_delete(&self, name: &str) -> Result<()> {
        self.get(Operation::ReferenceDelete { name: name.into() }).await
    }

    // -- Objects ----------------------------------------------------------------

    pub async fn revision(&self, spec: &str) -> Result<Resolved> {
        self.get(Operation::Revision { spec: spec.into() }).await
    }

    pub async fn object(&self, oid: ObjectId) -> Result<GitObject> {
        self.get(Operation::Object { oid }).await
    }

    pub async fn commit(&self, oid: ObjectId) -> Result<Commit> {
        self.get(Operation::Object { oid }).await
    }

    pub async fn blob_content(&self, oid: ObjectId) -> Result<Vec<u8>> {
        self.get(Operation::BlobContent { oid }).await
    }

    pub async fn peel(&self, target: PeelTarget, kind: Option<ObjectKind>) -> Result<GitObject> {
        self.get(Operation::Peel { target, kind }).await
    }

    pub async fn odb_write(&self, kind: ObjectKind, data: impl Into<Payload>) -> Result<ObjectId> {
        self.get(Operation::OdbWrite {
            kind,
            data: data.into(),
        })
        .await
    }

    pub async fn commit_create(&self, spec: CommitSpec) -> Result<ObjectId> {
        self.get(Operation::CommitCreate(spec)).await
    }

    // -- Trees ------------------------------------------------------------------

    pub async fn tree_entry_by_path(&self, rev: impl Into<Rev>, path: &str) -> Result<TreeEntry> {
        self.get(Operation::TreeEntryByPath {
            rev: rev.into(),
            path: path.into(),
        })
        .await
    }

    pub async fn tree_entries(
        &self,
        rev: impl Into<Rev>,
        path: &str,
        opts: CallOptions,
    ) -> Result<ChunkStream<TreeEntry>> {
        let op = Operation::TreeEntries {
            rev: rev.into(),
            path: path.into(),
        };
        self.stream(op, opts).await
    }

    pub async fn tree_entries_with_commit(
        &self,
        rev: impl Into<Rev>,
        path: &str,
        opts: CallOptions,
    ) -> Result<ChunkStream<TreeEntryCommit>> {
        let op = Operation::TreeEntriesWithCommit {
            rev: rev.into(),
            path: path.into(),
        };
        self.stream(op, opts).await
    }

    // -- History ----------------------------------------------------------------

    pub async fn history(
        &self,
        rev: impl Into<Rev>,
        options: HistoryOptions,
        opts: CallOptions,
    ) -> Result<ChunkStream<Commit>> {
        let op = Operation::History {
            rev: rev.into(),
            options,
        };
        self.stream(op, opts).await
    }

    pub async fn history_count(&self, rev: impl Into<Rev>) -> Result<usize> {
        self.get(Operation::HistoryCount { rev: rev.into() }).await
    }

    pub async fn ahead_behind(&self, local: impl Into<Rev>, upstream: impl Into<Rev>) -> Result<AheadBehind> {
        self.get(Operation::AheadBehind {
            local: local.into(),
            upstream: upstream.into(),
        })
        .await
    }

    // -- Diff -------------------------------------------------------------------

    pub async fn diff(&self, old: Option<Rev>, new: impl Into<Rev>, options: DiffOptions) -> Result<Diff> {
        self.get(Operation::Diff {
            old,
            new: new.into(),
            options,
        })
        .await
    }

    pub async fn diff_stats(
        &self,
        old: Option<Rev>,
        new: impl Into<Rev>,
        options: DiffOptions,
    ) -> Result<DiffStats> {
        self.get(Operation::DiffStats {
            old,
            new: new.into(),
            options,
        })
        .await
    }

    pub async fn diff_format(
        &self,
        old: Option<Rev>,
        new: impl Into<Rev>,
        options: DiffOptions,
        format: DiffFormat,
    ) -> Result<String> {
        self.get(Operation::DiffFormat {
            old,
            new: new.into(),
            options,
            format,
        })
        .await
    }

    // -- Index ------------------------------------------------------------------

    pub async fn index_new(&self) -> Result<IndexId> {
        self.get(Operation::IndexNew).await
    }

    pub async fn index_open(&self) -> Result<IndexId> {
        self.get(Operation::IndexOpen).await
    }

    pub async fn index_entries(&self, index: IndexId) -> Result<Vec<IndexEntry>> {
        match self.get::<Value>(Operation::IndexEntries { index }).await? {
            Value::List(items) => items.into_iter().map(IndexEntry::from_value).collect(),
            other => Err(AgentError::UnexpectedReply {
                expected: "list",
                actual: other.kind_name(),
            }),
        }
    }

    pub async fn index_add(&self, index: IndexId, entry: IndexEntry) -> Result<()> {
        self.get(Operation::IndexAdd { index, entry }).await
    }

    pub async fn index_remove(&self, index: IndexId, path: &str) -> Result<()> {
        self.get(Operation::IndexRemove {
            index,
            path: path.into(),
        })
        .await
    }

    pub async fn index_read_tree(&self, index: IndexId, tree: impl Into<Rev>) -> Result<()> {
        self.get(Operation::IndexReadTree {
            index,
            tree: tree.into(),
        })
        .await
    }

    pub async fn index_write_tree(&self, index: IndexId) -> Result<ObjectId> {
        self.get(Operation::IndexWriteTree { index }).await
    }

    pub async fn index_write(&self, index: IndexId) -> Result<()> {
        self.get(Operation::IndexWrite { index }).await
    }

    pub async fn index_release(&self, index: IndexId) -> Result<()> {
        self.get(Operation::IndexRelease { index }).await
    }

    // -- Packs & worktrees ------------------------------------------------------

    pub async fn pack_create(&self, oids: Vec<ObjectId>) -> Result<Vec<u8>> {
        self.get(Operation::PackCreate { oids }).await
    }

    pub async fn worktree_add(
        &self,
        name: &str,
        path: impl Into<PathBuf>,
        reference: Option<&str>,
    ) -> Result<Worktree> {
        self.get(Operation::WorktreeAdd {
            name: name.into(),
            path: path.into(),
            reference: reference.map(str::to_string),
        })
        .await
    }

    pub async fn worktree_prune(&self, name: &str) -> Result<()> {
        self.get(Operation::WorktreePrune { name: name.into() }).await
    }
}
