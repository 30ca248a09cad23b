//! Worker-side half of the cursor protocol.
//!
//! A streaming operation produces a lazy [`ValueStream`] that borrows the
//! worker-owned repository. The worker parks it in a [`StreamTable`] and
//! hands the caller only a [`CursorId`]; every `advance` pulls the next
//! bounded [`Chunk`] through the same serialized queue. No libgit2 iterator
//! state ever leaves the worker thread.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AgentError, Result};
use crate::value::Value;

/// Lazy sequence of translated results borrowing the repository.
pub type ValueStream<'r> = Box<dyn Iterator<Item = Result<Value>> + 'r>;

// ---------------------------------------------------------------------------
// ChunkSize
// ---------------------------------------------------------------------------

/// Elements per chunk, or `Unbounded` to materialise the whole stream in a
/// single reply.
///
/// Serialises as a positive integer or the string `"unbounded"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChunkSizeRepr", into = "ChunkSizeRepr")]
pub enum ChunkSize {
    Bounded(NonZeroUsize),
    Unbounded,
}

impl ChunkSize {
    pub const DEFAULT: ChunkSize = match NonZeroUsize::new(100) {
        Some(n) => ChunkSize::Bounded(n),
        None => ChunkSize::Unbounded,
    };

    pub fn new(n: usize) -> Result<Self> {
        NonZeroUsize::new(n)
            .map(ChunkSize::Bounded)
            .ok_or_else(|| AgentError::invalid("stream chunk size must be positive"))
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, ChunkSize::Unbounded)
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSize::Bounded(n) => write!(f, "{n}"),
            ChunkSize::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ChunkSizeRepr {
    Count(usize),
    Word(String),
}

impl TryFrom<ChunkSizeRepr> for ChunkSize {
    type Error = String;

    fn try_from(repr: ChunkSizeRepr) -> std::result::Result<Self, String> {
        match repr {
            ChunkSizeRepr::Count(n) => NonZeroUsize::new(n)
                .map(ChunkSize::Bounded)
                .ok_or_else(|| "stream chunk size must be positive".to_string()),
            ChunkSizeRepr::Word(w) if w == "unbounded" => Ok(ChunkSize::Unbounded),
            ChunkSizeRepr::Word(w) => Err(format!(
                "stream chunk size must be a positive integer or \"unbounded\", got {w:?}"
            )),
        }
    }
}

impl From<ChunkSize> for ChunkSizeRepr {
    fn from(size: ChunkSize) -> Self {
        match size {
            ChunkSize::Bounded(n) => ChunkSizeRepr::Count(n.get()),
            ChunkSize::Unbounded => ChunkSizeRepr::Word("unbounded".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Cursors and chunks
// ---------------------------------------------------------------------------

/// Opaque handle to a stream parked inside the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CursorId(pub u64);

impl fmt::Display for CursorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cursor#{}", self.0)
    }
}

/// One bounded slice of a stream. `done` means the source is exhausted and
/// the cursor no longer exists.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub items: Vec<Value>,
    pub done: bool,
}

/// Pull up to `n` items. The chunk is `done` when fewer than `n` came out.
pub fn take_chunk(stream: &mut ValueStream<'_>, n: usize) -> Result<Chunk> {
    let mut items = Vec::with_capacity(n.min(1024));
    while items.len() < n {
        match stream.next() {
            Some(item) => items.push(item?),
            None => return Ok(Chunk { items, done: true }),
        }
    }
    Ok(Chunk { items, done: false })
}

/// Drain the whole stream; the first error aborts.
pub fn collect_all(stream: ValueStream<'_>) -> Result<Vec<Value>> {
    stream.collect()
}

// ---------------------------------------------------------------------------
// StreamTable
// ---------------------------------------------------------------------------

struct OpenStream<'r> {
    operation: &'static str,
    stream: ValueStream<'r>,
}

/// Open cursors, bounded by `max_open`. Opening past the bound evicts the
/// oldest cursor.
pub struct StreamTable<'r> {
    next_id: u64,
    max_open: usize,
    order: VecDeque<CursorId>,
    open: HashMap<CursorId, OpenStream<'r>>,
}

impl<'r> StreamTable<'r> {
    pub fn new(max_open: usize) -> Self {
        Self {
            next_id: 0,
            max_open: max_open.max(1),
            order: VecDeque::new(),
            open: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    pub fn contains(&self, cursor: CursorId) -> bool {
        self.open.contains_key(&cursor)
    }

    /// Park `stream` and return its cursor.
    pub fn open(&mut self, operation: &'static str, stream: ValueStream<'r>) -> CursorId {
        while self.open.len() >= self.max_open {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.open.remove(&oldest) {
                warn!(cursor = %oldest, operation = evicted.operation, "evicting oldest open stream");
            }
        }
        self.next_id += 1;
        let cursor = CursorId(self.next_id);
        self.order.push_back(cursor);
        self.open.insert(cursor, OpenStream { operation, stream });
        cursor
    }

    /// Operation name of an open cursor.
    pub fn operation(&self, cursor: CursorId) -> Option<&'static str> {
        self.open.get(&cursor).map(|s| s.operation)
    }

    /// Pull the next chunk. Exhaustion and errors both close the cursor.
    pub fn advance(&mut self, cursor: CursorId, n: usize) -> Result<Chunk> {
        if n == 0 {
            return Err(AgentError::invalid("advance needs a positive chunk size"));
        }
        let entry = self
            .open
            .get_mut(&cursor)
            .ok_or_else(|| AgentError::not_found(format!("{cursor}")))?;
        let result = take_chunk(&mut entry.stream, n);
        if !matches!(result, Ok(Chunk { done: false, .. })) {
            self.close(cursor);
        }
        result
    }

    pub fn close(&mut self, cursor: CursorId) -> bool {
        self.order.retain(|c| *c != cursor);
        self.open.remove(&cursor).is_some()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.open.clear();
    }
}
