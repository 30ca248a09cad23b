//! Client side of the streaming protocol.

use std::marker::PhantomData;
use std::time::Duration;

use ga_core::{CursorId, FromValue, Result, Value};

use crate::client::{AgentHandle, CallOptions};

enum State {
    /// Items still live on the agent behind this cursor.
    Open(CursorId),
    /// The whole stream arrived in one reply.
    Buffered(Vec<Value>),
    Done,
}

/// Pull-based stream of typed items. Each [`next_chunk`](Self::next_chunk)
/// asks the agent for at most `n` more items; dropping an unfinished stream
/// releases its cursor on the agent.
pub struct ChunkStream<T> {
    handle: AgentHandle,
    state: State,
    n: usize,
    timeout: Duration,
    _item: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for ChunkStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Open(cursor) => cursor.to_string(),
            State::Buffered(items) => format!("buffered({})", items.len()),
            State::Done => "done".to_string(),
        };
        f.debug_struct("ChunkStream")
            .field("state", &state)
            .field("n", &self.n)
            .finish()
    }
}

impl<T: FromValue> ChunkStream<T> {
    pub(crate) fn open(handle: AgentHandle, cursor: CursorId, n: usize, timeout: Duration) -> Self {
        Self {
            handle,
            state: State::Open(cursor),
            n,
            timeout,
            _item: PhantomData,
        }
    }

    pub(crate) fn buffered(handle: AgentHandle, items: Vec<Value>, timeout: Duration) -> Self {
        Self {
            handle,
            state: State::Buffered(items),
            n: usize::MAX,
            timeout,
            _item: PhantomData,
        }
    }

    /// The agent-side cursor, while one is open.
    pub fn cursor(&self) -> Option<CursorId> {
        match self.state {
            State::Open(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Next non-empty chunk, or `None` once the stream is exhausted. An
    /// error ends the stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<T>>> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Done => Ok(None),
            State::Buffered(items) if items.is_empty() => Ok(None),
            State::Buffered(items) => convert(items).map(Some),
            State::Open(cursor) => {
                let opts = CallOptions::new().timeout(self.timeout);
                let chunk = match self.handle.advance(cursor, self.n, opts).await {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        // Executed advances drop the cursor on the agent.
                        if e.is_transport() {
                            self.handle.close_stream(cursor);
                        }
                        return Err(e);
                    }
                };
                if !chunk.done {
                    self.state = State::Open(cursor);
                }
                if chunk.items.is_empty() {
                    return Ok(None);
                }
                convert(chunk.items).map(Some)
            }
        }
    }

    /// Drain the rest of the stream.
    pub async fn try_collect(mut self) -> Result<Vec<T>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend(chunk);
        }
        Ok(out)
    }
}

fn convert<T: FromValue>(items: Vec<Value>) -> Result<Vec<T>> {
    items.into_iter().map(T::from_value).collect()
}

impl<T> Drop for ChunkStream<T> {
    fn drop(&mut self) {
        if let State::Open(cursor) = self.state {
            self.handle.close_stream(cursor);
        }
    }
}
