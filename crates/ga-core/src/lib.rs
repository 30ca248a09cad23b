//! Core of the git agent: owned result types, the command translator over
//! libgit2, the cache policy, the worker side of the streaming protocol and
//! transactions.

pub mod cache;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod history;
pub mod index;
pub mod operation;
pub mod peel;
pub mod refs;
pub mod session;
pub mod store;
pub mod stream;
pub mod tree;
pub mod types;
pub mod value;

pub use cache::{Cache, CacheKey, LruCache, NoCache};
pub use config::{AgentConfig, Config, ConfigError, LoggingConfig};
pub use error::{AgentError, Result};
pub use event::{EventKind, LogSink, OperationEvent, OperationSink};
pub use operation::{
    CommitSpec, DiffFormat, DiffOptions, HistoryOptions, HistorySort, Operation, Payload,
    PeelTarget, SignatureSpec,
};
pub use session::Session;
pub use stream::{Chunk, ChunkSize, CursorId};
pub use types::*;
pub use value::{FromValue, Targeted, Value};
