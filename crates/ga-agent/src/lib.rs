//! A serializing command agent for one Git repository.
//!
//! [`Agent::start`] spawns a thread that exclusively owns the repository
//! handle. Every caller goes through an [`AgentHandle`], which queues requests
//! for that thread and waits for the reply under a caller-side timeout.

mod agent;
mod client;
mod stream;

pub use agent::{Agent, AgentBuilder, AgentState};
pub use client::{AgentHandle, CallOptions};
pub use stream::ChunkStream;

pub use ga_core::{
    AgentConfig, AgentError, Cache, CacheKey, ChunkSize, LruCache, NoCache, Operation,
    OperationEvent, OperationSink, Result, Session, Value,
};
