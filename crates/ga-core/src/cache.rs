//! Memoization of pure results.
//!
//! A result may be cached only when it is a function of immutable object
//! ids, or when the caller named a transaction. [`default_key`] is the single
//! place that decides eligibility; reference names and revspecs never
//! produce a key because they can move between calls.

use std::num::NonZeroUsize;

use crate::operation::Operation;
use crate::types::{ObjectId, Rev};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Operation over content-addressed arguments.
    Content {
        operation: &'static str,
        oids: Vec<ObjectId>,
    },
    /// Explicitly named transaction.
    Transaction(String),
}

/// Key for `op`, or `None` when its result must not be cached.
pub fn default_key(op: &Operation) -> Option<CacheKey> {
    if op.is_mutating() {
        return None;
    }
    match op {
        Operation::HistoryCount { rev: Rev::Oid(oid) } => Some(CacheKey::Content {
            operation: op.name(),
            oids: vec![*oid],
        }),
        Operation::AheadBehind {
            local: Rev::Oid(local),
            upstream: Rev::Oid(upstream),
        } => Some(CacheKey::Content {
            operation: op.name(),
            oids: vec![*local, *upstream],
        }),
        _ => None,
    }
}

/// Pluggable cache consulted by the agent loop before executing an
/// operation. Implementations live on the worker thread and are never
/// shared, so they need no internal locking.
pub trait Cache: Send {
    fn key_for(&self, op: &Operation) -> Option<CacheKey> {
        default_key(op)
    }

    fn key_for_transaction(&self, name: &str) -> Option<CacheKey> {
        Some(CacheKey::Transaction(name.to_string()))
    }

    fn get(&mut self, key: &CacheKey) -> Option<Value>;

    fn put(&mut self, key: CacheKey, value: Value);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded least-recently-used cache.
pub struct LruCache {
    inner: lru::LruCache<CacheKey, Value>,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: lru::LruCache::new(capacity),
        }
    }
}

impl Cache for LruCache {
    fn get(&mut self, key: &CacheKey) -> Option<Value> {
        self.inner.get(key).cloned()
    }

    fn put(&mut self, key: CacheKey, value: Value) {
        self.inner.put(key, value);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Disables memoization entirely.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl Cache for NoCache {
    fn key_for(&self, _op: &Operation) -> Option<CacheKey> {
        None
    }

    fn key_for_transaction(&self, _name: &str) -> Option<CacheKey> {
        None
    }

    fn get(&mut self, _key: &CacheKey) -> Option<Value> {
        None
    }

    fn put(&mut self, _key: CacheKey, _value: Value) {}

    fn len(&self) -> usize {
        0
    }
}
