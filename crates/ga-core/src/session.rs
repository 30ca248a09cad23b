//! Transactions: a caller-supplied body run inside one agent turn with the
//! live repository handle.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use git2::Repository;
use tracing::warn;

use crate::cache::Cache;
use crate::commands::{self, Outcome};
use crate::error::{AgentError, Result};
use crate::event::{EventKind, Events, Timer};
use crate::index::IndexTable;
use crate::operation::Operation;
use crate::stream;
use crate::value::{FromValue, Value};

/// Body shipped to the agent thread by a transaction call.
pub type TransactionBody = Box<dyn FnOnce(&mut Session<'_, '_>) -> Result<Value> + Send>;

/// Everything a transaction body may touch during its turn.
pub struct Session<'a, 'r> {
    repo: &'r Repository,
    cache: &'a mut dyn Cache,
    indexes: &'a mut IndexTable,
    events: &'a Events,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}

/// Run `f`, turning a panic into `Store { class, .. }`.
pub fn catch_panic<T>(class: &str, label: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(class, operation = label, %message, "panic caught on agent thread");
            Err(AgentError::store(class, message))
        }
    }
}

impl<'a, 'r> Session<'a, 'r> {
    pub fn new(
        repo: &'r Repository,
        cache: &'a mut dyn Cache,
        indexes: &'a mut IndexTable,
        events: &'a Events,
    ) -> Self {
        Self {
            repo,
            cache,
            indexes,
            events,
        }
    }

    /// The live repository handle. Valid only for the duration of the body.
    pub fn repo(&self) -> &'r Repository {
        self.repo
    }

    /// Run one operation through the cache and translator. Streaming
    /// operations are materialised into a `Value::List`.
    pub fn execute(&mut self, op: &Operation) -> Result<Value> {
        let timer = Timer::start();
        let key = self.cache.key_for(op);
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get(k)) {
            self.events
                .record(EventKind::Operation, op.name(), format!("{op:?}"), &timer, true, true);
            return Ok(hit);
        }

        let result =
            commands::execute(self.repo, self.indexes, op).and_then(|outcome| match outcome {
                Outcome::Value(value) => Ok(value),
                Outcome::Stream(s) => stream::collect_all(s).map(Value::List),
            });
        if let (Some(key), Ok(value)) = (key, &result) {
            self.cache.put(key, value.clone());
        }
        self.events.record(
            EventKind::Operation,
            op.name(),
            format!("{op:?}"),
            &timer,
            false,
            result.is_ok(),
        );
        result
    }

    pub fn execute_as<T: FromValue>(&mut self, op: &Operation) -> Result<T> {
        T::from_value(self.execute(op)?)
    }

    /// Run `body`, memoized under `name` when one is given. A panic inside
    /// the body becomes a `Store` error.
    pub fn run<F>(&mut self, name: Option<&str>, body: F) -> Result<Value>
    where
        F: FnOnce(&mut Self) -> Result<Value>,
    {
        let timer = Timer::start();
        let label = name.unwrap_or("transaction");
        let key = name.and_then(|n| self.cache.key_for_transaction(n));
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get(k)) {
            self.events
                .record(EventKind::Transaction, label, String::new(), &timer, true, true);
            return Ok(hit);
        }

        let result = catch_panic("Transaction", label, || body(self));
        if let (Some(key), Ok(value)) = (key, &result) {
            self.cache.put(key, value.clone());
        }
        self.events.record(
            EventKind::Transaction,
            label,
            String::new(),
            &timer,
            false,
            result.is_ok(),
        );
        result
    }

    /// Nested transaction in the same turn, returning a typed result.
    pub fn transaction<T, F>(&mut self, name: Option<&str>, body: F) -> Result<T>
    where
        T: Any + Send + Sync + Clone,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.run(name, |s| body(s).map(Value::custom))?.downcast::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LruCache;
    use uuid::Uuid;

    fn repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn named_transaction_runs_once() {
        let (_dir, repo) = repo();
        let mut cache = LruCache::new(8);
        let mut indexes = IndexTable::new();
        let events = Events::new(Uuid::new_v4(), Vec::new());
        let mut session = Session::new(&repo, &mut cache, &mut indexes, &events);

        let mut calls = 0;
        let first: bool = session
            .transaction(Some("empty?"), |s| {
                calls += 1;
                s.execute_as(&Operation::IsEmpty)
            })
            .unwrap();
        let second: bool = session
            .transaction(Some("empty?"), |s| {
                calls += 1;
                s.execute_as(&Operation::IsEmpty)
            })
            .unwrap();
        assert!(first && second);
        assert_eq!(calls, 1);
    }

    #[test]
    fn unnamed_transaction_is_never_cached() {
        let (_dir, repo) = repo();
        let mut cache = LruCache::new(8);
        let mut indexes = IndexTable::new();
        let events = Events::new(Uuid::new_v4(), Vec::new());
        let mut session = Session::new(&repo, &mut cache, &mut indexes, &events);

        let mut calls = 0;
        for _ in 0..2 {
            let _: u32 = session
                .transaction(None, |_| {
                    calls += 1;
                    Ok(7u32)
                })
                .unwrap();
        }
        assert_eq!(calls, 2);
    }

    #[test]
    fn panicking_body_becomes_store_error() {
        let (_dir, repo) = repo();
        let mut cache = LruCache::new(8);
        let mut indexes = IndexTable::new();
        let events = Events::new(Uuid::new_v4(), Vec::new());
        let mut session = Session::new(&repo, &mut cache, &mut indexes, &events);

        let err = session
            .run(Some("boom"), |_| panic!("boom"))
            .unwrap_err();
        assert!(matches!(err, AgentError::Store { .. }));
        // Failures are not memoized.
        assert!(session.run(Some("boom"), |_| Ok(Value::Unit)).is_ok());
    }
}
