use std::any::Any;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::stream::{Chunk, CursorId};
use crate::types::{
    AheadBehind, Blob, Commit, Diff, DiffStats, GitObject, IndexEntry, IndexId, ObjectId,
    Reference, Resolved, Tag, Tree, TreeEntry, TreeEntryCommit, Worktree,
};

/// Every reply shape the agent can produce.
#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Count(usize),
    Oid(ObjectId),
    AheadBehind(AheadBehind),
    Reference(Reference),
    Object(GitObject),
    Resolved(Resolved),
    TreeEntry(TreeEntry),
    TreeEntryCommit(TreeEntryCommit),
    Diff(Diff),
    DiffStats(DiffStats),
    Text(String),
    Bytes(Vec<u8>),
    Index(IndexId),
    IndexEntry(IndexEntry),
    Worktree(Worktree),
    /// A primary result together with the object it was peeled to via the
    /// `with` call option.
    Targeted {
        item: Box<Value>,
        target: GitObject,
    },
    List(Vec<Value>),
    Cursor(CursorId),
    Chunk(Chunk),
    /// Result of a transaction body.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Value::Custom(Arc::new(value))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Count(_) => "count",
            Value::Oid(_) => "oid",
            Value::AheadBehind(_) => "ahead_behind",
            Value::Reference(_) => "reference",
            Value::Object(_) => "object",
            Value::Resolved(_) => "resolved",
            Value::TreeEntry(_) => "tree_entry",
            Value::TreeEntryCommit(_) => "tree_entry_commit",
            Value::Diff(_) => "diff",
            Value::DiffStats(_) => "diff_stats",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Index(_) => "index",
            Value::IndexEntry(_) => "index_entry",
            Value::Worktree(_) => "worktree",
            Value::Targeted { .. } => "targeted",
            Value::List(_) => "list",
            Value::Cursor(_) => "cursor",
            Value::Chunk(_) => "chunk",
            Value::Custom(_) => "custom",
        }
    }

    /// Recover a transaction result of type `T`.
    pub fn downcast<T: Any + Clone>(self) -> Result<T> {
        match self {
            Value::Custom(inner) => {
                inner
                    .downcast_ref::<T>()
                    .cloned()
                    .ok_or(AgentError::UnexpectedReply {
                        expected: std::any::type_name::<T>(),
                        actual: "custom",
                    })
            }
            other => Err(unexpected(std::any::type_name::<T>(), &other)),
        }
    }
}

fn unexpected(expected: &'static str, actual: &Value) -> AgentError {
    AgentError::UnexpectedReply {
        expected,
        actual: actual.kind_name(),
    }
}

// ---------------------------------------------------------------------------
// Typed extraction
// ---------------------------------------------------------------------------

/// Conversion from a reply into the concrete type a typed call expects.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

macro_rules! from_variant {
    ($ty:ty, $variant:ident) => {
        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(unexpected(stringify!($ty), &other)),
                }
            }
        }
    };
}

from_variant!(bool, Bool);
from_variant!(usize, Count);
from_variant!(ObjectId, Oid);
from_variant!(AheadBehind, AheadBehind);
from_variant!(Reference, Reference);
from_variant!(GitObject, Object);
from_variant!(Resolved, Resolved);
from_variant!(TreeEntry, TreeEntry);
from_variant!(TreeEntryCommit, TreeEntryCommit);
from_variant!(Diff, Diff);
from_variant!(DiffStats, DiffStats);
from_variant!(String, Text);
from_variant!(Vec<u8>, Bytes);
from_variant!(IndexId, Index);
from_variant!(IndexEntry, IndexEntry);
from_variant!(Worktree, Worktree);

macro_rules! from_object {
    ($ty:ty, $variant:ident) => {
        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Object(GitObject::$variant(inner)) => Ok(inner),
                    other => Err(unexpected(stringify!($ty), &other)),
                }
            }
        }
    };
}

from_object!(Commit, Commit);
from_object!(Tree, Tree);
from_object!(Blob, Blob);
from_object!(Tag, Tag);

impl FromValue for () {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Unit => Ok(()),
            other => Err(unexpected("()", &other)),
        }
    }
}

/// A primary result paired with the object requested through `with`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targeted<T> {
    pub item: T,
    pub target: GitObject,
}

impl<T: FromValue> FromValue for Targeted<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Targeted { item, target } => Ok(Targeted {
                item: T::from_value(*item)?,
                target,
            }),
            other => Err(unexpected("targeted", &other)),
        }
    }
}
