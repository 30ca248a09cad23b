//! Repository Store adapter.
//!
//! Opens the libgit2 handle and converts borrowed libgit2 objects into the
//! owned shapes in [`crate::types`]. Everything that touches a
//! `git2::Repository` directly routes lookups through here so error mapping
//! stays in one place.

use std::path::Path;

use chrono::{DateTime, Utc};
use git2::Repository;

use crate::error::{AgentError, Result};
use crate::types::{Blob, Commit, GitObject, ObjectId, ObjectKind, Rev, Signature, Tag, Tree};

/// Open the repository at `path` (a working directory or a bare gitdir).
pub fn open(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|e| match e.code() {
        git2::ErrorCode::NotFound => {
            AgentError::not_found(format!("no repository at {}", path.display()))
        }
        _ => AgentError::from(e),
    })
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn signature(sig: &git2::Signature<'_>) -> Signature {
    let when = sig.when();
    Signature {
        name: lossy(sig.name_bytes()),
        email: lossy(sig.email_bytes()),
        time: DateTime::<Utc>::from_timestamp(when.seconds(), 0).unwrap_or_default(),
        offset_minutes: when.offset_minutes(),
    }
}

pub fn commit(c: &git2::Commit<'_>) -> Commit {
    Commit {
        oid: c.id().into(),
        tree: c.tree_id().into(),
        parents: c.parent_ids().map(ObjectId::from).collect(),
        author: signature(&c.author()),
        committer: signature(&c.committer()),
        message: lossy(c.message_bytes()),
    }
}

pub fn tree(t: &git2::Tree<'_>) -> Tree {
    Tree {
        oid: t.id().into(),
        len: t.len(),
    }
}

pub fn blob(b: &git2::Blob<'_>) -> Blob {
    Blob {
        oid: b.id().into(),
        size: b.size(),
        binary: b.is_binary(),
    }
}

pub fn tag(t: &git2::Tag<'_>) -> Tag {
    Tag {
        oid: t.id().into(),
        name: lossy(t.name_bytes()),
        target: t.target_id().into(),
        target_kind: t.target_type().and_then(ObjectKind::from_git2),
        tagger: t.tagger().as_ref().map(signature),
        message: t.message_bytes().map(lossy).unwrap_or_default(),
    }
}

/// Convert any libgit2 object into its owned form.
pub fn object(obj: &git2::Object<'_>) -> Result<GitObject> {
    let converted = match obj.kind() {
        Some(git2::ObjectType::Commit) => obj.as_commit().map(|c| GitObject::Commit(commit(c))),
        Some(git2::ObjectType::Tree) => obj.as_tree().map(|t| GitObject::Tree(tree(t))),
        Some(git2::ObjectType::Blob) => obj.as_blob().map(|b| GitObject::Blob(blob(b))),
        Some(git2::ObjectType::Tag) => obj.as_tag().map(|t| GitObject::Tag(tag(t))),
        _ => None,
    };
    converted.ok_or_else(|| AgentError::store("Object", format!("unknown object type for {}", obj.id())))
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

pub fn find_object<'r>(repo: &'r Repository, oid: ObjectId) -> Result<git2::Object<'r>> {
    repo.find_object(oid.raw(), None).map_err(|e| match e.code() {
        git2::ErrorCode::NotFound => AgentError::not_found(format!("object {oid}")),
        _ => AgentError::from(e),
    })
}

/// Resolve a revision argument to the object it names.
pub fn resolve<'r>(repo: &'r Repository, rev: &Rev) -> Result<git2::Object<'r>> {
    match rev {
        Rev::Oid(oid) => find_object(repo, *oid),
        Rev::Spec(spec) => {
            if spec.trim().is_empty() {
                return Err(AgentError::invalid("empty revision"));
            }
            repo.revparse_single(spec).map_err(|e| match e.code() {
                git2::ErrorCode::NotFound => AgentError::not_found(format!("revision {spec:?}")),
                _ => AgentError::from(e),
            })
        }
    }
}

pub fn find_commit<'r>(repo: &'r Repository, rev: &Rev) -> Result<git2::Commit<'r>> {
    let obj = resolve(repo, rev)?;
    let kind = obj.kind().and_then(ObjectKind::from_git2);
    obj.peel_to_commit()
        .map_err(|_| match kind {
            Some(kind) => AgentError::invalid(format!("{rev} is a {kind}, not a commit")),
            None => AgentError::invalid(format!("{rev} is not a commit")),
        })
}

/// Resolve a revision to a tree: commits and tags are peeled, trees are
/// returned as-is.
pub fn find_tree<'r>(repo: &'r Repository, rev: &Rev) -> Result<git2::Tree<'r>> {
    let obj = resolve(repo, rev)?;
    let kind = obj.kind().and_then(ObjectKind::from_git2);
    obj.peel_to_tree()
        .map_err(|_| match kind {
            Some(kind) => AgentError::invalid(format!("{rev} is a {kind}, not a tree-ish")),
            None => AgentError::invalid(format!("{rev} is not a tree-ish")),
        })
}

pub fn find_blob<'r>(repo: &'r Repository, rev: &Rev) -> Result<git2::Blob<'r>> {
    let obj = resolve(repo, rev)?;
    let kind = obj.kind().and_then(ObjectKind::from_git2);
    obj.peel_to_blob()
        .map_err(|_| match kind {
            Some(kind) => AgentError::invalid(format!("{rev} is a {kind}, not a blob")),
            None => AgentError::invalid(format!("{rev} is not a blob")),
        })
}
