//! Step-wise peeling: reference → object, tag → target, commit → tree,
//! tree entry → object.
//!
//! libgit2's own `peel` is avoided so that an impossible step always
//! surfaces as `InvalidArgument` with the kinds involved, and the chain
//! stops at the first failed step.

use git2::Repository;

use crate::error::{AgentError, Result};
use crate::operation::PeelTarget;
use crate::refs;
use crate::store;
use crate::types::{GitObject, ObjectKind};

/// Resolve the immediate object a peel starts from.
pub fn start<'r>(repo: &'r Repository, target: &PeelTarget) -> Result<git2::Object<'r>> {
    match target {
        PeelTarget::Reference(name) => {
            let direct = refs::lookup(repo, name)?.resolve()?;
            let oid = direct
                .target()
                .ok_or_else(|| AgentError::not_found(format!("reference {name:?} has no target")))?;
            store::find_object(repo, oid.into())
        }
        PeelTarget::Object(oid) => store::find_object(repo, *oid),
        PeelTarget::TreeEntry(entry) => store::find_object(repo, entry.oid),
    }
}

fn kind_of(obj: &git2::Object<'_>) -> Result<ObjectKind> {
    obj.kind()
        .and_then(ObjectKind::from_git2)
        .ok_or_else(|| AgentError::store("Object", format!("unknown object type for {}", obj.id())))
}

fn cannot(from: ObjectKind, to: ObjectKind) -> AgentError {
    AgentError::invalid(format!("cannot peel {from} to {to}"))
}

/// Dereference `obj` until it has kind `target`. `None` returns `obj`.
pub fn peel_object<'r>(obj: git2::Object<'r>, target: Option<ObjectKind>) -> Result<git2::Object<'r>> {
    let Some(target) = target else {
        return Ok(obj);
    };
    let mut current = obj;
    loop {
        let kind = kind_of(&current)?;
        if kind == target {
            return Ok(current);
        }
        current = match kind {
            ObjectKind::Tag => {
                let tag = current.as_tag().ok_or_else(|| cannot(kind, target))?;
                tag.target()?
            }
            ObjectKind::Commit if matches!(target, ObjectKind::Tree | ObjectKind::Blob) => {
                let commit = current.as_commit().ok_or_else(|| cannot(kind, target))?;
                commit.tree()?.into_object()
            }
            _ => return Err(cannot(kind, target)),
        };
    }
}

pub fn peel(repo: &Repository, target: &PeelTarget, kind: Option<ObjectKind>) -> Result<GitObject> {
    let obj = peel_object(start(repo, target)?, kind)?;
    store::object(&obj)
}
