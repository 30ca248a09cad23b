//! Reference resolution and enumeration.

use git2::Repository;

use crate::error::{AgentError, Result};
use crate::stream::ValueStream;
use crate::types::{ObjectId, RefKind, Reference};
use crate::value::Value;

pub const REFS_ROOT: &str = "refs/";
pub const HEADS_ROOT: &str = "refs/heads/";
pub const TAGS_ROOT: &str = "refs/tags/";

/// Split a full reference name into `(prefix, shorthand, kind)` using the
/// longest recognised root.
pub fn split_name(name: &str) -> (&str, &str, Option<RefKind>) {
    if let Some(short) = name.strip_prefix(HEADS_ROOT) {
        (HEADS_ROOT, short, Some(RefKind::Branch))
    } else if let Some(short) = name.strip_prefix(TAGS_ROOT) {
        (TAGS_ROOT, short, Some(RefKind::Tag))
    } else if let Some(short) = name.strip_prefix(REFS_ROOT) {
        (REFS_ROOT, short, None)
    } else {
        ("", name, None)
    }
}

/// Look a reference up by full name (exact) or short name (disambiguated
/// the way `git rev-parse` does).
pub fn lookup<'r>(repo: &'r Repository, name: &str) -> Result<git2::Reference<'r>> {
    if name.trim().is_empty() {
        return Err(AgentError::invalid("empty reference name"));
    }
    let found = if name.starts_with(REFS_ROOT) || name == "HEAD" {
        repo.find_reference(name)
    } else {
        repo.resolve_reference_from_short_name(name)
    };
    found.map_err(|e| match e.code() {
        git2::ErrorCode::NotFound => AgentError::not_found(format!("reference {name:?}")),
        _ => AgentError::from(e),
    })
}

/// Convert a libgit2 reference, following symbolic references to their
/// direct target.
pub fn to_reference(reference: &git2::Reference<'_>) -> Result<Reference> {
    let direct = reference.resolve()?;
    let name = String::from_utf8_lossy(direct.name_bytes()).into_owned();
    let oid = direct
        .target()
        .map(ObjectId::from)
        .ok_or_else(|| AgentError::not_found(format!("reference {name:?} has no target")))?;
    let (prefix, shorthand, kind) = split_name(&name);
    let (prefix, shorthand) = (prefix.to_string(), shorthand.to_string());
    Ok(Reference {
        name,
        shorthand,
        prefix,
        kind,
        oid,
    })
}

pub fn find(repo: &Repository, name: &str) -> Result<Reference> {
    to_reference(&lookup(repo, name)?)
}

pub fn head(repo: &Repository) -> Result<Reference> {
    let head = repo.head().map_err(|e| match e.code() {
        git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound => {
            AgentError::not_found("HEAD (unborn branch)")
        }
        _ => AgentError::from(e),
    })?;
    to_reference(&head)
}

fn qualified(root: &str, name: &str) -> String {
    if name.starts_with(REFS_ROOT) {
        name.to_string()
    } else {
        format!("{root}{name}")
    }
}

pub fn branch(repo: &Repository, name: &str) -> Result<Reference> {
    find(repo, &qualified(HEADS_ROOT, name))
}

pub fn tag(repo: &Repository, name: &str) -> Result<Reference> {
    find(repo, &qualified(TAGS_ROOT, name))
}

/// Lazily enumerate references matching `glob` (all references when
/// `None`), in libgit2 iteration order.
pub fn references<'r>(repo: &'r Repository, glob: Option<&str>) -> Result<ValueStream<'r>> {
    let iter = match glob {
        Some(glob) => repo.references_glob(glob)?,
        None => repo.references()?,
    };
    Ok(Box::new(iter.map(|item| {
        let reference = item?;
        to_reference(&reference).map(Value::Reference)
    })))
}

pub fn branches(repo: &Repository) -> Result<ValueStream<'_>> {
    references(repo, Some("refs/heads/*"))
}

pub fn tags(repo: &Repository) -> Result<ValueStream<'_>> {
    references(repo, Some("refs/tags/*"))
}

pub fn create(
    repo: &Repository,
    name: &str,
    target: ObjectId,
    force: bool,
    message: &str,
) -> Result<Reference> {
    if !name.starts_with(REFS_ROOT) {
        return Err(AgentError::invalid(format!(
            "reference name must start with {REFS_ROOT}, got {name:?}"
        )));
    }
    // Validates the target exists before touching the refdb.
    crate::store::find_object(repo, target)?;
    let created = repo.reference(name, target.raw(), force, message)?;
    to_reference(&created)
}

pub fn delete(repo: &Repository, name: &str) -> Result<()> {
    if !name.starts_with(REFS_ROOT) {
        return Err(AgentError::invalid(format!(
            "reference name must start with {REFS_ROOT}, got {name:?}"
        )));
    }
    let mut reference = lookup(repo, name)?;
    reference.delete()?;
    Ok(())
}
