//! Tree lookups and directory listings.

use std::path::Path;

use git2::Repository;

use crate::error::{AgentError, Result};
use crate::store;
use crate::stream::ValueStream;
use crate::types::{ObjectKind, Rev, TreeEntry};
use crate::value::Value;

/// Normalise a repository-relative path: strip surrounding slashes, reject
/// empty, `.` and `..` components.
pub fn normalize(path: &str) -> Result<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    for component in trimmed.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(AgentError::invalid(format!("invalid tree path: {path:?}")));
        }
    }
    Ok(trimmed.to_string())
}

pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

pub fn entry(e: &git2::TreeEntry<'_>, parent: &str) -> TreeEntry {
    let name = String::from_utf8_lossy(e.name_bytes()).into_owned();
    TreeEntry {
        oid: e.id().into(),
        path: join(parent, &name),
        name,
        mode: e.filemode(),
        kind: e.kind().and_then(ObjectKind::from_git2),
    }
}

/// The tree at `path` below the root tree of `rev`; the root itself when
/// `path` is empty.
pub fn subtree<'r>(repo: &'r Repository, rev: &Rev, path: &str) -> Result<git2::Tree<'r>> {
    let root = store::find_tree(repo, rev)?;
    let path = normalize(path)?;
    if path.is_empty() {
        return Ok(root);
    }
    let found = root.get_path(Path::new(&path)).map_err(|e| match e.code() {
        git2::ErrorCode::NotFound => AgentError::not_found(format!("path {path:?} in {rev}")),
        _ => AgentError::from(e),
    })?;
    found
        .to_object(repo)?
        .into_tree()
        .map_err(|_| AgentError::invalid(format!("{path:?} is not a directory")))
}

pub fn entry_by_path(repo: &Repository, rev: &Rev, path: &str) -> Result<TreeEntry> {
    let path = normalize(path)?;
    if path.is_empty() {
        return Err(AgentError::invalid("tree entry path is required"));
    }
    let root = store::find_tree(repo, rev)?;
    let found = root.get_path(Path::new(&path)).map_err(|e| match e.code() {
        git2::ErrorCode::NotFound => AgentError::not_found(format!("path {path:?} in {rev}")),
        _ => AgentError::from(e),
    })?;
    let parent = path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
    Ok(entry(&found, parent))
}

/// Lazy listing of one directory, in tree order.
pub struct TreeListing<'r> {
    tree: git2::Tree<'r>,
    parent: String,
    pos: usize,
}

impl<'r> TreeListing<'r> {
    pub fn new(tree: git2::Tree<'r>, parent: String) -> Self {
        Self {
            tree,
            parent,
            pos: 0,
        }
    }
}

impl Iterator for TreeListing<'_> {
    type Item = TreeEntry;

    fn next(&mut self) -> Option<TreeEntry> {
        let converted = self.tree.get(self.pos).map(|e| entry(&e, &self.parent))?;
        self.pos += 1;
        Some(converted)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.tree.len().saturating_sub(self.pos);
        (left, Some(left))
    }
}

pub fn entries<'r>(repo: &'r Repository, rev: &Rev, path: &str) -> Result<ValueStream<'r>> {
    let parent = normalize(path)?;
    let tree = subtree(repo, rev, &parent)?;
    Ok(Box::new(
        TreeListing::new(tree, parent).map(|e| Ok(Value::TreeEntry(e))),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_validates() {
        assert_eq!(normalize("/src/lib/").unwrap(), "src/lib");
        assert_eq!(normalize("").unwrap(), "");
        assert!(normalize("src/../etc").is_err());
        assert!(normalize("a//b").is_err());
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join("", "README.md"), "README.md");
        assert_eq!(join("src", "lib.rs"), "src/lib.rs");
    }
}
