//! Revision walks, path-touch tests and graph counts.

use std::collections::VecDeque;
use std::path::Path;

use git2::{Oid, Repository, Revwalk};

use crate::error::{AgentError, Result};
use crate::operation::{HistoryOptions, HistorySort};
use crate::store;
use crate::stream::ValueStream;
use crate::tree::{self, TreeListing};
use crate::types::{AheadBehind, Commit, GitObject, ObjectId, Rev, TreeEntry, TreeEntryCommit};
use crate::value::Value;

/// Build a walker seeded at the commit `rev` resolves to.
pub fn walk<'r>(
    repo: &'r Repository,
    rev: &Rev,
    sort: HistorySort,
    hide: &[ObjectId],
) -> Result<Revwalk<'r>> {
    let seed = store::find_commit(repo, rev)?;
    let mut walk = repo.revwalk()?;
    walk.set_sorting(sort.flags())?;
    walk.push(seed.id())?;
    for oid in hide {
        walk.hide(oid.raw())?;
    }
    Ok(walk)
}

fn is_under(path: &str, root: &str) -> bool {
    path == root
        || (path.len() > root.len() && path.starts_with(root) && path.as_bytes()[root.len()] == b'/')
}

/// Which of `candidates` the commit touches: a path is touched when the diff
/// against the first parent changes it or anything below it, or, for a root
/// commit, when it exists in the commit's tree.
pub fn touched_paths(
    repo: &Repository,
    commit: &git2::Commit<'_>,
    candidates: &[String],
) -> Result<Vec<usize>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let tree = commit.tree()?;
    if commit.parent_count() == 0 {
        return Ok(candidates
            .iter()
            .enumerate()
            .filter(|(_, path)| tree.get_path(Path::new(path.as_str())).is_ok())
            .map(|(i, _)| i)
            .collect());
    }

    let parent_tree = commit.parent(0)?.tree()?;
    let mut opts = git2::DiffOptions::new();
    opts.disable_pathspec_match(true);
    for path in candidates {
        opts.pathspec(path.as_str());
    }
    let diff = repo.diff_tree_to_tree(Some(&parent_tree), Some(&tree), Some(&mut opts))?;

    let mut hit = vec![false; candidates.len()];
    for delta in diff.deltas() {
        for file in [delta.old_file(), delta.new_file()] {
            let Some(path) = file.path_bytes() else { continue };
            let path = String::from_utf8_lossy(path);
            for (i, candidate) in candidates.iter().enumerate() {
                if !hit[i] && is_under(&path, candidate) {
                    hit[i] = true;
                }
            }
        }
    }
    Ok(hit
        .into_iter()
        .enumerate()
        .filter(|(_, h)| *h)
        .map(|(i, _)| i)
        .collect())
}

pub fn touches(repo: &Repository, commit: &git2::Commit<'_>, pathspec: &[String]) -> Result<bool> {
    Ok(!touched_paths(repo, commit, pathspec)?.is_empty())
}

fn normalize_all(paths: &[String]) -> Result<Vec<String>> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let normalized = tree::normalize(path)?;
        if normalized.is_empty() {
            return Err(AgentError::invalid("empty pathspec entry"));
        }
        out.push(normalized);
    }
    Ok(out)
}

fn visit(
    repo: &Repository,
    oid: std::result::Result<Oid, git2::Error>,
    pathspec: &[String],
) -> Result<Option<Value>> {
    let commit = repo.find_commit(oid?)?;
    if !pathspec.is_empty() && !touches(repo, &commit, pathspec)? {
        return Ok(None);
    }
    Ok(Some(Value::Object(GitObject::Commit(store::commit(&commit)))))
}

/// Lazy history stream of commits, optionally restricted to commits that
/// touch `options.pathspec`.
pub fn history<'r>(
    repo: &'r Repository,
    rev: &Rev,
    options: &HistoryOptions,
) -> Result<ValueStream<'r>> {
    let pathspec = normalize_all(&options.pathspec)?;
    let walk = walk(repo, rev, options.sort, &options.hide)?;
    Ok(Box::new(
        walk.filter_map(move |oid| visit(repo, oid, &pathspec).transpose()),
    ))
}

/// Number of commits reachable from `rev`, including itself.
pub fn count(repo: &Repository, rev: &Rev) -> Result<usize> {
    let unsorted = HistorySort {
        topological: false,
        time: false,
        reverse: false,
    };
    let walk = walk(repo, rev, unsorted, &[])?;
    let mut n = 0;
    for oid in walk {
        oid?;
        n += 1;
    }
    Ok(n)
}

pub fn ahead_behind(repo: &Repository, local: &Rev, upstream: &Rev) -> Result<AheadBehind> {
    let local = store::find_commit(repo, local)?;
    let upstream = store::find_commit(repo, upstream)?;
    let (ahead, behind) = repo.graph_ahead_behind(local.id(), upstream.id())?;
    Ok(AheadBehind { ahead, behind })
}

// ---------------------------------------------------------------------------
// Last touching commit per tree entry
// ---------------------------------------------------------------------------

/// Walks history once, pairing each entry with the first (most recent)
/// commit that touches its path. Rows come out in listing order: an entry is
/// released once it and every entry before it are resolved. Ends as soon as
/// nothing is pending.
pub struct LastTouch<'r> {
    repo: &'r Repository,
    walk: Revwalk<'r>,
    /// Listing-ordered slots; `None` until a commit touches the entry.
    slots: VecDeque<(TreeEntry, Option<Commit>)>,
    failed: bool,
}

impl<'r> LastTouch<'r> {
    pub fn new(repo: &'r Repository, walk: Revwalk<'r>, listing: Vec<TreeEntry>) -> Self {
        Self {
            repo,
            walk,
            slots: listing.into_iter().map(|e| (e, None)).collect(),
            failed: false,
        }
    }

    fn step(&mut self, oid: Oid) -> Result<()> {
        let commit = self.repo.find_commit(oid)?;
        let unresolved: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, (_, c))| c.is_none())
            .map(|(i, _)| i)
            .collect();
        let paths: Vec<String> = unresolved
            .iter()
            .map(|&i| self.slots[i].0.path.clone())
            .collect();
        let hits = touched_paths(self.repo, &commit, &paths)?;
        if hits.is_empty() {
            return Ok(());
        }
        let converted = store::commit(&commit);
        for hit in hits {
            self.slots[unresolved[hit]].1 = Some(converted.clone());
        }
        Ok(())
    }

    fn release(&mut self) -> Option<TreeEntryCommit> {
        if !matches!(self.slots.front(), Some((_, Some(_)))) {
            return None;
        }
        match self.slots.pop_front() {
            Some((entry, Some(commit))) => Some(TreeEntryCommit { entry, commit }),
            _ => None,
        }
    }
}

impl Iterator for LastTouch<'_> {
    type Item = Result<TreeEntryCommit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.release() {
                return Some(Ok(row));
            }
            if self.failed || self.slots.is_empty() {
                return None;
            }
            let oid = match self.walk.next() {
                Some(Ok(oid)) => oid,
                None => {
                    // Nothing left to visit: entries no commit touched are skipped.
                    self.slots.retain(|(_, commit)| commit.is_some());
                    continue;
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            if let Err(e) = self.step(oid) {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}

pub fn entries_with_commit<'r>(
    repo: &'r Repository,
    rev: &Rev,
    path: &str,
) -> Result<ValueStream<'r>> {
    let parent = tree::normalize(path)?;
    let subtree = tree::subtree(repo, rev, &parent)?;
    let listing: Vec<TreeEntry> = TreeListing::new(subtree, parent).collect();
    let walk = walk(repo, rev, HistorySort::default(), &[])?;
    Ok(Box::new(
        LastTouch::new(repo, walk, listing).map(|r| r.map(Value::TreeEntryCommit)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_under_matches_directory_boundaries() {
        assert!(is_under("src/lib.rs", "src"));
        assert!(is_under("src", "src"));
        assert!(!is_under("srcs/lib.rs", "src"));
        assert!(!is_under("sr", "src"));
    }
}
