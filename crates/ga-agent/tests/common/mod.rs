//! Shared fixture: a small on-disk repository with a known shape.
//!
//! ```text
//! main:     c1 -- c2 -- c3
//!                   \
//! feature:           c4
//! ```
//!
//! `v1.0` is an annotated tag on c2, `light` a lightweight tag on c1.

#![allow(dead_code)]

use std::path::Path;

use ga_core::types::ObjectId;
use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use tempfile::TempDir;

pub const BASE_TIME: i64 = 1_700_000_000;

pub struct Fixture {
    pub dir: TempDir,
    pub c1: ObjectId,
    pub c2: ObjectId,
    pub c3: ObjectId,
    pub c4: ObjectId,
    pub tag: ObjectId,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn open(&self) -> Repository {
        Repository::open(self.path()).unwrap()
    }
}

fn signature(offset: i64) -> Signature<'static> {
    Signature::new("Ada", "ada@example.com", &Time::new(BASE_TIME + offset, 0)).unwrap()
}

fn blob_entry(repo: &Repository, path: &str, content: &str) -> git2::IndexEntry {
    let oid = repo.blob(content.as_bytes()).unwrap();
    git2::IndexEntry {
        ctime: git2::IndexTime::new(0, 0),
        mtime: git2::IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: content.len() as u32,
        id: oid,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

/// Commit `files` on top of `parent`'s tree, updating `update_ref`.
pub fn commit_files(
    repo: &Repository,
    update_ref: &str,
    parent: Option<Oid>,
    files: &[(&str, &str)],
    message: &str,
    offset: i64,
) -> Oid {
    let mut index = git2::Index::new().unwrap();
    let parent = parent.map(|oid| repo.find_commit(oid).unwrap());
    if let Some(parent) = &parent {
        index.read_tree(&parent.tree().unwrap()).unwrap();
    }
    for (path, content) in files {
        index.add(&blob_entry(repo, path, content)).unwrap();
    }
    let tree_oid = index.write_tree_to(repo).unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();
    let sig = signature(offset);
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some(update_ref), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(dir.path(), &opts).unwrap();

    let c1 = commit_files(
        &repo,
        "refs/heads/main",
        None,
        &[("README.md", "hello\n"), ("src/lib.rs", "pub fn a() {}\n")],
        "initial",
        0,
    );
    let c2 = commit_files(
        &repo,
        "refs/heads/main",
        Some(c1),
        &[
            ("src/lib.rs", "pub fn a() {}\npub fn b() {}\n"),
            ("docs/guide.md", "# Guide\n"),
        ],
        "add guide",
        60,
    );
    let c3 = commit_files(
        &repo,
        "refs/heads/main",
        Some(c2),
        &[("README.md", "hello\nworld\n")],
        "update readme",
        120,
    );
    repo.branch("feature", &repo.find_commit(c2).unwrap(), false)
        .unwrap();
    let c4 = commit_files(
        &repo,
        "refs/heads/feature",
        Some(c2),
        &[("feature.txt", "wip\n")],
        "start feature",
        180,
    );

    let tag = repo
        .tag(
            "v1.0",
            &repo.find_object(c2, None).unwrap(),
            &signature(240),
            "release 1.0",
            false,
        )
        .unwrap();
    repo.tag_lightweight("light", &repo.find_object(c1, None).unwrap(), false)
        .unwrap();

    let mut index = repo.index().unwrap();
    index
        .read_tree(&repo.find_commit(c3).unwrap().tree().unwrap())
        .unwrap();
    index.write().unwrap();

    Fixture {
        dir,
        c1: c1.into(),
        c2: c2.into(),
        c3: c3.into(),
        c4: c4.into(),
        tag: tag.into(),
    }
}
