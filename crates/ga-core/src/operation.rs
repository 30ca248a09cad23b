use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::types::{IndexEntry, IndexId, ObjectId, ObjectKind, Rev, TreeEntry};

/// Descriptor of a single command the agent can execute.
///
/// The set is closed: the translator matches on it exhaustively and new
/// commands are added as new variants.
#[derive(Debug, Clone)]
pub enum Operation {
    // -- References ---------------------------------------------------------
    IsEmpty,
    Head,
    Branch { name: String },
    Branches,
    Tag { name: String },
    Tags,
    Reference { name: String },
    References { glob: Option<String> },
    ReferenceCreate {
        name: String,
        target: ObjectId,
        force: bool,
        message: String,
    },
    ReferenceDelete { name: String },

    // -- Objects ------------------------------------------------------------
    Revision { spec: String },
    Object { oid: ObjectId },
    BlobContent { oid: ObjectId },
    Peel {
        target: PeelTarget,
        kind: Option<ObjectKind>,
    },
    OdbWrite { kind: ObjectKind, data: Payload },
    CommitCreate(CommitSpec),

    // -- Trees --------------------------------------------------------------
    TreeEntryByPath { rev: Rev, path: String },
    TreeEntries { rev: Rev, path: String },
    TreeEntriesWithCommit { rev: Rev, path: String },

    // -- History ------------------------------------------------------------
    History { rev: Rev, options: HistoryOptions },
    HistoryCount { rev: Rev },
    AheadBehind { local: Rev, upstream: Rev },

    // -- Diff ---------------------------------------------------------------
    Diff {
        old: Option<Rev>,
        new: Rev,
        options: DiffOptions,
    },
    DiffStats {
        old: Option<Rev>,
        new: Rev,
        options: DiffOptions,
    },
    DiffFormat {
        old: Option<Rev>,
        new: Rev,
        options: DiffOptions,
        format: DiffFormat,
    },

    // -- Index --------------------------------------------------------------
    IndexNew,
    IndexOpen,
    IndexEntries { index: IndexId },
    IndexAdd { index: IndexId, entry: IndexEntry },
    IndexRemove { index: IndexId, path: String },
    IndexReadTree { index: IndexId, tree: Rev },
    IndexWriteTree { index: IndexId },
    IndexWrite { index: IndexId },
    IndexRelease { index: IndexId },

    // -- Packs & worktrees --------------------------------------------------
    PackCreate { oids: Vec<ObjectId> },
    WorktreeAdd {
        name: String,
        path: PathBuf,
        reference: Option<String>,
    },
    WorktreePrune { name: String },
}

impl Operation {
    /// Stable snake_case name used in events, logs and cache keys.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::IsEmpty => "is_empty",
            Operation::Head => "head",
            Operation::Branch { .. } => "branch",
            Operation::Branches => "branches",
            Operation::Tag { .. } => "tag",
            Operation::Tags => "tags",
            Operation::Reference { .. } => "reference",
            Operation::References { .. } => "references",
            Operation::ReferenceCreate { .. } => "reference_create",
            Operation::ReferenceDelete { .. } => "reference_delete",
            Operation::Revision { .. } => "revision",
            Operation::Object { .. } => "object",
            Operation::BlobContent { .. } => "blob_content",
            Operation::Peel { .. } => "peel",
            Operation::OdbWrite { .. } => "odb_write",
            Operation::CommitCreate(_) => "commit_create",
            Operation::TreeEntryByPath { .. } => "tree_entry_by_path",
            Operation::TreeEntries { .. } => "tree_entries",
            Operation::TreeEntriesWithCommit { .. } => "tree_entries_with_commit",
            Operation::History { .. } => "history",
            Operation::HistoryCount { .. } => "history_count",
            Operation::AheadBehind { .. } => "ahead_behind",
            Operation::Diff { .. } => "diff",
            Operation::DiffStats { .. } => "diff_stats",
            Operation::DiffFormat { .. } => "diff_format",
            Operation::IndexNew => "index_new",
            Operation::IndexOpen => "index_open",
            Operation::IndexEntries { .. } => "index_entries",
            Operation::IndexAdd { .. } => "index_add",
            Operation::IndexRemove { .. } => "index_remove",
            Operation::IndexReadTree { .. } => "index_read_tree",
            Operation::IndexWriteTree { .. } => "index_write_tree",
            Operation::IndexWrite { .. } => "index_write",
            Operation::IndexRelease { .. } => "index_release",
            Operation::PackCreate { .. } => "pack_create",
            Operation::WorktreeAdd { .. } => "worktree_add",
            Operation::WorktreePrune { .. } => "worktree_prune",
        }
    }

    /// Operations whose result is an unbounded sequence delivered in chunks.
    pub fn is_stream(&self) -> bool {
        matches!(
            self,
            Operation::Branches
                | Operation::Tags
                | Operation::References { .. }
                | Operation::TreeEntries { .. }
                | Operation::TreeEntriesWithCommit { .. }
                | Operation::History { .. }
        )
    }

    /// Operations that change repository or index state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Operation::ReferenceCreate { .. }
                | Operation::ReferenceDelete { .. }
                | Operation::OdbWrite { .. }
                | Operation::CommitCreate(_)
                | Operation::IndexAdd { .. }
                | Operation::IndexRemove { .. }
                | Operation::IndexReadTree { .. }
                | Operation::IndexWriteTree { .. }
                | Operation::IndexWrite { .. }
                | Operation::WorktreeAdd { .. }
                | Operation::WorktreePrune { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// What a peel starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeelTarget {
    Reference(String),
    Object(ObjectId),
    TreeEntry(TreeEntry),
}

/// Raw object bytes; `Debug` prints only the length so events stay small.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Payload(pub Vec<u8>);

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Revision walk ordering. The empty set means libgit2's default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySort {
    pub topological: bool,
    pub time: bool,
    pub reverse: bool,
}

impl HistorySort {
    pub fn flags(&self) -> git2::Sort {
        let mut sort = git2::Sort::NONE;
        if self.topological {
            sort |= git2::Sort::TOPOLOGICAL;
        }
        if self.time {
            sort |= git2::Sort::TIME;
        }
        if self.reverse {
            sort |= git2::Sort::REVERSE;
        }
        sort
    }
}

impl Default for HistorySort {
    fn default() -> Self {
        Self {
            topological: true,
            time: true,
            reverse: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOptions {
    #[serde(default)]
    pub sort: HistorySort,
    /// Keep only commits touching at least one of these paths.
    #[serde(default)]
    pub pathspec: Vec<String>,
    /// Commits (and their ancestors) excluded from the walk.
    #[serde(default)]
    pub hide: Vec<ObjectId>,
}

impl HistoryOptions {
    pub fn sorted(mut self, sort: HistorySort) -> Self {
        self.sort = sort;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.pathspec.push(path.into());
        self
    }

    pub fn hide(mut self, oid: ObjectId) -> Self {
        self.hide.push(oid);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOptions {
    #[serde(default)]
    pub pathspec: Vec<String>,
    #[serde(default)]
    pub context_lines: Option<u32>,
    #[serde(default)]
    pub ignore_whitespace: bool,
}

impl DiffOptions {
    pub fn to_git2(&self) -> git2::DiffOptions {
        let mut opts = git2::DiffOptions::new();
        for path in &self.pathspec {
            opts.pathspec(path.as_str());
        }
        if let Some(lines) = self.context_lines {
            opts.context_lines(lines);
        }
        opts.ignore_whitespace(self.ignore_whitespace);
        opts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffFormat {
    Patch,
    PatchHeader,
    Raw,
    NameOnly,
    NameStatus,
    Stat,
}

/// Identity used when writing a commit. `time = None` means "now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSpec {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub offset_minutes: i32,
}

impl SignatureSpec {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time: None,
            offset_minutes: 0,
        }
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn to_git2(&self) -> Result<git2::Signature<'static>> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(AgentError::invalid("signature name and email are required"));
        }
        let sig = match self.time {
            Some(time) => git2::Signature::new(
                &self.name,
                &self.email,
                &git2::Time::new(time.timestamp(), self.offset_minutes),
            )?,
            None => git2::Signature::now(&self.name, &self.email)?,
        };
        Ok(sig)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSpec {
    /// Reference to move to the new commit (`HEAD` or a full `refs/` name).
    #[serde(default)]
    pub update_ref: Option<String>,
    pub author: SignatureSpec,
    pub committer: SignatureSpec,
    pub message: String,
    pub tree: ObjectId,
    #[serde(default)]
    pub parents: Vec<ObjectId>,
}

impl CommitSpec {
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(AgentError::invalid("commit message is required"));
        }
        if let Some(name) = &self.update_ref {
            if name != "HEAD" && !name.starts_with(crate::refs::REFS_ROOT) {
                return Err(AgentError::invalid(format!(
                    "update_ref must be HEAD or a full reference name, got {name:?}"
                )));
            }
        }
        Ok(())
    }
}
