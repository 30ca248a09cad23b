//! Owned result shapes produced by the command translator.
//!
//! Nothing in here holds a libgit2 handle: every value is built inside the
//! agent thread and can be freely cloned, cached and sent across threads.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AgentError, Result};

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// Content hash identifying an immutable commit, tree, blob or tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(git2::Oid);

impl ObjectId {
    pub const HEX_LEN: usize = 40;

    /// Parse a full 40-character hex object id.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != Self::HEX_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AgentError::invalid(format!("malformed object id: {hex:?}")));
        }
        git2::Oid::from_str(hex)
            .map(Self)
            .map_err(|_| AgentError::invalid(format!("malformed object id: {hex:?}")))
    }

    /// Build from the raw 20-byte binary form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        git2::Oid::from_bytes(bytes)
            .map(Self)
            .map_err(|_| AgentError::invalid(format!("object id must be 20 bytes, got {}", bytes.len())))
    }

    pub fn raw(&self) -> git2::Oid {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Abbreviated 7-character form used for display.
    pub fn short(&self) -> String {
        format!("{:.7}", self.0)
    }
}

impl From<git2::Oid> for ObjectId {
    fn from(oid: git2::Oid) -> Self {
        Self(oid)
    }
}

impl FromStr for ObjectId {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ObjectId::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Revision arguments
// ---------------------------------------------------------------------------

/// A revision argument.
///
/// `Oid` names immutable content; `Spec` is a reference name or revspec and
/// may resolve differently over time. Only `Oid` arguments are ever used to
/// derive cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rev {
    Oid(ObjectId),
    Spec(String),
}

impl Rev {
    pub fn oid(&self) -> Option<ObjectId> {
        match self {
            Rev::Oid(oid) => Some(*oid),
            Rev::Spec(_) => None,
        }
    }
}

impl From<ObjectId> for Rev {
    fn from(oid: ObjectId) -> Self {
        Rev::Oid(oid)
    }
}

impl From<&str> for Rev {
    fn from(spec: &str) -> Self {
        Rev::Spec(spec.to_string())
    }
}

impl From<String> for Rev {
    fn from(spec: String) -> Self {
        Rev::Spec(spec)
    }
}

impl fmt::Display for Rev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rev::Oid(oid) => write!(f, "{oid}"),
            Rev::Spec(spec) => f.write_str(spec),
        }
    }
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    pub fn from_git2(kind: git2::ObjectType) -> Option<Self> {
        match kind {
            git2::ObjectType::Commit => Some(ObjectKind::Commit),
            git2::ObjectType::Tree => Some(ObjectKind::Tree),
            git2::ObjectType::Blob => Some(ObjectKind::Blob),
            git2::ObjectType::Tag => Some(ObjectKind::Tag),
            git2::ObjectType::Any => None,
        }
    }

    pub fn to_git2(self) -> git2::ObjectType {
        match self {
            ObjectKind::Commit => git2::ObjectType::Commit,
            ObjectKind::Tree => git2::ObjectType::Tree,
            ObjectKind::Blob => git2::ObjectType::Blob,
            ObjectKind::Tag => git2::ObjectType::Tag,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "commit" => Ok(ObjectKind::Commit),
            "tree" => Ok(ObjectKind::Tree),
            "blob" => Ok(ObjectKind::Blob),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(AgentError::invalid(format!("unknown object kind: {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Branch,
    Tag,
}

// ---------------------------------------------------------------------------
// References
// ---------------------------------------------------------------------------

/// A resolved (direct) reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Full name, e.g. `refs/heads/main`.
    pub name: String,
    /// Name with the recognised prefix stripped, e.g. `main`.
    pub shorthand: String,
    /// The recognised prefix, e.g. `refs/heads/`.
    pub prefix: String,
    /// `None` when the prefix is not a branch or tag root.
    pub kind: Option<RefKind>,
    pub oid: ObjectId,
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: DateTime<Utc>,
    pub offset_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub oid: ObjectId,
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub oid: ObjectId,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub oid: ObjectId,
    pub size: usize,
    pub binary: bool,
}

/// An annotated tag object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub oid: ObjectId,
    pub name: String,
    pub target: ObjectId,
    pub target_kind: Option<ObjectKind>,
    pub tagger: Option<Signature>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitObject {
    Commit(Commit),
    Tree(Tree),
    Blob(Blob),
    Tag(Tag),
}

impl GitObject {
    pub fn oid(&self) -> ObjectId {
        match self {
            GitObject::Commit(c) => c.oid,
            GitObject::Tree(t) => t.oid,
            GitObject::Blob(b) => b.oid,
            GitObject::Tag(t) => t.oid,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            GitObject::Commit(_) => ObjectKind::Commit,
            GitObject::Tree(_) => ObjectKind::Tree,
            GitObject::Blob(_) => ObjectKind::Blob,
            GitObject::Tag(_) => ObjectKind::Tag,
        }
    }
}

/// Result of resolving a revspec: the object plus the reference it went
/// through, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolved {
    pub object: GitObject,
    pub reference: Option<Reference>,
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub oid: ObjectId,
    pub name: String,
    /// Path from the root tree, using `/` separators.
    pub path: String,
    pub mode: i32,
    pub kind: Option<ObjectKind>,
}

/// A tree entry paired with the most recent commit that touched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntryCommit {
    pub entry: TreeEntry,
    pub commit: Commit,
}

// ---------------------------------------------------------------------------
// Diffs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaStatus {
    Unmodified,
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    Ignored,
    Untracked,
    Typechange,
    Unreadable,
    Conflicted,
}

impl From<git2::Delta> for DeltaStatus {
    fn from(delta: git2::Delta) -> Self {
        match delta {
            git2::Delta::Unmodified => DeltaStatus::Unmodified,
            git2::Delta::Added => DeltaStatus::Added,
            git2::Delta::Deleted => DeltaStatus::Deleted,
            git2::Delta::Modified => DeltaStatus::Modified,
            git2::Delta::Renamed => DeltaStatus::Renamed,
            git2::Delta::Copied => DeltaStatus::Copied,
            git2::Delta::Ignored => DeltaStatus::Ignored,
            git2::Delta::Untracked => DeltaStatus::Untracked,
            git2::Delta::Typechange => DeltaStatus::Typechange,
            git2::Delta::Unreadable => DeltaStatus::Unreadable,
            git2::Delta::Conflicted => DeltaStatus::Conflicted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffFile {
    pub oid: ObjectId,
    pub path: Option<String>,
    pub size: u64,
    pub mode: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// libgit2 origin marker: `+`, `-`, ` `, or one of the EOF markers.
    pub origin: char,
    pub content: String,
    pub old_lineno: Option<u32>,
    pub new_lineno: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub header: String,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffDelta {
    pub status: DeltaStatus,
    pub old_file: DiffFile,
    pub new_file: DiffFile,
    pub hunks: Vec<DiffHunk>,
}

impl DiffDelta {
    /// The new path, falling back to the old one for deletions.
    pub fn path(&self) -> Option<&str> {
        self.new_file
            .path
            .as_deref()
            .or(self.old_file.path.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diff {
    pub deltas: Vec<DiffDelta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffStats {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AheadBehind {
    pub ahead: usize,
    pub behind: usize,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Handle to an index held open inside the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexId(pub u64);

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexTimestamp {
    pub seconds: i32,
    pub nanoseconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub oid: ObjectId,
    pub mode: u32,
    pub file_size: u32,
    pub ctime: IndexTimestamp,
    pub mtime: IndexTimestamp,
    pub flags: u16,
}

impl IndexEntry {
    pub const MODE_FILE: u32 = 0o100644;
    pub const MODE_EXECUTABLE: u32 = 0o100755;

    /// Regular file entry with zeroed timestamps.
    pub fn file(path: impl Into<String>, oid: ObjectId, file_size: u32) -> Self {
        Self {
            path: path.into(),
            oid,
            mode: Self::MODE_FILE,
            file_size,
            ctime: IndexTimestamp::default(),
            mtime: IndexTimestamp::default(),
            flags: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Worktrees
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    pub name: String,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "3b18e512dba79e4c8300dd08aeb37f8e728b8dad";

    #[test]
    fn object_id_round_trips_through_hex() {
        let oid = ObjectId::from_hex(HEX).unwrap();
        assert_eq!(oid.to_string(), HEX);
        assert_eq!(oid.short(), "3b18e51");
    }

    #[test]
    fn object_id_rejects_bad_shapes() {
        let too_long = format!("{HEX}00");
        for bad in ["", "3b18e5", "zz18e512dba79e4c8300dd08aeb37f8e728b8dad", too_long.as_str()] {
            assert!(
                matches!(ObjectId::from_hex(bad), Err(AgentError::InvalidArgument(_))),
                "{bad:?} should be rejected"
            );
        }
        assert!(ObjectId::from_bytes(&[0u8; 19]).is_err());
    }

    #[test]
    fn object_id_serializes_as_hex_string() {
        let oid = ObjectId::from_hex(HEX).unwrap();
        let json = serde_json::to_string(&oid).unwrap();
        assert_eq!(json, format!("\"{HEX}\""));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, oid);
    }

    #[test]
    fn object_kind_parses() {
        assert_eq!("tree".parse::<ObjectKind>().unwrap(), ObjectKind::Tree);
        assert!("branch".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn commit_summary_is_first_line() {
        let sig = Signature {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            time: Utc::now(),
            offset_minutes: 0,
        };
        let oid = ObjectId::from_hex(HEX).unwrap();
        let commit = Commit {
            oid,
            tree: oid,
            parents: vec![],
            author: sig.clone(),
            committer: sig,
            message: "subject line\n\nbody".into(),
        };
        assert_eq!(commit.summary(), "subject line");
    }
}
