//! Command translator: one exhaustive dispatch from [`Operation`] to the
//! Repository Store.

use git2::Repository;

use crate::diff;
use crate::error::{AgentError, Result};
use crate::history;
use crate::index::IndexTable;
use crate::operation::{CommitSpec, Operation};
use crate::peel;
use crate::refs;
use crate::store;
use crate::stream::ValueStream;
use crate::tree;
use crate::types::{ObjectId, ObjectKind, Resolved, Rev, Worktree};
use crate::value::Value;

/// What an operation produced: a finished value or a lazy stream that the
/// caller parks behind a cursor.
pub enum Outcome<'r> {
    Value(Value),
    Stream(ValueStream<'r>),
}

impl std::fmt::Debug for Outcome<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Outcome::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Value> for Outcome<'_> {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

/// Execute `op` against the repository.
pub fn execute<'r>(
    repo: &'r Repository,
    indexes: &mut IndexTable,
    op: &Operation,
) -> Result<Outcome<'r>> {
    let value = match op {
        // -- References -----------------------------------------------------
        Operation::IsEmpty => Value::Bool(repo.is_empty()?),
        Operation::Head => Value::Reference(refs::head(repo)?),
        Operation::Branch { name } => Value::Reference(refs::branch(repo, name)?),
        Operation::Branches => return Ok(Outcome::Stream(refs::branches(repo)?)),
        Operation::Tag { name } => Value::Reference(refs::tag(repo, name)?),
        Operation::Tags => return Ok(Outcome::Stream(refs::tags(repo)?)),
        Operation::Reference { name } => Value::Reference(refs::find(repo, name)?),
        Operation::References { glob } => {
            return Ok(Outcome::Stream(refs::references(repo, glob.as_deref())?));
        }
        Operation::ReferenceCreate {
            name,
            target,
            force,
            message,
        } => Value::Reference(refs::create(repo, name, *target, *force, message)?),
        Operation::ReferenceDelete { name } => {
            refs::delete(repo, name)?;
            Value::Unit
        }

        // -- Objects --------------------------------------------------------
        Operation::Revision { spec } => Value::Resolved(revision(repo, spec)?),
        Operation::Object { oid } => {
            Value::Object(store::object(&store::find_object(repo, *oid)?)?)
        }
        Operation::BlobContent { oid } => {
            let blob = store::find_blob(repo, &Rev::Oid(*oid))?;
            Value::Bytes(blob.content().to_vec())
        }
        Operation::Peel { target, kind } => Value::Object(peel::peel(repo, target, *kind)?),
        Operation::OdbWrite { kind, data } => {
            let oid = repo.odb()?.write(kind.to_git2(), &data.0)?;
            Value::Oid(oid.into())
        }
        Operation::CommitCreate(spec) => Value::Oid(commit_create(repo, spec)?),

        // -- Trees ----------------------------------------------------------
        Operation::TreeEntryByPath { rev, path } => {
            Value::TreeEntry(tree::entry_by_path(repo, rev, path)?)
        }
        Operation::TreeEntries { rev, path } => {
            return Ok(Outcome::Stream(tree::entries(repo, rev, path)?));
        }
        Operation::TreeEntriesWithCommit { rev, path } => {
            return Ok(Outcome::Stream(history::entries_with_commit(repo, rev, path)?));
        }

        // -- History --------------------------------------------------------
        Operation::History { rev, options } => {
            return Ok(Outcome::Stream(history::history(repo, rev, options)?));
        }
        Operation::HistoryCount { rev } => Value::Count(history::count(repo, rev)?),
        Operation::AheadBehind { local, upstream } => {
            Value::AheadBehind(history::ahead_behind(repo, local, upstream)?)
        }

        // -- Diff -----------------------------------------------------------
        Operation::Diff { old, new, options } => {
            Value::Diff(diff::diff(repo, old.as_ref(), new, options)?)
        }
        Operation::DiffStats { old, new, options } => {
            Value::DiffStats(diff::stats(repo, old.as_ref(), new, options)?)
        }
        Operation::DiffFormat {
            old,
            new,
            options,
            format,
        } => Value::Text(diff::format(repo, old.as_ref(), new, options, *format)?),

        // -- Index ----------------------------------------------------------
        Operation::IndexNew => Value::Index(indexes.create()?),
        Operation::IndexOpen => Value::Index(indexes.open(repo)?),
        Operation::IndexEntries { index } => Value::List(
            indexes
                .entries(*index)?
                .into_iter()
                .map(Value::IndexEntry)
                .collect(),
        ),
        Operation::IndexAdd { index, entry } => {
            indexes.add(*index, entry)?;
            Value::Unit
        }
        Operation::IndexRemove { index, path } => {
            indexes.remove(*index, path)?;
            Value::Unit
        }
        Operation::IndexReadTree { index, tree } => {
            indexes.read_tree(repo, *index, tree)?;
            Value::Unit
        }
        Operation::IndexWriteTree { index } => Value::Oid(indexes.write_tree(repo, *index)?),
        Operation::IndexWrite { index } => {
            indexes.write(*index)?;
            Value::Unit
        }
        Operation::IndexRelease { index } => {
            indexes.release(*index)?;
            Value::Unit
        }

        // -- Packs & worktrees ----------------------------------------------
        Operation::PackCreate { oids } => Value::Bytes(pack_create(repo, oids)?),
        Operation::WorktreeAdd {
            name,
            path,
            reference,
        } => Value::Worktree(worktree_add(repo, name, path, reference.as_deref())?),
        Operation::WorktreePrune { name } => {
            let worktree = repo.find_worktree(name)?;
            let mut opts = git2::WorktreePruneOptions::new();
            opts.valid(true);
            worktree.prune(Some(&mut opts))?;
            Value::Unit
        }
    };
    Ok(Outcome::Value(value))
}

fn revision(repo: &Repository, spec: &str) -> Result<Resolved> {
    if spec.trim().is_empty() {
        return Err(AgentError::invalid("empty revision"));
    }
    let (object, reference) = repo.revparse_ext(spec).map_err(|e| match e.code() {
        git2::ErrorCode::NotFound => AgentError::not_found(format!("revision {spec:?}")),
        _ => AgentError::from(e),
    })?;
    Ok(Resolved {
        object: store::object(&object)?,
        reference: reference.as_ref().map(refs::to_reference).transpose()?,
    })
}

fn commit_create(repo: &Repository, spec: &CommitSpec) -> Result<ObjectId> {
    spec.validate()?;
    let author = spec.author.to_git2()?;
    let committer = spec.committer.to_git2()?;
    let tree = store::find_tree(repo, &Rev::Oid(spec.tree))?;
    let parents = spec
        .parents
        .iter()
        .map(|oid| store::find_commit(repo, &Rev::Oid(*oid)))
        .collect::<Result<Vec<_>>>()?;
    let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
    let oid = repo.commit(
        spec.update_ref.as_deref(),
        &author,
        &committer,
        &spec.message,
        &tree,
        &parent_refs,
    )?;
    Ok(oid.into())
}

fn pack_create(repo: &Repository, oids: &[ObjectId]) -> Result<Vec<u8>> {
    let mut builder = repo.packbuilder()?;
    for oid in oids {
        store::find_object(repo, *oid)?;
        builder.insert_recursive(oid.raw(), None)?;
    }
    let mut buf = git2::Buf::new();
    builder.write_buf(&mut buf)?;
    Ok(buf.to_vec())
}

fn worktree_add(
    repo: &Repository,
    name: &str,
    path: &std::path::Path,
    reference: Option<&str>,
) -> Result<Worktree> {
    if name.trim().is_empty() {
        return Err(AgentError::invalid("worktree name is required"));
    }
    let reference = reference.map(|r| refs::lookup(repo, r)).transpose()?;
    let mut opts = git2::WorktreeAddOptions::new();
    opts.reference(reference.as_ref());
    let worktree = repo.worktree(name, path, Some(&opts))?;
    Ok(Worktree {
        name: worktree.name().unwrap_or(name).to_string(),
        path: worktree.path().to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// `with` targets
// ---------------------------------------------------------------------------

/// Pair a result with the object it peels to.
///
/// References, objects, resolved revisions, oids and tree entries are
/// peeled directly; an entry-with-commit peels its commit. A reference to an
/// annotated tag reports the peeled target's oid.
pub fn with_target(repo: &Repository, value: Value, kind: ObjectKind) -> Result<Value> {
    let start = match &value {
        Value::Reference(r) => r.oid,
        Value::Object(o) => o.oid(),
        Value::Resolved(r) => r.object.oid(),
        Value::Oid(oid) => *oid,
        Value::TreeEntry(e) => e.oid,
        Value::TreeEntryCommit(tc) => tc.commit.oid,
        other => {
            return Err(AgentError::invalid(format!(
                "`with` cannot be applied to a {} result",
                other.kind_name()
            )));
        }
    };
    let obj = store::find_object(repo, start)?;
    let was_tag = obj.kind() == Some(git2::ObjectType::Tag);
    let peeled = peel::peel_object(obj, Some(kind))?;
    let target = store::object(&peeled)?;

    let item = match value {
        Value::Reference(mut r) if was_tag => {
            r.oid = target.oid();
            Value::Reference(r)
        }
        other => other,
    };
    Ok(Value::Targeted {
        item: Box::new(item),
        target,
    })
}

/// Apply an optional `with` target to an outcome; streams are peeled per
/// item as they are pulled.
pub fn apply_with<'r>(
    repo: &'r Repository,
    outcome: Outcome<'r>,
    with: Option<ObjectKind>,
) -> Result<Outcome<'r>> {
    let Some(kind) = with else {
        return Ok(outcome);
    };
    match outcome {
        Outcome::Value(value) => with_target(repo, value, kind).map(Outcome::Value),
        Outcome::Stream(stream) => Ok(Outcome::Stream(Box::new(
            stream.map(move |item| item.and_then(|v| with_target(repo, v, kind))),
        ))),
    }
}
