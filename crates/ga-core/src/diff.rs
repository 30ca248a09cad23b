//! Tree-to-tree comparison.

use git2::Repository;

use crate::error::{AgentError, Result};
use crate::operation::{DiffFormat, DiffOptions};
use crate::store;
use crate::types::{Diff, DiffDelta, DiffFile, DiffHunk, DiffLine, DiffStats, Rev};

/// Column width of the `Stat` rendering.
const STAT_WIDTH: usize = 80;

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Native diff between `old` (empty tree when `None`) and `new`.
fn native<'r>(
    repo: &'r Repository,
    old: Option<&Rev>,
    new: &Rev,
    options: &DiffOptions,
) -> Result<git2::Diff<'r>> {
    let old_tree = old.map(|rev| store::find_tree(repo, rev)).transpose()?;
    let new_tree = store::find_tree(repo, new)?;
    let mut opts = options.to_git2();
    let diff = repo.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), Some(&mut opts))?;
    Ok(diff)
}

fn file(f: &git2::DiffFile<'_>) -> DiffFile {
    DiffFile {
        oid: f.id().into(),
        path: f.path_bytes().map(lossy),
        size: f.size(),
        mode: u32::from(f.mode()),
    }
}

fn hunks(diff: &git2::Diff<'_>, idx: usize) -> Result<Vec<DiffHunk>> {
    let Some(patch) = git2::Patch::from_diff(diff, idx)? else {
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(patch.num_hunks());
    for h in 0..patch.num_hunks() {
        let (hunk, line_count) = patch.hunk(h)?;
        let mut lines = Vec::with_capacity(line_count);
        for l in 0..line_count {
            let line = patch.line_in_hunk(h, l)?;
            lines.push(DiffLine {
                origin: line.origin(),
                content: lossy(line.content()),
                old_lineno: line.old_lineno(),
                new_lineno: line.new_lineno(),
            });
        }
        out.push(DiffHunk {
            header: lossy(hunk.header()),
            old_start: hunk.old_start(),
            old_lines: hunk.old_lines(),
            new_start: hunk.new_start(),
            new_lines: hunk.new_lines(),
            lines,
        });
    }
    Ok(out)
}

pub fn diff(
    repo: &Repository,
    old: Option<&Rev>,
    new: &Rev,
    options: &DiffOptions,
) -> Result<Diff> {
    let native = native(repo, old, new, options)?;
    let mut deltas = Vec::with_capacity(native.deltas().len());
    for (idx, delta) in native.deltas().enumerate() {
        deltas.push(DiffDelta {
            status: delta.status().into(),
            old_file: file(&delta.old_file()),
            new_file: file(&delta.new_file()),
            hunks: hunks(&native, idx)?,
        });
    }
    Ok(Diff { deltas })
}

pub fn stats(
    repo: &Repository,
    old: Option<&Rev>,
    new: &Rev,
    options: &DiffOptions,
) -> Result<DiffStats> {
    let stats = native(repo, old, new, options)?.stats()?;
    Ok(DiffStats {
        files_changed: stats.files_changed(),
        insertions: stats.insertions(),
        deletions: stats.deletions(),
    })
}

/// Render the diff as text in one of git's output formats.
pub fn format(
    repo: &Repository,
    old: Option<&Rev>,
    new: &Rev,
    options: &DiffOptions,
    format: DiffFormat,
) -> Result<String> {
    let native = native(repo, old, new, options)?;
    let native_format = match format {
        DiffFormat::Stat => {
            let buf = native
                .stats()?
                .to_buf(git2::DiffStatsFormat::FULL, STAT_WIDTH)?;
            return buf
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| AgentError::store("Diff", "stat output is not valid UTF-8"));
        }
        DiffFormat::Patch => git2::DiffFormat::Patch,
        DiffFormat::PatchHeader => git2::DiffFormat::PatchHeader,
        DiffFormat::Raw => git2::DiffFormat::Raw,
        DiffFormat::NameOnly => git2::DiffFormat::NameOnly,
        DiffFormat::NameStatus => git2::DiffFormat::NameStatus,
    };

    let mut out = String::new();
    native.print(native_format, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            out.push(line.origin());
        }
        out.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(out)
}
