use std::io::Write;

use ga_agent::{AgentHandle, CallOptions};
use ga_core::{Commit, GitObject, ObjectKind, Rev, Tag, TreeEntry, TreeEntryCommit};

use super::{rev, Output};

fn entry_line(e: &TreeEntry) -> String {
    let kind = e.kind.map(ObjectKind::as_str).unwrap_or("?");
    format!("{:06o} {} {}\t{}", e.mode, kind, e.oid, e.name)
}

fn entry_commit_line(row: &TreeEntryCommit) -> String {
    format!(
        "{}\t{} {}",
        entry_line(&row.entry),
        row.commit.oid.short(),
        row.commit.summary()
    )
}

pub async fn ls_tree<W: Write>(
    agent: &AgentHandle,
    out: &mut Output<W>,
    spec: &str,
    path: &str,
    with_commit: bool,
) -> anyhow::Result<()> {
    let opts = CallOptions::new();
    if with_commit {
        let mut stream = agent.tree_entries_with_commit(rev(spec), path, opts).await?;
        while let Some(chunk) = stream.next_chunk().await? {
            for row in &chunk {
                out.item(row, entry_commit_line)?;
            }
        }
    } else {
        let mut stream = agent.tree_entries(rev(spec), path, opts).await?;
        while let Some(chunk) = stream.next_chunk().await? {
            for e in &chunk {
                out.item(e, entry_line)?;
            }
        }
    }
    Ok(())
}

fn commit_text(c: &Commit) -> String {
    let mut text = format!(
        "commit {}\nAuthor: {} <{}>\nDate:   {}\n\n",
        c.oid,
        c.author.name,
        c.author.email,
        c.author.time.to_rfc2822()
    );
    for line in c.message.lines() {
        text.push_str("    ");
        text.push_str(line);
        text.push('\n');
    }
    text
}

fn tag_text(t: &Tag) -> String {
    let mut text = format!("tag {}\n", t.name);
    if let Some(tagger) = &t.tagger {
        text.push_str(&format!("Tagger: {} <{}>\n", tagger.name, tagger.email));
    }
    text.push_str(&format!("\n{}\n", t.message.trim_end()));
    text.push_str(&format!("target {}", t.target));
    text
}

pub async fn show<W: Write>(agent: &AgentHandle, out: &mut Output<W>, spec: &str) -> anyhow::Result<()> {
    let resolved = agent.revision(spec).await?;
    if out.is_json() {
        return out.item(&resolved, |_| String::new());
    }
    match &resolved.object {
        GitObject::Commit(c) => out.item(c, commit_text),
        GitObject::Tag(t) => out.item(t, tag_text),
        GitObject::Tree(t) => {
            let entries = agent
                .tree_entries(Rev::Oid(t.oid), "", CallOptions::new())
                .await?
                .try_collect()
                .await?;
            for e in &entries {
                out.item(e, entry_line)?;
            }
            Ok(())
        }
        GitObject::Blob(b) => {
            let bytes = agent.blob_content(b.oid).await?;
            out.raw(&String::from_utf8_lossy(&bytes))
        }
    }
}
