use std::io::Write;

use ga_agent::{AgentHandle, CallOptions};
use ga_core::{Commit, HistoryOptions, HistorySort};

use super::{rev, Output};

fn oneline(c: &Commit) -> String {
    format!("{} {}", c.oid.short(), c.summary())
}

pub async fn log<W: Write>(
    agent: &AgentHandle,
    out: &mut Output<W>,
    spec: &str,
    paths: Vec<String>,
    max_count: Option<usize>,
    reverse: bool,
) -> anyhow::Result<()> {
    let options = HistoryOptions {
        sort: HistorySort {
            reverse,
            ..HistorySort::default()
        },
        pathspec: paths,
        hide: Vec::new(),
    };
    let mut stream = agent.history(rev(spec), options, CallOptions::new()).await?;
    let mut remaining = max_count.unwrap_or(usize::MAX);
    // Dropping the stream early releases the agent-side cursor.
    while remaining > 0 {
        let Some(chunk) = stream.next_chunk().await? else {
            break;
        };
        for commit in chunk.iter().take(remaining) {
            out.item(commit, oneline)?;
        }
        remaining = remaining.saturating_sub(chunk.len());
    }
    Ok(())
}

pub async fn count<W: Write>(agent: &AgentHandle, out: &mut Output<W>, spec: &str) -> anyhow::Result<()> {
    let n = agent.history_count(rev(spec)).await?;
    out.item(&n, |n| n.to_string())
}

pub async fn ahead_behind<W: Write>(
    agent: &AgentHandle,
    out: &mut Output<W>,
    local: &str,
    upstream: &str,
) -> anyhow::Result<()> {
    let ab = agent.ahead_behind(rev(local), rev(upstream)).await?;
    out.item(&ab, |ab| format!("ahead {} behind {}", ab.ahead, ab.behind))
}
