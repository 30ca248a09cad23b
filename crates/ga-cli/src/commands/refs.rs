use std::io::Write;

use ga_agent::{AgentHandle, CallOptions, ChunkStream};
use ga_core::Reference;

use super::Output;

fn line(r: &Reference) -> String {
    format!("{} {}", r.oid, r.name)
}

pub async fn head<W: Write>(agent: &AgentHandle, out: &mut Output<W>) -> anyhow::Result<()> {
    let head = agent.head().await?;
    out.item(&head, |r| format!("{} {}", r.oid, r.shorthand))
}

/// Print references chunk by chunk as the agent produces them.
pub async fn list<W: Write>(
    agent: &AgentHandle,
    out: &mut Output<W>,
    glob: Option<&str>,
    branches: bool,
    tags: bool,
) -> anyhow::Result<()> {
    let opts = CallOptions::new();
    let mut stream: ChunkStream<Reference> = if branches {
        agent.branches(opts).await?
    } else if tags {
        agent.tags(opts).await?
    } else {
        agent.references(glob, opts).await?
    };
    while let Some(chunk) = stream.next_chunk().await? {
        for r in &chunk {
            out.item(r, line)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixture;

    #[tokio::test]
    async fn head_prints_short_name() {
        let text = fixture::run(false, |agent, mut out| async move {
            head(&agent, &mut out).await?;
            Ok::<_, anyhow::Error>(out)
        })
        .await;
        assert!(text.trim_end().ends_with(" main"), "{text}");
    }

    #[tokio::test]
    async fn branches_as_json_lines() {
        let text = fixture::run(true, |agent, mut out| async move {
            list(&agent, &mut out, None, true, false).await?;
            Ok::<_, anyhow::Error>(out)
        })
        .await;
        let rows: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "refs/heads/main");
        assert_eq!(rows[0]["kind"], "branch");
    }
}
