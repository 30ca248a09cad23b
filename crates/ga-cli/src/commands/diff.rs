use std::io::Write;

use ga_agent::AgentHandle;
use ga_core::{DiffFormat, DiffOptions, Rev};

use super::{rev, Output};

/// Which rendering of the diff to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Patch,
    Stat,
    NameOnly,
}

impl View {
    pub fn from_flags(stat: bool, name_only: bool) -> Self {
        match (stat, name_only) {
            (true, _) => View::Stat,
            (false, true) => View::NameOnly,
            (false, false) => View::Patch,
        }
    }

    fn format(self) -> DiffFormat {
        match self {
            View::Patch => DiffFormat::Patch,
            View::Stat => DiffFormat::Stat,
            View::NameOnly => DiffFormat::NameOnly,
        }
    }
}

/// With only `old` given, compare it against its first parent (or the empty
/// tree for a root commit).
async fn sides(agent: &AgentHandle, old: &str, new: Option<&str>) -> anyhow::Result<(Option<Rev>, Rev)> {
    if let Some(new) = new {
        return Ok((Some(rev(old)), rev(new)));
    }
    let commit = agent.revision(old).await?.object.oid();
    let parents = agent.commit(commit).await?.parents;
    Ok((parents.first().copied().map(Rev::Oid), Rev::Oid(commit)))
}

pub async fn run<W: Write>(
    agent: &AgentHandle,
    out: &mut Output<W>,
    old: &str,
    new: Option<&str>,
    paths: Vec<String>,
    view: View,
) -> anyhow::Result<()> {
    let (old, new) = sides(agent, old, new).await?;
    let options = DiffOptions {
        pathspec: paths,
        ..DiffOptions::default()
    };
    if out.is_json() {
        return match view {
            View::Stat => {
                let stats = agent.diff_stats(old, new, options).await?;
                out.item(&stats, |_| String::new())
            }
            View::Patch | View::NameOnly => {
                let diff = agent.diff(old, new, options).await?;
                out.item(&diff, |_| String::new())
            }
        };
    }
    let text = agent.diff_format(old, new, options, view.format()).await?;
    out.raw(&text)
}
