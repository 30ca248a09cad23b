//! `ga` -- inspect a Git repository through the serializing agent.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ga_agent::Agent;
use ga_core::{ChunkSize, Config};
use tracing::debug;

use commands::Output;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Read-only views of a Git repository, served by a single agent thread.
#[derive(Parser)]
#[command(name = "ga", version, about)]
struct Cli {
    /// Repository to open.
    #[arg(long, short = 'C', global = true, default_value = ".")]
    repo: PathBuf,

    /// Config file (defaults to ~/.git-agent/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print one JSON document per result instead of text.
    #[arg(long, global = true)]
    json: bool,

    /// Items fetched from the agent per chunk.
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show where HEAD points.
    Head,

    /// List references.
    Refs {
        /// Only references matching this glob, e.g. `refs/remotes/*`.
        glob: Option<String>,
        /// Only branches.
        #[arg(long, conflicts_with_all = ["tags", "glob"])]
        branches: bool,
        /// Only tags.
        #[arg(long, conflicts_with = "glob")]
        tags: bool,
    },

    /// Walk history from a revision.
    Log {
        #[arg(default_value = "HEAD")]
        rev: String,
        /// Keep only commits touching this path. Repeatable.
        #[arg(long = "path", short = 'p')]
        paths: Vec<String>,
        /// Stop after this many commits.
        #[arg(long, short = 'n')]
        max_count: Option<usize>,
        /// Oldest first.
        #[arg(long)]
        reverse: bool,
    },

    /// List one directory of a revision's tree.
    LsTree {
        #[arg(default_value = "HEAD")]
        rev: String,
        #[arg(default_value = "")]
        path: String,
        /// Pair each entry with the last commit that touched it.
        #[arg(long)]
        with_commit: bool,
    },

    /// Show the object a revision resolves to.
    Show { rev: String },

    /// Count commits reachable from a revision.
    Count {
        #[arg(default_value = "HEAD")]
        rev: String,
    },

    /// Commits unique to each side of two revisions.
    AheadBehind { local: String, upstream: String },

    /// Compare two revisions (or one revision against the empty tree).
    Diff {
        /// Old side; omit `new` to diff `old` against its first parent.
        old: String,
        new: Option<String>,
        /// Restrict to these paths. Repeatable.
        #[arg(long = "path", short = 'p')]
        paths: Vec<String>,
        /// Summary of changed files instead of the patch.
        #[arg(long, conflicts_with = "name_only")]
        stat: bool,
        /// Only the names of changed files.
        #[arg(long)]
        name_only: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    ga_telemetry::logging::init_from_config("ga", &config.logging);
    if let Some(n) = cli.chunk_size {
        config.agent.stream_chunk_size = ChunkSize::new(n)?;
    }
    debug!(repo = %cli.repo.display(), "starting git agent");

    let agent = Agent::builder(&cli.repo)
        .config(config.agent)
        .start()
        .await
        .with_context(|| format!("cannot open repository at {}", cli.repo.display()))?;

    let mut out = Output::stdout(cli.json);
    let result = match cli.command {
        Commands::Head => commands::refs::head(&agent, &mut out).await,
        Commands::Refs {
            glob,
            branches,
            tags,
        } => commands::refs::list(&agent, &mut out, glob.as_deref(), branches, tags).await,
        Commands::Log {
            rev,
            paths,
            max_count,
            reverse,
        } => commands::history::log(&agent, &mut out, &rev, paths, max_count, reverse).await,
        Commands::LsTree {
            rev,
            path,
            with_commit,
        } => commands::tree::ls_tree(&agent, &mut out, &rev, &path, with_commit).await,
        Commands::Show { rev } => commands::tree::show(&agent, &mut out, &rev).await,
        Commands::Count { rev } => commands::history::count(&agent, &mut out, &rev).await,
        Commands::AheadBehind { local, upstream } => {
            commands::history::ahead_behind(&agent, &mut out, &local, &upstream).await
        }
        Commands::Diff {
            old,
            new,
            paths,
            stat,
            name_only,
        } => {
            let view = commands::diff::View::from_flags(stat, name_only);
            commands::diff::run(&agent, &mut out, &old, new.as_deref(), paths, view).await
        }
    };

    agent.stop().await;
    result
}
