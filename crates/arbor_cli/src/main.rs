//! ARBOR CLI
//!
//! Ingests a directory of node logs and replays the overlay topology.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod report;

use arbor_log::{IngestError, Timeline, build_timeline, detect_stable_position};
use arbor_replay::{DeletionPolicy, ReplayEngine};
use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use config::ArborConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "ARBOR - replay tree-overlay topology from node logs", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Write diagnostics as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Corpus {
    /// Directory holding one log file per node
    dir: PathBuf,
    /// Extension of log files
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Args)]
struct Position {
    /// Timeline index (clamped; defaults to the last event)
    #[arg(long, conflicts_with_all = ["time", "stable"])]
    at: Option<i64>,
    /// Milliseconds after the first event
    #[arg(long, conflicts_with = "stable")]
    time: Option<i64>,
    /// Just before the widest quiet gap
    #[arg(long)]
    stable: bool,
}

#[derive(Args)]
struct ReplayArgs {
    /// Checkpoint every N events
    #[arg(long)]
    checkpoint_interval: Option<usize>,
    /// Drop dead vertices once nothing points at them
    #[arg(long)]
    purge_isolated: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Event counts, time range and stable position
    Summary {
        #[command(flatten)]
        corpus: Corpus,
    },
    /// List events
    Events {
        #[command(flatten)]
        corpus: Corpus,
        /// Include view and metadata events
        #[arg(long)]
        all: bool,
    },
    /// Print the topology at a position
    Show {
        #[command(flatten)]
        corpus: Corpus,
        #[command(flatten)]
        position: Position,
        #[command(flatten)]
        replay: ReplayArgs,
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print every attribute of one node at a position
    Describe {
        #[command(flatten)]
        corpus: Corpus,
        #[command(flatten)]
        position: Position,
        #[command(flatten)]
        replay: ReplayArgs,
        /// Node name
        #[arg(short, long)]
        node: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("arbor=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn load_timeline(corpus: &Corpus, config: &mut ArborConfig) -> Result<Timeline> {
    if let Some(suffix) = &corpus.suffix {
        config.ingest.suffix = suffix.clone();
    }
    match build_timeline(&corpus.dir, &config.ingest).await {
        Ok(timeline) => Ok(timeline),
        Err(IngestError::Sources(failures)) => {
            for failure in &failures {
                tracing::error!(file = failure.file(), "{failure}");
            }
            Err(eyre!("{} log file(s) could not be parsed", failures.len()))
        }
        Err(err) => Err(err.into()),
    }
}

fn replay_to(
    timeline: Timeline,
    config: &mut ArborConfig,
    position: &Position,
    replay: &ReplayArgs,
) -> Result<ReplayEngine> {
    if let Some(interval) = replay.checkpoint_interval {
        config.replay.checkpoint_interval = interval;
    }
    if replay.purge_isolated {
        config.replay.deletion_policy = DeletionPolicy::PurgeIsolated;
    }

    let mut engine = ReplayEngine::with_config(timeline, config.replay.clone());
    if position.stable {
        let period = detect_stable_position(engine.timeline())?;
        engine.seek(period.index as i64)?;
    } else if let Some(offset) = position.time {
        engine.seek_to_time(offset)?;
    } else {
        engine.seek(position.at.unwrap_or(i64::MAX))?;
    }
    Ok(engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = match &cli.config {
        Some(path) => ArborConfig::load(path)?,
        None => ArborConfig::default(),
    };

    match cli.command {
        Commands::Summary { corpus } => {
            let timeline = load_timeline(&corpus, &mut config).await?;
            let stable = detect_stable_position(&timeline).ok();
            println!("{}", report::summary(&timeline, stable));
            Ok(())
        }
        Commands::Events { corpus, all } => {
            let timeline = load_timeline(&corpus, &mut config).await?;
            for event in timeline.iter().filter(|e| all || e.is_structural()) {
                println!("{}", report::event_row(&timeline, event));
            }
            Ok(())
        }
        Commands::Show {
            corpus,
            position,
            replay,
            json,
        } => {
            let timeline = load_timeline(&corpus, &mut config).await?;
            let engine = replay_to(timeline, &mut config, &position, &replay)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&engine.snapshot().to_data())?);
            } else {
                println!("{}", report::snapshot(&engine.snapshot()));
            }
            Ok(())
        }
        Commands::Describe {
            corpus,
            position,
            replay,
            node,
        } => {
            let timeline = load_timeline(&corpus, &mut config).await?;
            let engine = replay_to(timeline, &mut config, &position, &replay)?;
            let text = engine
                .describe(&node)
                .ok_or_else(|| eyre!("No vertex named {node}"))?;
            println!("{text}");
            Ok(())
        }
    }
}
