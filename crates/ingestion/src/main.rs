//! RISOTTO Ingestion
//!
//! Offline batch build:
//! 1. Reads a JSON-lines corpus
//! 2. Writes the paper and importance tables
//! 3. Embeds every document with the configured model
//! 4. Scores entailment with each configured backend

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use risotto_common::config::AppConfig;
use risotto_common::storage::Artifacts;
use risotto_common::telemetry::init_tracing;
use risotto_common::VERSION;
use risotto_ingestion::{ArtifactBuilder, BuildOptions, CorpusLoad, Stage};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "ingestion", version, about = "Build RISOTTO artifacts from a paper corpus")]
struct Cli {
    /// Configuration file (defaults to config/default + APP__ environment)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Artifact directory, overriding the configuration
    #[arg(long, global = true, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build (or refresh) the stored tables
    Build {
        /// JSON-lines corpus, one paper per line
        #[arg(long, value_name = "PATH")]
        corpus: PathBuf,

        /// Rebuild tables that already exist
        #[arg(long)]
        force: bool,

        /// Only run these stages (repeatable)
        #[arg(long = "stage", value_enum)]
        stages: Vec<Stage>,

        /// Only score these entailment backends (repeatable)
        #[arg(long = "backend")]
        backends: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(&path.to_string_lossy()),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;
    if let Some(dir) = &cli.artifacts {
        config.artifacts.dir = dir.clone();
    }

    init_tracing(&config.observability);
    info!(version = VERSION, artifacts = %config.artifacts.dir.display(), "Starting RISOTTO ingestion");

    match cli.command {
        Command::Build {
            corpus,
            force,
            stages,
            backends,
        } => {
            let corpus = CorpusLoad::read(&corpus).await?;
            let artifacts = Artifacts::open_dir(&config.artifacts.dir);
            let builder = ArtifactBuilder::new(artifacts, config)?;

            let stage_names: Vec<&str> = stages.iter().map(Stage::as_str).collect();
            info!(stages = ?stage_names, backends = ?backends, force, "Building artifacts");

            let options = BuildOptions {
                stages,
                backends,
                force,
            };
            let report = builder.build(&corpus, &options).await.map_err(|e| {
                error!(error = %e, "Build failed");
                e
            })?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
