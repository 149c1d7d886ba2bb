//! RISOTTO Search
//!
//! Ranks papers from the artifacts written by the batch builder:
//! - Similarity: embed a free-text query, rank by cosine similarity
//! - Entailment: rank by a precomputed zero-shot entailment table
//!
//! Both combine relevance with citation importance.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use risotto_common::config::{AppConfig, ObservabilityConfig};
use risotto_common::embeddings::create_embedder;
use risotto_common::metrics::{register_metrics, LATENCY_BUCKETS, METRICS_PREFIX, MODEL_BUCKETS};
use risotto_common::models::RelevanceMetric;
use risotto_common::storage::Artifacts;
use risotto_common::telemetry::init_tracing;
use risotto_common::text::TextPreprocessor;
use risotto_common::VERSION;
use risotto_search::ranking::{RankRequest, RankedResult, SortKey};
use risotto_search::render::render;
use risotto_search::retrieval::VectorSearch;
use risotto_search::service::QueryService;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "search", version, about = "Rank papers by relevance and citation importance")]
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
    /// Rank by cosine similarity to a free-text query
    Similarity {
        /// Query text, e.g. "vaccines and therapeutics"
        query: String,

        #[command(flatten)]
        filters: Filters,
    },
    /// Rank by a precomputed entailment table
    Entailment {
        /// Backend name, e.g. "bart" or "bert"
        #[arg(long, default_value = "bart")]
        backend: String,

        #[command(flatten)]
        filters: Filters,
    },
    /// List backends with a stored entailment table
    Backends,
}

#[derive(clap::Args, Debug)]
struct Filters {
    /// Minimum rescaled importance in [0, 1]
    #[arg(long)]
    importance: Option<f64>,

    /// Minimum relevance (similarity in [-1, 1] or entailment percentage)
    #[arg(long)]
    relevance: Option<f64>,

    /// Sort column
    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    /// Number of papers to show
    #[arg(long)]
    top_k: Option<usize>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SortArg {
    Importance,
    Relevance,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Importance => SortKey::Importance,
            SortArg::Relevance => SortKey::Relevance,
        }
    }
}

impl Filters {
    fn apply(&self, mut request: RankRequest) -> RankRequest {
        if let Some(v) = self.importance {
            request.importance_threshold = v;
        }
        if let Some(v) = self.relevance {
            request.relevance_threshold = v;
        }
        if let Some(v) = self.sort {
            request.sort_key = v.into();
        }
        if let Some(v) = self.top_k {
            request.top_k = v;
        }
        request
    }
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
    install_metrics_exporter(&config.observability)?;

    info!(version = VERSION, artifacts = %config.artifacts.dir.display(), "Starting RISOTTO search");

    let artifacts = Artifacts::open_dir(&config.artifacts.dir);
    let preprocessor = Arc::new(TextPreprocessor::new(&config.preprocess));
    let embedder = create_embedder(&config.embedding)?;
    let search = VectorSearch::new(embedder, preprocessor, &config.embedding);
    let service = QueryService::new(artifacts, search, config.ranking.clone());

    match cli.command {
        Command::Similarity { query, filters } => {
            let request = filters.apply(service.default_request(RelevanceMetric::CosineDistance).await?);
            let result = service.rank_similarity(&query, &request).await?;
            print_result(&result, filters.json)?;
        }
        Command::Entailment { backend, filters } => {
            let request = filters.apply(service.default_request(RelevanceMetric::Entailment).await?);
            let result = service.rank_entailment(&backend, &request).await?;
            print_result(&result, filters.json)?;
        }
        Command::Backends => {
            for backend in service.entailment_backends().await? {
                println!("{}", backend);
            }
        }
    }

    Ok(())
}

fn print_result(result: &RankedResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", render(result));
    }
    info!(
        source = %result.source,
        returned = result.len(),
        matched = result.matched,
        dropped = result.dropped,
        "Query complete"
    );
    Ok(())
}

/// Serve Prometheus metrics when a port is configured
fn install_metrics_exporter(config: &ObservabilityConfig) -> Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    let addr: SocketAddr = ([0, 0, 0, 0], config.metrics_port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_query_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(Matcher::Suffix("_duration_seconds".to_string()), MODEL_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;

    register_metrics();
    info!(port = config.metrics_port, "Metrics exporter listening");
    Ok(())
}
