//! Artifact builder
//!
//! Runs the offline stages that turn a corpus into stored tables:
//! papers, importance, document embeddings and one entailment table per
//! backend. Each table is written once, whole, at the end of its stage.
//! Backend failures are retried here with exponential backoff; the
//! components themselves never retry.

use crate::corpus::CorpusLoad;
use crate::errors::IngestionError;
use backoff::{future::retry, ExponentialBackoffBuilder};
use risotto_common::config::{AppConfig, EntailmentBackendConfig};
use risotto_common::embeddings::{create_embedder, Embedder};
use risotto_common::errors::AppError;
use risotto_common::models::{Document, PaperTable};
use risotto_common::nli::create_classifier;
use risotto_common::storage::{Artifacts, TableKey};
use risotto_common::text::TextPreprocessor;
use risotto_search::citation::build_importance;
use risotto_search::retrieval::{EntailmentScorer, VectorSearch};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Build stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Papers,
    Importance,
    Embeddings,
    Entailment,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Papers, Stage::Importance, Stage::Embeddings, Stage::Entailment];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Papers => "papers",
            Stage::Importance => "importance",
            Stage::Embeddings => "embeddings",
            Stage::Entailment => "entailment",
        }
    }
}

/// What to build
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Stages to run; empty means all
    pub stages: Vec<Stage>,
    /// Entailment backends to score; empty means every configured one
    pub backends: Vec<String>,
    /// Rebuild tables that already exist
    pub force: bool,
}

impl BuildOptions {
    fn runs(&self, stage: Stage) -> bool {
        self.stages.is_empty() || self.stages.contains(&stage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Built,
    /// Table already present (or up to date) and not forced
    Skipped,
}

/// Outcome of one table
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub table: String,
    pub status: StageStatus,
    pub rows: usize,
    pub attempts: u32,
}

/// Outcome of a whole build
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub documents: usize,
    pub excluded: usize,
    pub duplicates: usize,
    pub tables: Vec<StageReport>,
}

impl BuildReport {
    pub fn built(&self) -> usize {
        self.tables.iter().filter(|t| t.status == StageStatus::Built).count()
    }
}

/// Offline table builder
pub struct ArtifactBuilder {
    artifacts: Artifacts,
    config: AppConfig,
    embedder: Arc<dyn Embedder>,
    preprocessor: Arc<TextPreprocessor>,
}

impl ArtifactBuilder {
    /// Create a builder using the configured embedding provider
    pub fn new(artifacts: Artifacts, config: AppConfig) -> Result<Self, IngestionError> {
        let embedder = create_embedder(&config.embedding)?;
        Ok(Self::with_embedder(artifacts, config, embedder))
    }

    pub fn with_embedder(artifacts: Artifacts, config: AppConfig, embedder: Arc<dyn Embedder>) -> Self {
        let preprocessor = Arc::new(TextPreprocessor::new(&config.preprocess));
        Self {
            artifacts,
            config,
            embedder,
            preprocessor,
        }
    }

    /// Run the selected stages over a loaded corpus
    #[instrument(skip(self, corpus, options), fields(documents = corpus.documents.len(), force = options.force))]
    pub async fn build(&self, corpus: &CorpusLoad, options: &BuildOptions) -> Result<BuildReport, IngestionError> {
        let backends = self.select_backends(&options.backends)?;
        let documents = &corpus.documents;

        if documents.is_empty() {
            warn!("Corpus is empty; tables will be empty");
        }

        let mut report = BuildReport {
            documents: documents.len(),
            excluded: corpus.excluded(),
            duplicates: corpus.duplicates,
            tables: Vec::new(),
        };

        for stage in Stage::ALL {
            if !options.runs(stage) {
                continue;
            }
            match stage {
                Stage::Papers => report.tables.push(self.build_papers(documents, options.force).await?),
                Stage::Importance => report.tables.push(self.build_importance(documents, options.force).await?),
                Stage::Embeddings => report.tables.push(self.build_embeddings(documents, options.force).await?),
                Stage::Entailment => {
                    for backend in &backends {
                        report
                            .tables
                            .push(self.build_entailment(documents, backend, options.force).await?);
                    }
                }
            }
        }

        info!(built = report.built(), tables = report.tables.len(), "Build complete");
        Ok(report)
    }

    fn select_backends(&self, names: &[String]) -> Result<Vec<EntailmentBackendConfig>, IngestionError> {
        if names.is_empty() {
            return Ok(self.config.entailment.backends.clone());
        }
        names
            .iter()
            .map(|name| {
                self.config
                    .entailment_backend(name)
                    .cloned()
                    .ok_or_else(|| IngestionError::UnknownBackend(name.clone()))
            })
            .collect()
    }

    async fn skip_existing(&self, key: &TableKey, force: bool) -> Result<Option<StageReport>, IngestionError> {
        if !force && self.artifacts.exists(key).await? {
            info!(table = %key, "Table exists, skipping");
            return Ok(Some(StageReport {
                table: key.to_string(),
                status: StageStatus::Skipped,
                rows: 0,
                attempts: 0,
            }));
        }
        Ok(None)
    }

    async fn build_papers(&self, documents: &[Document], force: bool) -> Result<StageReport, IngestionError> {
        let key = TableKey::papers();
        if let Some(skipped) = self.skip_existing(&key, force).await? {
            return Ok(skipped);
        }

        let table = PaperTable::from_summaries(documents.iter().map(Document::summary));
        self.artifacts.save_papers(&table).await?;
        Ok(built(&key, table.len(), 1))
    }

    async fn build_importance(&self, documents: &[Document], force: bool) -> Result<StageReport, IngestionError> {
        let key = TableKey::importance();
        if let Some(skipped) = self.skip_existing(&key, force).await? {
            return Ok(skipped);
        }

        let table = build_importance(documents, &self.config.importance)?;
        if !table.converged {
            warn!(
                iterations = table.iterations,
                residual = table.residual,
                "Importance stored without converging"
            );
        }
        self.artifacts.save_importance(&table).await?;
        Ok(built(&key, table.scores.len(), 1))
    }

    async fn build_embeddings(&self, documents: &[Document], force: bool) -> Result<StageReport, IngestionError> {
        let search = VectorSearch::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.preprocessor),
            &self.config.embedding,
        );
        let key = TableKey::embeddings(search.model_name());

        let existing = if force {
            None
        } else {
            self.artifacts.embeddings(search.model_name()).await?
        };

        let ((table, rebuilt), attempts) = self
            .with_retry(key.to_string(), || search.embed_all_if_stale(documents, existing.clone()))
            .await?;

        if !rebuilt {
            info!(table = %key, "Embeddings up to date, skipping");
            return Ok(StageReport {
                table: key.to_string(),
                status: StageStatus::Skipped,
                rows: table.len(),
                attempts,
            });
        }

        self.artifacts.save_embeddings(&table).await?;
        Ok(built(&key, table.len(), attempts))
    }

    async fn build_entailment(
        &self,
        documents: &[Document],
        backend: &EntailmentBackendConfig,
        force: bool,
    ) -> Result<StageReport, IngestionError> {
        let classifier = create_classifier(backend, &self.config.entailment)?;
        let key = TableKey::relevance(classifier.backend_name());
        if let Some(skipped) = self.skip_existing(&key, force).await? {
            return Ok(skipped);
        }

        let scorer = EntailmentScorer::new(classifier, Arc::clone(&self.preprocessor), &self.config.entailment);
        let hypothesis = self.config.entailment.hypothesis.as_str();

        let (table, attempts) = self
            .with_retry(key.to_string(), || scorer.score_all(documents, hypothesis))
            .await?;

        self.artifacts.save_relevance(&table).await?;
        Ok(built(&key, table.len(), attempts))
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// Returns the value and the number of attempts made.
    async fn with_retry<T, F, Fut>(&self, stage: String, op: F) -> Result<(T, u32), IngestionError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let batch = &self.config.batch;
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(batch.initial_backoff_ms))
            .with_max_interval(Duration::from_secs(batch.max_backoff_secs))
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let max_retries = batch.max_retries;
        let stage_name = stage.as_str();

        let result = retry(policy, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let fut = op();
            async move {
                fut.await.map_err(|e| {
                    if e.is_retryable() && attempt <= max_retries {
                        warn!(stage = stage_name, attempt, error = %e, "Stage failed, retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        result
            .map(|value| (value, attempts))
            .map_err(|e| IngestionError::stage(stage, attempts, e))
    }
}

fn built(key: &TableKey, rows: usize, attempts: u32) -> StageReport {
    info!(table = %key, rows, attempts, "Table written");
    StageReport {
        table: key.to_string(),
        status: StageStatus::Built,
        rows,
        attempts,
    }
}
