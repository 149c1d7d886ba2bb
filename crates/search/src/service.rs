//! Query service
//!
//! Serves ranking queries from the stored tables. Tables are loaded once
//! into `Arc`-shared caches; a query never sees a half-replaced table.

use crate::ranking::{self, default_sort_key, RankRequest, RankedResult, RescaledImportance};
use crate::retrieval::VectorSearch;
use risotto_common::cache::TableCache;
use risotto_common::config::RankingConfig;
use risotto_common::errors::{AppError, Result};
use risotto_common::metrics::QueryMetrics;
use risotto_common::models::{EmbeddingTable, PaperTable, RelevanceMetric, RelevanceTable};
use risotto_common::storage::Artifacts;
use std::sync::Arc;
use tracing::{info, instrument};

const CORPUS_KEY: &str = "corpus";

/// Corpus-wide tables shared by every query
#[derive(Debug)]
pub struct Corpus {
    pub papers: PaperTable,
    pub importance: RescaledImportance,
}

/// Ranking queries over the stored artifacts
pub struct QueryService {
    artifacts: Artifacts,
    search: VectorSearch,
    ranking: RankingConfig,
    corpus: TableCache<Corpus>,
    relevance: TableCache<RelevanceTable>,
    embeddings: TableCache<EmbeddingTable>,
}

impl QueryService {
    pub fn new(artifacts: Artifacts, search: VectorSearch, ranking: RankingConfig) -> Self {
        Self {
            artifacts,
            search,
            ranking,
            corpus: TableCache::new("corpus"),
            relevance: TableCache::new("relevance"),
            embeddings: TableCache::new("embeddings"),
        }
    }

    async fn load_corpus(artifacts: &Artifacts) -> Result<Corpus> {
        let papers = artifacts.papers().await?;
        let importance = RescaledImportance::from_table(&artifacts.importance().await?)?;
        Ok(Corpus { papers, importance })
    }

    /// Papers and rescaled importance, loaded on first use
    pub async fn corpus(&self) -> Result<Arc<Corpus>> {
        self.corpus
            .get_or_load(CORPUS_KEY, || Self::load_corpus(&self.artifacts))
            .await
    }

    /// Backends with a stored entailment table
    pub async fn entailment_backends(&self) -> Result<Vec<String>> {
        self.artifacts.relevance_sources().await
    }

    /// Request populated from configured defaults for `metric`
    pub async fn default_request(&self, metric: RelevanceMetric) -> Result<RankRequest> {
        let corpus = self.corpus().await?;
        let relevance_threshold = match metric {
            RelevanceMetric::Entailment => self.ranking.entailment_threshold,
            RelevanceMetric::CosineDistance => self.ranking.similarity_threshold,
        };
        Ok(RankRequest {
            importance_threshold: corpus.importance.default_threshold(),
            relevance_threshold,
            sort_key: default_sort_key(metric),
            top_k: self.ranking.top_k,
        })
    }

    /// Rank against a precomputed entailment table
    #[instrument(skip(self, request))]
    pub async fn rank_entailment(&self, backend: &str, request: &RankRequest) -> Result<RankedResult> {
        let metrics = QueryMetrics::start("entailment");
        let result = self.rank_entailment_inner(backend, request).await;
        metrics.finish(result.as_ref().map(|r| r.len()).unwrap_or(0), result.is_ok());
        result
    }

    async fn rank_entailment_inner(&self, backend: &str, request: &RankRequest) -> Result<RankedResult> {
        let corpus = self.corpus().await?;
        let artifacts = &self.artifacts;
        let relevance = self
            .relevance
            .get_or_load(&backend.to_lowercase(), || artifacts.relevance(backend))
            .await?;

        if relevance.metric != RelevanceMetric::Entailment {
            return Err(AppError::InvalidFormat {
                message: format!("relevance table '{}' is not an entailment table", backend),
            });
        }

        ranking::rank(&corpus.papers, &corpus.importance, &relevance, request)
    }

    /// Embed `query` and rank by cosine similarity
    #[instrument(skip(self, request))]
    pub async fn rank_similarity(&self, query: &str, request: &RankRequest) -> Result<RankedResult> {
        let metrics = QueryMetrics::start("similarity");
        let result = self.rank_similarity_inner(query, request).await;
        metrics.finish(result.as_ref().map(|r| r.len()).unwrap_or(0), result.is_ok());
        result
    }

    async fn rank_similarity_inner(&self, query: &str, request: &RankRequest) -> Result<RankedResult> {
        // Catch bad requests before paying for an embedding
        request.validate_for(RelevanceMetric::CosineDistance)?;

        let corpus = self.corpus().await?;
        let model = self.search.model_name();
        let artifacts = &self.artifacts;
        let embeddings = self
            .embeddings
            .get_or_load(model, || async move {
                artifacts
                    .embeddings(model)
                    .await?
                    .ok_or_else(|| AppError::ArtifactNotFound {
                        table: format!("embeddings for model '{}'", model),
                    })
            })
            .await?;

        let relevance = self.search.query(query, &embeddings).await?;
        ranking::rank(&corpus.papers, &corpus.importance, &relevance, request)
    }

    /// Reload every cached table from storage.
    ///
    /// All tables are read before any is swapped, so a failed load leaves
    /// the cached set untouched. Queries already running keep the tables
    /// they started with.
    pub async fn reload(&self) -> Result<()> {
        let corpus = Self::load_corpus(&self.artifacts).await?;

        let mut relevance = Vec::new();
        for key in self.relevance.keys().await {
            let table = self.artifacts.relevance(&key).await?;
            relevance.push((key, table));
        }
        let mut embeddings = Vec::new();
        for key in self.embeddings.keys().await {
            let table = self.artifacts.embeddings(&key).await?;
            embeddings.push((key, table));
        }

        self.corpus.replace(CORPUS_KEY, corpus).await;
        for (key, table) in relevance {
            self.relevance.replace(&key, table).await;
        }
        for (key, table) in embeddings {
            match table {
                Some(table) => {
                    self.embeddings.replace(&key, table).await;
                }
                None => {
                    self.embeddings.invalidate(&key).await;
                }
            }
        }

        info!("Artifacts reloaded");
        Ok(())
    }

    /// Forget the cached vectors for one embedding model
    pub async fn invalidate_model(&self, model: &str) -> bool {
        self.embeddings.invalidate(model).await
    }
}
