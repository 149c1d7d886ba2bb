//! Embedding similarity search
//!
//! Document vectors are computed once per model during the batch build.
//! A query is embedded live, then compared against every stored vector by
//! cosine distance. Lower distance is more relevant.

use futures::stream::{self, StreamExt, TryStreamExt};
use risotto_common::config::EmbeddingConfig;
use risotto_common::embeddings::Embedder;
use risotto_common::errors::{AppError, Result};
use risotto_common::models::{
    fingerprint, Document, DocumentId, EmbeddingTable, RelevanceMetric, RelevanceTable, TableMeta,
};
use risotto_common::text::TextPreprocessor;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Cosine distance `1 - cos(a, b)`, clamped to [0, 2].
///
/// Returns `None` when the lengths differ. A zero vector is treated as
/// orthogonal to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(1.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    Some((1.0 - similarity).clamp(0.0, 2.0))
}

/// Vector search bound to one embedding model
pub struct VectorSearch {
    embedder: Arc<dyn Embedder>,
    preprocessor: Arc<TextPreprocessor>,
    batch_size: usize,
    query_prefix: String,
    query_timeout: Duration,
}

impl VectorSearch {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        preprocessor: Arc<TextPreprocessor>,
        config: &EmbeddingConfig,
    ) -> Self {
        Self {
            embedder,
            preprocessor,
            batch_size: config.batch_size.max(1),
            query_prefix: config.query_prefix.clone(),
            query_timeout: Duration::from_millis(config.query_timeout_ms),
        }
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Fingerprint of the exact text each document is embedded from
    pub fn fingerprints(&self, documents: &[Document]) -> BTreeMap<DocumentId, String> {
        documents
            .iter()
            .map(|d| (d.id.clone(), fingerprint(&self.preprocessor.prepare_single(d))))
            .collect()
    }

    /// Embed every document into a fresh table
    #[instrument(skip(self, documents), fields(model = %self.model_name(), documents = documents.len()))]
    pub async fn embed_all(&self, documents: &[Document]) -> Result<EmbeddingTable> {
        let texts: Vec<(DocumentId, String)> = documents
            .iter()
            .map(|d| (d.id.clone(), self.preprocessor.prepare_single(d)))
            .collect();
        let fingerprints = texts
            .iter()
            .map(|(id, text)| (id.clone(), fingerprint(text)))
            .collect();

        let expected = self.embedder.dimension();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(texts.chunks(self.batch_size))
            .map(|batch| async move {
                let inputs: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
                debug!(batch_size = inputs.len(), "Embedding batch");
                self.embedder.embed_batch(&inputs).await
            })
            .buffered(2)
            .try_collect()
            .await?;

        let mut vectors = BTreeMap::new();
        for ((id, _), vector) in texts.iter().zip(batches.into_iter().flatten()) {
            if vector.len() != expected {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            vectors.insert(id.clone(), vector);
        }
        if vectors.len() != texts.len() {
            return Err(AppError::model_unavailable(
                self.model_name(),
                format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            ));
        }

        info!(vectors = vectors.len(), "Document embeddings computed");

        Ok(EmbeddingTable {
            meta: TableMeta::fresh(),
            model: self.model_name().to_string(),
            dimension: expected,
            vectors,
            fingerprints,
        })
    }

    /// Reuse `existing` when it was built by this model from the same texts,
    /// otherwise rebuild the whole table. Returns the table and whether it was
    /// rebuilt.
    pub async fn embed_all_if_stale(
        &self,
        documents: &[Document],
        existing: Option<EmbeddingTable>,
    ) -> Result<(EmbeddingTable, bool)> {
        if let Some(table) = existing {
            if table.is_fresh_for(self.model_name(), &self.fingerprints(documents)) {
                debug!(model = %table.model, "Embedding table is up to date");
                return Ok((table, false));
            }
            info!(model = %table.model, "Embedding table is stale, rebuilding");
        }
        Ok((self.embed_all(documents).await?, true))
    }

    /// Distance from a query vector to every document in `table`
    pub fn distances(&self, query: &[f32], table: &EmbeddingTable) -> Result<RelevanceTable> {
        let mut scores = BTreeMap::new();
        for (id, vector) in &table.vectors {
            let distance = cosine_distance(query, vector).ok_or(AppError::DimensionMismatch {
                expected: vector.len(),
                actual: query.len(),
            })?;
            scores.insert(id.clone(), distance);
        }
        Ok(RelevanceTable::new(
            table.model.clone(),
            RelevanceMetric::CosineDistance,
            scores,
        ))
    }

    /// Embed a free-text query and score it against the stored vectors.
    ///
    /// The query is prefixed with the configured lead-in before embedding.
    /// A slow embedder fails the query rather than blocking it.
    #[instrument(skip(self, table), fields(model = %self.model_name()))]
    pub async fn query(&self, query: &str, table: &EmbeddingTable) -> Result<RelevanceTable> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation {
                message: "query must not be empty".into(),
                field: Some("query".into()),
            });
        }
        if table.model != self.model_name() {
            return Err(AppError::EmbeddingModelMismatch {
                expected: table.model.clone(),
                actual: self.model_name().to_string(),
            });
        }

        let text = if self.query_prefix.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", self.query_prefix, query)
        };

        let vector = tokio::time::timeout(self.query_timeout, self.embedder.embed(&text))
            .await
            .map_err(|_| {
                warn!(timeout_ms = self.query_timeout.as_millis() as u64, "Query embedding timed out");
                AppError::ServiceUnavailable {
                    message: format!(
                        "query embedding did not finish within {}ms",
                        self.query_timeout.as_millis()
                    ),
                }
            })??;

        self.distances(&vector, table)
    }
}
