//! Zero-shot entailment scoring
//!
//! Scores how strongly each document entails a fixed hypothesis, using a
//! pluggable NLI backend. Documents are split into units by the
//! preprocessor; unit probabilities are aggregated per document.

use futures::stream::{self, StreamExt, TryStreamExt};
use risotto_common::config::{Aggregation, EntailmentConfig};
use risotto_common::errors::{AppError, Result};
use risotto_common::models::{Document, RelevanceMetric, RelevanceTable};
use risotto_common::nli::{EntailmentClassifier, NliPair};
use risotto_common::text::{PreparedText, TextPreprocessor};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Entailment scorer bound to one backend
pub struct EntailmentScorer {
    classifier: Arc<dyn EntailmentClassifier>,
    preprocessor: Arc<TextPreprocessor>,
    aggregation: Aggregation,
    ignore_neutral: bool,
    batch_size: usize,
    concurrency: usize,
}

impl EntailmentScorer {
    pub fn new(
        classifier: Arc<dyn EntailmentClassifier>,
        preprocessor: Arc<TextPreprocessor>,
        config: &EntailmentConfig,
    ) -> Self {
        Self {
            classifier,
            preprocessor,
            aggregation: config.aggregation,
            ignore_neutral: config.ignore_neutral,
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.classifier.backend_name()
    }

    /// Entailment percentage in [0, 100] for one prepared document.
    ///
    /// A document with no text scores 0.
    pub async fn score_document(&self, prepared: &PreparedText, hypothesis: &str) -> Result<f64> {
        if prepared.is_empty() {
            return Ok(0.0);
        }

        let mut probabilities = Vec::with_capacity(prepared.units.len());
        for batch in prepared.units.chunks(self.batch_size) {
            let pairs: Vec<NliPair> = batch
                .iter()
                .map(|unit| NliPair {
                    premise: unit.clone(),
                    hypothesis: hypothesis.to_string(),
                })
                .collect();

            let results = self.classifier.classify_batch(&pairs).await?;
            if results.len() != pairs.len() {
                return Err(AppError::model_unavailable(
                    self.backend_name(),
                    format!("Expected {} results, got {}", pairs.len(), results.len()),
                ));
            }
            for result in &results {
                let probability = result.entailment_probability(self.ignore_neutral);
                if !probability.is_finite() {
                    return Err(AppError::model_unavailable(
                        self.backend_name(),
                        format!("Non-finite entailment probability {}", probability),
                    ));
                }
                probabilities.push(probability);
            }
        }

        let aggregated = match self.aggregation {
            Aggregation::Max => probabilities.iter().copied().fold(0.0, f64::max),
            Aggregation::Mean => probabilities.iter().sum::<f64>() / probabilities.len() as f64,
        };

        Ok(aggregated.clamp(0.0, 1.0) * 100.0)
    }

    /// Score a whole corpus into a relevance table named after the backend
    #[instrument(skip(self, documents), fields(backend = %self.backend_name(), documents = documents.len()))]
    pub async fn score_all(&self, documents: &[Document], hypothesis: &str) -> Result<RelevanceTable> {
        let prepared = self.preprocessor.prepare_all(documents);
        let units: usize = prepared.iter().map(|p| p.units.len()).sum();
        debug!(units, "Documents prepared for entailment");

        let scores = stream::iter(prepared.iter())
            .map(|p| async move {
                let score = self.score_document(p, hypothesis).await?;
                Ok::<_, AppError>((p.id.clone(), score))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let table = RelevanceTable::new(self.backend_name(), RelevanceMetric::Entailment, scores);
        info!(scored = table.len(), "Entailment scoring complete");
        Ok(table)
    }
}
