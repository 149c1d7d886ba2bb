//! Entailment classifier abstraction
//!
//! A classifier receives (premise, hypothesis) pairs and returns a
//! probability distribution over {entailment, neutral, contradiction} for
//! each pair. Backends are interchangeable; every backend name gets its own
//! relevance table.
//!
//! - `HttpEntailmentClassifier` calls a JSON inference endpoint serving an
//!   MNLI model (BART, BERT, ...)
//! - `LexicalEntailmentClassifier` is a deterministic term-overlap heuristic
//!   for tests and offline builds. It is only used when a backend asks for it
//!   and always writes the `lexical` table.

use crate::config::{ClassifierKind, EntailmentBackendConfig, EntailmentConfig};
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Relevance table written by the lexical classifier
pub const LEXICAL_BACKEND: &str = "lexical";

/// A premise/hypothesis pair
#[derive(Debug, Clone, Serialize)]
pub struct NliPair {
    pub premise: String,
    pub hypothesis: String,
}

/// Class probabilities for one pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NliProbabilities {
    pub entailment: f64,
    pub neutral: f64,
    pub contradiction: f64,
}

impl NliProbabilities {
    /// Entailment probability, optionally renormalised without the neutral
    /// class (the usual zero-shot classification convention).
    pub fn entailment_probability(&self, ignore_neutral: bool) -> f64 {
        if ignore_neutral {
            let denom = self.entailment + self.contradiction;
            if denom > 0.0 {
                self.entailment / denom
            } else {
                0.0
            }
        } else {
            self.entailment
        }
    }
}

/// Trait for entailment classification backends
#[async_trait]
pub trait EntailmentClassifier: Send + Sync {
    /// Classify a batch of pairs; output order matches input order
    async fn classify_batch(&self, pairs: &[NliPair]) -> Result<Vec<NliProbabilities>>;

    /// Backend name (used as the relevance table version)
    fn backend_name(&self) -> &str;
}

/// Classifier calling an HTTP inference endpoint
pub struct HttpEntailmentClassifier {
    client: reqwest::Client,
    name: String,
    endpoint: String,
    model: Option<String>,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    pairs: &'a [NliPair],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    results: Vec<NliProbabilities>,
}

impl HttpEntailmentClassifier {
    pub fn new(backend: &EntailmentBackendConfig, endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            name: backend.name.clone(),
            endpoint,
            model: backend.model.clone(),
        })
    }

    async fn make_request(&self, pairs: &[NliPair]) -> Result<Vec<NliProbabilities>> {
        let request = ClassifyRequest {
            model: self.model.as_deref(),
            pairs,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::model_unavailable(&self.name, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::model_unavailable(
                &self.name,
                format!("API error {}: {}", status, body),
            ));
        }

        let parsed: ClassifyResponse = response.json().await.map_err(|e| {
            AppError::model_unavailable(&self.name, format!("Failed to parse response: {}", e))
        })?;

        if parsed.results.len() != pairs.len() {
            return Err(AppError::model_unavailable(
                &self.name,
                format!("Expected {} results, got {}", pairs.len(), parsed.results.len()),
            ));
        }

        Ok(parsed.results)
    }
}

#[async_trait]
impl EntailmentClassifier for HttpEntailmentClassifier {
    async fn classify_batch(&self, pairs: &[NliPair]) -> Result<Vec<NliProbabilities>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let result = self.make_request(pairs).await;
        metrics::record_classification(
            start.elapsed().as_secs_f64(),
            &self.name,
            pairs.len(),
            result.is_ok(),
        );
        result
    }

    fn backend_name(&self) -> &str {
        &self.name
    }
}

/// Term-overlap heuristic.
///
/// The entailment probability is the share of hypothesis content words
/// (length > 3) that occur in the premise, so it is deterministic and
/// monotone in topical overlap.
pub struct LexicalEntailmentClassifier;

impl LexicalEntailmentClassifier {
    fn content_words(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 3)
            .map(|w| w.to_lowercase())
            .collect()
    }

    fn classify_one(pair: &NliPair) -> NliProbabilities {
        let hypothesis = Self::content_words(&pair.hypothesis);
        if hypothesis.is_empty() {
            return NliProbabilities { entailment: 0.0, neutral: 1.0, contradiction: 0.0 };
        }
        let premise = Self::content_words(&pair.premise);
        let overlap = hypothesis.intersection(&premise).count() as f64 / hypothesis.len() as f64;

        NliProbabilities {
            entailment: overlap,
            neutral: (1.0 - overlap) * 0.5,
            contradiction: (1.0 - overlap) * 0.5,
        }
    }
}

#[async_trait]
impl EntailmentClassifier for LexicalEntailmentClassifier {
    async fn classify_batch(&self, pairs: &[NliPair]) -> Result<Vec<NliProbabilities>> {
        Ok(pairs.iter().map(Self::classify_one).collect())
    }

    fn backend_name(&self) -> &str {
        LEXICAL_BACKEND
    }
}

/// Create a classifier for a configured backend
pub fn create_classifier(
    backend: &EntailmentBackendConfig,
    config: &EntailmentConfig,
) -> Result<Arc<dyn EntailmentClassifier>> {
    match (backend.kind, &backend.endpoint) {
        (ClassifierKind::Http, Some(endpoint)) => Ok(Arc::new(HttpEntailmentClassifier::new(
            backend,
            endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        (ClassifierKind::Http, None) => Err(AppError::model_unavailable(
            &backend.name,
            "no inference endpoint configured",
        )),
        (ClassifierKind::Lexical, _) => {
            if !backend.name.eq_ignore_ascii_case(LEXICAL_BACKEND) {
                tracing::info!(
                    backend = %backend.name,
                    table = LEXICAL_BACKEND,
                    "Lexical classifier selected; scores are stored under its own name"
                );
            }
            Ok(Arc::new(LexicalEntailmentClassifier))
        }
    }
}
