//! Persisted score tables
//!
//! Each table is keyed by document id and replaced as a whole. Tables never
//! share an implicit row order; joins go through the id.

use super::{DocumentId, PaperSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Build provenance attached to every table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
}

impl TableMeta {
    pub fn fresh() -> Self {
        Self {
            build_id: Uuid::now_v7(),
            built_at: Utc::now(),
        }
    }
}

/// Display metadata for every ingested paper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperTable {
    pub meta: TableMeta,
    pub papers: BTreeMap<DocumentId, PaperSummary>,
}

impl PaperTable {
    pub fn from_summaries(summaries: impl IntoIterator<Item = PaperSummary>) -> Self {
        Self {
            meta: TableMeta::fresh(),
            papers: summaries.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    pub fn get(&self, id: &DocumentId) -> Option<&PaperSummary> {
        self.papers.get(id)
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }
}

/// Raw PageRank scores (a probability distribution over the corpus)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceTable {
    pub meta: TableMeta,
    pub scores: BTreeMap<DocumentId, f64>,
    pub damping: f64,
    pub iterations: usize,
    /// False when the iteration cap was hit first
    pub converged: bool,
    /// L1 change of the final iteration
    pub residual: f64,
}

/// What a relevance value means and which direction is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceMetric {
    /// Entailment probability in percent; higher is better
    Entailment,
    /// Cosine distance in [0, 2]; lower is better
    CosineDistance,
}

impl RelevanceMetric {
    /// Threshold test, inclusive.
    ///
    /// Entailment thresholds are percentages. Distance thresholds are given
    /// as a similarity, so a document passes when `1 - distance >= threshold`.
    /// The notebook apps compared strictly (`>`); the inclusive form is a
    /// deliberate departure so that zero thresholds keep every joined paper.
    pub fn passes(self, value: f64, threshold: f64) -> bool {
        match self {
            RelevanceMetric::Entailment => value >= threshold,
            RelevanceMetric::CosineDistance => 1.0 - value >= threshold,
        }
    }

    /// Ordering that puts the more relevant value first
    pub fn best_first(self, a: f64, b: f64) -> Ordering {
        match self {
            RelevanceMetric::Entailment => b.total_cmp(&a),
            RelevanceMetric::CosineDistance => a.total_cmp(&b),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RelevanceMetric::Entailment => "Entailment",
            RelevanceMetric::CosineDistance => "Cosine similarity",
        }
    }

    /// Value as shown to a reader
    pub fn display(self, value: f64) -> String {
        match self {
            RelevanceMetric::Entailment => format!("{:.2}%", value),
            RelevanceMetric::CosineDistance => format!("{:.2}", 1.0 - value),
        }
    }
}

/// One relevance score per document, produced by one engine/backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceTable {
    pub meta: TableMeta,
    /// Backend or model name that produced the scores
    pub source: String,
    pub metric: RelevanceMetric,
    pub scores: BTreeMap<DocumentId, f64>,
}

impl RelevanceTable {
    pub fn new(source: impl Into<String>, metric: RelevanceMetric, scores: BTreeMap<DocumentId, f64>) -> Self {
        Self {
            meta: TableMeta::fresh(),
            source: source.into(),
            metric,
            scores,
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Document vectors for a single embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingTable {
    pub meta: TableMeta,
    pub model: String,
    pub dimension: usize,
    pub vectors: BTreeMap<DocumentId, Vec<f32>>,
    /// sha256 of the text each vector was computed from
    pub fingerprints: BTreeMap<DocumentId, String>,
}

impl EmbeddingTable {
    /// True when the table was built by `model` from exactly these texts.
    ///
    /// Any difference means the whole table must be rebuilt.
    pub fn is_fresh_for(&self, model: &str, fingerprints: &BTreeMap<DocumentId, String>) -> bool {
        self.model == model && &self.fingerprints == fingerprints
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// Hex sha256 of a text, used to detect changed documents
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
