//! Artifact storage
//!
//! Tables are stored independently so a reader loads only the ones it needs:
//! - `papers` (display metadata)
//! - `importance` (raw PageRank scores)
//! - `relevance.<backend>` (one per entailment backend or embedding model)
//! - `embeddings.<model>` (document vectors)
//!
//! A `put` replaces the whole table atomically; readers never observe a
//! partially written table.

mod fs;
mod memory;

pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

use crate::errors::{AppError, Result};
use crate::models::{EmbeddingTable, ImportanceTable, PaperTable, RelevanceTable};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Table family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Papers,
    Importance,
    Relevance,
    Embeddings,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Papers => "papers",
            TableKind::Importance => "importance",
            TableKind::Relevance => "relevance",
            TableKind::Embeddings => "embeddings",
        }
    }
}

/// Address of one table: kind plus optional model/backend version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub kind: TableKind,
    pub version: Option<String>,
}

impl TableKey {
    pub fn papers() -> Self {
        Self { kind: TableKind::Papers, version: None }
    }

    pub fn importance() -> Self {
        Self { kind: TableKind::Importance, version: None }
    }

    pub fn relevance(source: &str) -> Self {
        Self { kind: TableKind::Relevance, version: Some(sanitize_version(source)) }
    }

    pub fn embeddings(model: &str) -> Self {
        Self { kind: TableKind::Embeddings, version: Some(sanitize_version(model)) }
    }

    /// File-system friendly name, e.g. `relevance.bart.json`
    pub fn file_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{}.{}.json", self.kind.as_str(), version),
            None => format!("{}.json", self.kind.as_str()),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}.{}", self.kind.as_str(), version),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

/// Lowercase, with anything outside `[a-z0-9._-]` replaced by `_`
fn sanitize_version(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Raw get/put-table interface
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Read a whole table; `None` if it was never written
    async fn get(&self, key: &TableKey) -> Result<Option<Vec<u8>>>;

    /// Atomically replace a whole table
    async fn put(&self, key: &TableKey, bytes: Vec<u8>) -> Result<()>;

    /// Versions present for a table kind, sorted
    async fn versions(&self, kind: TableKind) -> Result<Vec<String>>;
}

/// Typed facade over an `ArtifactStore`
#[derive(Clone)]
pub struct Artifacts {
    store: Arc<dyn ArtifactStore>,
}

impl Artifacts {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Artifacts stored as JSON files under `dir`
    pub fn open_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(FsArtifactStore::new(dir.as_ref())))
    }

    /// Artifacts kept in memory (tests, one-shot pipelines)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryArtifactStore::new()))
    }

    async fn load<T: DeserializeOwned>(&self, key: &TableKey) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(bytes) => {
                let table = serde_json::from_slice(&bytes)?;
                debug!(table = %key, bytes = bytes.len(), "Table loaded");
                Ok(Some(table))
            }
            None => Ok(None),
        }
    }

    async fn require<T: DeserializeOwned>(&self, key: &TableKey) -> Result<T> {
        self.load(key).await?.ok_or_else(|| AppError::ArtifactNotFound {
            table: key.to_string(),
        })
    }

    async fn save<T: Serialize>(&self, key: &TableKey, table: &T) -> Result<()> {
        let bytes = serde_json::to_vec(table)?;
        debug!(table = %key, bytes = bytes.len(), "Table saved");
        self.store.put(key, bytes).await
    }

    pub async fn exists(&self, key: &TableKey) -> Result<bool> {
        Ok(self.store.get(key).await?.is_some())
    }

    pub async fn papers(&self) -> Result<PaperTable> {
        self.require(&TableKey::papers()).await
    }

    pub async fn save_papers(&self, table: &PaperTable) -> Result<()> {
        self.save(&TableKey::papers(), table).await
    }

    pub async fn importance(&self) -> Result<ImportanceTable> {
        self.require(&TableKey::importance()).await
    }

    pub async fn save_importance(&self, table: &ImportanceTable) -> Result<()> {
        self.save(&TableKey::importance(), table).await
    }

    pub async fn relevance(&self, source: &str) -> Result<RelevanceTable> {
        self.require(&TableKey::relevance(source)).await
    }

    pub async fn save_relevance(&self, table: &RelevanceTable) -> Result<()> {
        self.save(&TableKey::relevance(&table.source), table).await
    }

    /// Stored embeddings for a model, if any
    pub async fn embeddings(&self, model: &str) -> Result<Option<EmbeddingTable>> {
        self.load(&TableKey::embeddings(model)).await
    }

    pub async fn save_embeddings(&self, table: &EmbeddingTable) -> Result<()> {
        self.save(&TableKey::embeddings(&table.model), table).await
    }

    /// Names of all stored relevance tables
    pub async fn relevance_sources(&self) -> Result<Vec<String>> {
        self.store.versions(TableKind::Relevance).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentId, RelevanceMetric};
    use std::collections::BTreeMap;

    #[test]
    fn test_key_names() {
        assert_eq!(TableKey::papers().file_name(), "papers.json");
        assert_eq!(
            TableKey::relevance("BART").file_name(),
            "relevance.bart.json"
        );
        assert_eq!(
            TableKey::embeddings("sentence-transformers/all-MiniLM").to_string(),
            "embeddings.sentence-transformers_all-minilm"
        );
    }

    #[tokio::test]
    async fn test_missing_table_is_not_found() {
        let artifacts = Artifacts::in_memory();
        let err = artifacts.importance().await.unwrap_err();
        assert!(matches!(err, AppError::ArtifactNotFound { .. }));
        assert!(artifacts.embeddings("m").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_relevance_versions_are_independent() {
        let artifacts = Artifacts::in_memory();
        let mut scores = BTreeMap::new();
        scores.insert(DocumentId::new("a"), 90.0);
        artifacts
            .save_relevance(&RelevanceTable::new("bart", RelevanceMetric::Entailment, scores.clone()))
            .await
            .unwrap();
        scores.insert(DocumentId::new("a"), 10.0);
        artifacts
            .save_relevance(&RelevanceTable::new("bert", RelevanceMetric::Entailment, scores))
            .await
            .unwrap();

        assert_eq!(artifacts.relevance_sources().await.unwrap(), vec!["bart", "bert"]);
        let bart = artifacts.relevance("bart").await.unwrap();
        assert_eq!(bart.scores[&DocumentId::new("a")], 90.0);
    }
}
