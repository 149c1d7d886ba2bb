//! Citation importance
//!
//! Builds the citation graph for a corpus and scores every paper with
//! PageRank. The result is persisted as an [`ImportanceTable`].

mod graph;
mod pagerank;

pub use graph::{CitationGraph, GraphStats};
pub use pagerank::{PageRankConfig, PageRankOutcome, PageRankScorer};

use risotto_common::config::ImportanceConfig;
use risotto_common::errors::Result;
use risotto_common::models::{Document, ImportanceTable, TableMeta};
use tracing::info;

/// Compute the importance table for a corpus
pub fn build_importance(documents: &[Document], config: &ImportanceConfig) -> Result<ImportanceTable> {
    let config = PageRankConfig::from(config);
    let scorer = PageRankScorer::new(config.clone())?;

    let (graph, stats) = CitationGraph::from_documents(documents);
    let outcome = scorer.compute(&graph);

    info!(
        papers = graph.node_count(),
        citations = graph.edge_count(),
        dangling_references = stats.dangling_references,
        missing_ids = stats.missing_ids,
        iterations = outcome.iterations,
        converged = outcome.converged,
        "Importance computed"
    );

    Ok(ImportanceTable {
        meta: TableMeta::fresh(),
        scores: outcome.scores,
        damping: config.damping,
        iterations: outcome.iterations,
        converged: outcome.converged,
        residual: outcome.residual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use risotto_common::models::DocumentId;

    #[test]
    fn test_build_importance_covers_every_document() {
        let docs = vec![
            Document::new("a").citing(["b", "external"]),
            Document::new("b"),
            Document::new("isolated"),
        ];
        let table = build_importance(&docs, &ImportanceConfig::default()).unwrap();

        assert_eq!(table.scores.len(), 3);
        assert!(table.converged);
        assert!(table.scores.values().all(|&s| s > 0.0));
    }

    #[test]
    fn test_blank_id_gets_no_score() {
        let docs = vec![Document::new("a").citing(["b"]), Document::new("b"), Document::new("")];
        let table = build_importance(&docs, &ImportanceConfig::default()).unwrap();

        assert_eq!(table.scores.len(), 2);
        assert!(!table.scores.contains_key(&DocumentId::new("")));
        let total: f64 = table.scores.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_build_importance_rejects_bad_damping() {
        let config = ImportanceConfig {
            damping: 1.0,
            ..Default::default()
        };
        assert!(build_importance(&[Document::new("a")], &config).is_err());
    }
}
