//! Ranking stage
//!
//! Joins rescaled importance with one relevance table by document id,
//! applies both thresholds, sorts and truncates. Pure and deterministic:
//! the same inputs always give the same list in the same order.

mod rescale;

pub use rescale::RescaledImportance;

use risotto_common::errors::{AppError, Result};
use risotto_common::metrics;
use risotto_common::models::{PaperSummary, PaperTable, RelevanceMetric, RelevanceTable};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, warn};
use validator::Validate;

/// Column the result list is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Rescaled importance, descending
    Importance,
    /// Relevance, best first in the metric's direction
    Relevance,
}

/// Sort key used when the caller does not pick one
pub fn default_sort_key(metric: RelevanceMetric) -> SortKey {
    match metric {
        RelevanceMetric::CosineDistance => SortKey::Importance,
        RelevanceMetric::Entailment => SortKey::Relevance,
    }
}

/// Parameters of one ranking call
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RankRequest {
    /// Minimum rescaled importance (inclusive)
    #[validate(range(min = 0.0, max = 1.0))]
    pub importance_threshold: f64,

    /// Entailment percentage, or cosine similarity, a paper must reach
    pub relevance_threshold: f64,

    pub sort_key: SortKey,

    #[validate(range(min = 1, max = 10000))]
    pub top_k: usize,
}

impl RankRequest {
    /// Validate field ranges and the threshold against the metric's scale
    pub fn validate_for(&self, metric: RelevanceMetric) -> Result<()> {
        self.validate()?;

        let (lo, hi) = match metric {
            RelevanceMetric::Entailment => (0.0, 100.0),
            RelevanceMetric::CosineDistance => (-1.0, 1.0),
        };
        if !(lo..=hi).contains(&self.relevance_threshold) {
            return Err(AppError::Validation {
                message: format!(
                    "relevance_threshold must be in [{}, {}] for {}, got {}",
                    lo,
                    hi,
                    metric.label(),
                    self.relevance_threshold
                ),
                field: Some("relevance_threshold".into()),
            });
        }
        Ok(())
    }
}

/// One row of the final list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPaper {
    pub paper: PaperSummary,
    /// Rescaled importance in [0, 1]
    pub importance: f64,
    /// Raw relevance value in the table's metric
    pub relevance: f64,
}

/// Ranked list plus join bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub metric: RelevanceMetric,
    pub source: String,
    pub papers: Vec<RankedPaper>,
    /// Rows that passed both thresholds, before truncation
    pub matched: usize,
    /// Rows present in both tables
    pub joined: usize,
    /// Rows present in only one table
    pub dropped: usize,
}

impl RankedResult {
    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }
}

/// Rank one relevance table against the corpus importance.
///
/// Ids present in only one of the two tables are dropped and counted.
/// Papers without stored metadata are kept with an id-only summary.
pub fn rank(
    papers: &PaperTable,
    importance: &RescaledImportance,
    relevance: &RelevanceTable,
    request: &RankRequest,
) -> Result<RankedResult> {
    request.validate_for(relevance.metric)?;
    let metric = relevance.metric;

    let mut rows: Vec<RankedPaper> = Vec::with_capacity(relevance.len());
    let mut joined_ids = HashSet::with_capacity(relevance.len());
    let mut missing_importance = 0;

    for (id, &value) in &relevance.scores {
        let Some(imp) = importance.get(id) else {
            missing_importance += 1;
            continue;
        };
        joined_ids.insert(id);

        // Inclusive on both axes, unlike the strict `>` of the notebook apps,
        // so zero thresholds keep the whole join.
        if imp >= request.importance_threshold && metric.passes(value, request.relevance_threshold) {
            let paper = papers.get(id).cloned().unwrap_or_else(|| PaperSummary {
                id: id.clone(),
                title: String::new(),
                authors: Vec::new(),
                publish_time: None,
                doi: None,
            });
            rows.push(RankedPaper {
                paper,
                importance: imp,
                relevance: value,
            });
        }
    }

    let joined = joined_ids.len();
    let missing_relevance = importance.len() - joined;
    let dropped = missing_importance + missing_relevance;
    if dropped > 0 {
        warn!(
            source = %relevance.source,
            missing_importance,
            missing_relevance,
            "Rows dropped joining importance and relevance"
        );
        metrics::record_dropped_rows(&relevance.source, dropped);
    }

    // Ties keep id order from the BTreeMap walk
    rows.sort_by(|a, b| compare(metric, request.sort_key, a, b));

    let matched = rows.len();
    rows.truncate(request.top_k);

    debug!(
        source = %relevance.source,
        joined,
        matched,
        returned = rows.len(),
        "Ranking complete"
    );

    Ok(RankedResult {
        metric,
        source: relevance.source.clone(),
        papers: rows,
        matched,
        joined,
        dropped,
    })
}

/// Compare two rows the way `rank` orders them
pub fn compare(metric: RelevanceMetric, key: SortKey, a: &RankedPaper, b: &RankedPaper) -> Ordering {
    match key {
        SortKey::Importance => b.importance.total_cmp(&a.importance),
        SortKey::Relevance => metric.best_first(a.relevance, b.relevance),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use risotto_common::models::{DocumentId, ImportanceTable, TableMeta};
    use std::collections::BTreeMap;

    fn importance(scores: &[(&str, f64)]) -> RescaledImportance {
        let table = ImportanceTable {
            meta: TableMeta::fresh(),
            scores: scores.iter().map(|(id, s)| (DocumentId::new(*id), *s)).collect(),
            damping: 0.85,
            iterations: 1,
            converged: true,
            residual: 0.0,
        };
        RescaledImportance::from_table(&table).unwrap()
    }

    fn relevance(metric: RelevanceMetric, scores: &[(&str, f64)]) -> RelevanceTable {
        RelevanceTable::new(
            "test",
            metric,
            scores.iter().map(|(id, s)| (DocumentId::new(*id), *s)).collect::<BTreeMap<_, _>>(),
        )
    }

    fn papers(ids: &[&str]) -> PaperTable {
        PaperTable::from_summaries(ids.iter().map(|id| PaperSummary {
            id: DocumentId::new(*id),
            title: format!("Title {}", id),
            authors: vec![],
            publish_time: None,
            doi: None,
        }))
    }

    fn request(imp: f64, rel: f64, sort_key: SortKey, top_k: usize) -> RankRequest {
        RankRequest {
            importance_threshold: imp,
            relevance_threshold: rel,
            sort_key,
            top_k,
        }
    }

    fn ids(result: &RankedResult) -> Vec<&str> {
        result.papers.iter().map(|p| p.paper.id.as_str()).collect()
    }

    #[test]
    fn test_filters_then_sorts_by_relevance() {
        let imp = importance(&[("a", 0.4), ("b", 0.3), ("c", 0.2), ("d", 0.1)]);
        let rel = relevance(
            RelevanceMetric::Entailment,
            &[("a", 50.0), ("b", 95.0), ("c", 90.0), ("d", 99.0)],
        );

        let result = rank(&papers(&["a", "b", "c", "d"]), &imp, &rel, &request(0.1, 85.0, SortKey::Relevance, 20)).unwrap();

        // d is below the importance threshold, a below the relevance one
        assert_eq!(ids(&result), vec!["b", "c"]);
        assert_eq!(result.matched, 2);
        assert_eq!(result.dropped, 0);
        assert_eq!(result.papers[0].paper.title, "Title b");
    }

    #[test]
    fn test_zero_thresholds_keep_full_join() {
        let imp = importance(&[("a", 0.5), ("b", 0.3), ("c", 0.2)]);
        let rel = relevance(RelevanceMetric::Entailment, &[("a", 0.0), ("b", 12.0), ("c", 100.0)]);

        let result = rank(&papers(&[]), &imp, &rel, &request(0.0, 0.0, SortKey::Importance, 20)).unwrap();
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
        // Missing metadata keeps the row
        assert!(result.papers[0].paper.title.is_empty());
    }

    #[test]
    fn test_distance_sorts_ascending() {
        let imp = importance(&[("a", 0.5), ("b", 0.3), ("c", 0.2)]);
        let rel = relevance(RelevanceMetric::CosineDistance, &[("a", 0.3), ("b", 0.1), ("c", 0.9)]);

        let result = rank(&papers(&[]), &imp, &rel, &request(0.0, 0.5, SortKey::Relevance, 20)).unwrap();
        // c has similarity 0.1 < 0.5
        assert_eq!(ids(&result), vec!["b", "a"]);
    }

    #[test]
    fn test_top_k_truncates() {
        let imp = importance(&[("a", 0.4), ("b", 0.3), ("c", 0.2), ("d", 0.1)]);
        let rel = relevance(RelevanceMetric::Entailment, &[("a", 90.0), ("b", 90.0), ("c", 90.0), ("d", 90.0)]);

        let result = rank(&papers(&[]), &imp, &rel, &request(0.0, 0.0, SortKey::Importance, 2)).unwrap();
        assert_eq!(ids(&result), vec!["a", "b"]);
        assert_eq!(result.matched, 4);
    }

    #[test]
    fn test_ties_break_by_id() {
        let imp = importance(&[("c", 0.25), ("a", 0.25), ("b", 0.25)]);
        let rel = relevance(RelevanceMetric::Entailment, &[("c", 90.0), ("a", 90.0), ("b", 90.0)]);

        let result = rank(&papers(&[]), &imp, &rel, &request(0.0, 0.0, SortKey::Relevance, 20)).unwrap();
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_join_counts_dropped_rows() {
        let imp = importance(&[("a", 0.5), ("b", 0.3)]);
        let rel = relevance(RelevanceMetric::Entailment, &[("b", 90.0), ("z", 99.0)]);

        let result = rank(&papers(&[]), &imp, &rel, &request(0.0, 0.0, SortKey::Relevance, 20)).unwrap();
        assert_eq!(ids(&result), vec!["b"]);
        assert_eq!(result.joined, 1);
        assert_eq!(result.dropped, 2);
    }

    #[test]
    fn test_rejects_out_of_range_request() {
        let imp = importance(&[("a", 0.5)]);
        let rel = relevance(RelevanceMetric::CosineDistance, &[("a", 0.1)]);

        assert!(rank(&papers(&[]), &imp, &rel, &request(1.5, 0.0, SortKey::Relevance, 20)).is_err());
        assert!(rank(&papers(&[]), &imp, &rel, &request(0.0, 85.0, SortKey::Relevance, 20)).is_err());
        assert!(rank(&papers(&[]), &imp, &rel, &request(0.0, 0.0, SortKey::Relevance, 0)).is_err());
    }

    #[test]
    fn test_default_sort_keys() {
        assert_eq!(default_sort_key(RelevanceMetric::CosineDistance), SortKey::Importance);
        assert_eq!(default_sort_key(RelevanceMetric::Entailment), SortKey::Relevance);
    }
}
