//! Importance rescaling
//!
//! Raw PageRank values are heavily skewed. They are log-transformed,
//! standardised, then min-max scaled into [0, 1] so a single threshold is
//! meaningful across corpora.

use risotto_common::errors::{AppError, Result};
use risotto_common::models::{DocumentId, ImportanceTable};
use std::collections::BTreeMap;

/// Importance in [0, 1], monotone in the raw PageRank value
#[derive(Debug, Clone, Default)]
pub struct RescaledImportance {
    scores: BTreeMap<DocumentId, f64>,
}

impl RescaledImportance {
    /// Rescale a raw importance table.
    ///
    /// Every raw score must be strictly positive. Fewer than two documents,
    /// or identical scores, rescale to 1.0 for everyone.
    pub fn from_table(table: &ImportanceTable) -> Result<Self> {
        let mut logs = Vec::with_capacity(table.scores.len());
        for (id, &score) in &table.scores {
            if !(score.is_finite() && score > 0.0) {
                return Err(AppError::NonPositiveScore {
                    id: id.to_string(),
                    score,
                });
            }
            logs.push(score.ln());
        }

        let z = standardize(&logs);
        let scaled = min_max(&z);

        Ok(Self {
            scores: table.scores.keys().cloned().zip(scaled).collect(),
        })
    }

    pub fn get(&self, id: &DocumentId) -> Option<f64> {
        self.scores.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocumentId, f64)> {
        self.scores.iter().map(|(id, &s)| (id, s))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Threshold that keeps roughly the upper quarter of the importance range
    pub fn default_threshold(&self) -> f64 {
        let (min, max) = self
            .scores
            .values()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
        if !min.is_finite() {
            return 0.0;
        }
        max - 1.5 * (max - min) / 2.0
    }
}

/// Z-scores using the sample standard deviation
fn standardize(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std = variance.sqrt();
    if std == 0.0 {
        return vec![0.0; n];
    }
    values.iter().map(|v| (v - mean) / std).collect()
}

fn min_max(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if range.is_nan() || range <= 0.0 {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use risotto_common::models::TableMeta;

    fn table(scores: &[(&str, f64)]) -> ImportanceTable {
        ImportanceTable {
            meta: TableMeta::fresh(),
            scores: scores.iter().map(|(id, s)| (DocumentId::new(*id), *s)).collect(),
            damping: 0.85,
            iterations: 10,
            converged: true,
            residual: 0.0,
        }
    }

    #[test]
    fn test_rescaled_range_and_order() {
        let raw = table(&[("a", 0.5), ("b", 0.3), ("c", 0.15), ("d", 0.05)]);
        let rescaled = RescaledImportance::from_table(&raw).unwrap();

        let a = rescaled.get(&DocumentId::new("a")).unwrap();
        let b = rescaled.get(&DocumentId::new("b")).unwrap();
        let c = rescaled.get(&DocumentId::new("c")).unwrap();
        let d = rescaled.get(&DocumentId::new("d")).unwrap();

        assert!((a - 1.0).abs() < 1e-12);
        assert!(d.abs() < 1e-12);
        assert!(a > b && b > c && c > d);
    }

    #[test]
    fn test_identical_scores_map_to_one() {
        let raw = table(&[("a", 0.25), ("b", 0.25), ("c", 0.25), ("d", 0.25)]);
        let rescaled = RescaledImportance::from_table(&raw).unwrap();
        assert!(rescaled.iter().all(|(_, s)| s == 1.0));
    }

    #[test]
    fn test_single_document_maps_to_one() {
        let rescaled = RescaledImportance::from_table(&table(&[("a", 1.0)])).unwrap();
        assert_eq!(rescaled.get(&DocumentId::new("a")), Some(1.0));
    }

    #[test]
    fn test_rejects_non_positive() {
        let err = RescaledImportance::from_table(&table(&[("a", 0.5), ("b", 0.0)])).unwrap_err();
        assert!(matches!(err, AppError::NonPositiveScore { ref id, .. } if id == "b"));
    }

    #[test]
    fn test_default_threshold() {
        let raw = table(&[("a", 0.5), ("b", 0.3), ("c", 0.2)]);
        let rescaled = RescaledImportance::from_table(&raw).unwrap();
        // min 0, max 1
        assert!((rescaled.default_threshold() - 0.25).abs() < 1e-12);
        assert_eq!(RescaledImportance::default().default_threshold(), 0.0);
    }
}
