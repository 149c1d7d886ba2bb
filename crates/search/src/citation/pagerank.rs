//! PageRank-based citation scoring
//!
//! Power iteration over the citation graph. Nodes with no outgoing edges
//! spread their mass uniformly, so the scores always sum to one.

use super::CitationGraph;
use rayon::prelude::*;
use risotto_common::config::ImportanceConfig;
use risotto_common::errors::{AppError, Result};
use risotto_common::metrics;
use risotto_common::models::DocumentId;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// PageRank configuration
#[derive(Debug, Clone)]
pub struct PageRankConfig {
    /// Damping factor (typically 0.85)
    pub damping: f64,

    /// Maximum iterations
    pub max_iterations: usize,

    /// Convergence threshold on the L1 change between iterations
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

impl From<&ImportanceConfig> for PageRankConfig {
    fn from(config: &ImportanceConfig) -> Self {
        Self {
            damping: config.damping,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }
}

impl PageRankConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.damping) {
            return Err(AppError::Validation {
                message: format!("damping must be in [0, 1), got {}", self.damping),
                field: Some("importance.damping".into()),
            });
        }
        if self.tolerance.is_nan() || self.tolerance <= 0.0 {
            return Err(AppError::Validation {
                message: format!("tolerance must be positive, got {}", self.tolerance),
                field: Some("importance.tolerance".into()),
            });
        }
        if self.max_iterations == 0 {
            return Err(AppError::Validation {
                message: "max_iterations must be at least 1".into(),
                field: Some("importance.max_iterations".into()),
            });
        }
        Ok(())
    }
}

/// Result of a PageRank run
#[derive(Debug, Clone)]
pub struct PageRankOutcome {
    pub scores: BTreeMap<DocumentId, f64>,
    pub iterations: usize,
    pub converged: bool,
    pub residual: f64,
}

/// PageRank scorer for papers
pub struct PageRankScorer {
    config: PageRankConfig,
}

impl PageRankScorer {
    /// Create a new scorer, rejecting out-of-range parameters
    pub fn new(config: PageRankConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Compute PageRank scores for all papers
    pub fn compute(&self, graph: &CitationGraph) -> PageRankOutcome {
        let n = graph.node_count();
        if n == 0 {
            return PageRankOutcome {
                scores: BTreeMap::new(),
                iterations: 0,
                converged: true,
                residual: 0.0,
            };
        }

        let n_f64 = n as f64;
        let damping = self.config.damping;

        let out_degree: Vec<usize> = (0..n).map(|i| graph.out_degree(i)).collect();
        let dangling: Vec<usize> = (0..n).filter(|&i| out_degree[i] == 0).collect();

        let mut scores = vec![1.0 / n_f64; n];
        let mut next = vec![0.0; n];
        let mut iterations = 0;
        let mut residual = f64::INFINITY;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let dangling_mass: f64 = dangling.iter().map(|&i| scores[i]).sum();
            let base = (1.0 - damping) / n_f64 + damping * dangling_mass / n_f64;

            next.par_iter_mut().enumerate().for_each(|(node, slot)| {
                let inflow: f64 = graph
                    .incoming_of(node)
                    .iter()
                    .map(|&citing| scores[citing] / out_degree[citing] as f64)
                    .sum();
                *slot = base + damping * inflow;
            });

            residual = next
                .iter()
                .zip(&scores)
                .map(|(new, old)| (new - old).abs())
                .sum();
            std::mem::swap(&mut scores, &mut next);

            if residual < self.config.tolerance {
                break;
            }
        }

        let converged = residual < self.config.tolerance;
        if converged {
            debug!(iterations, residual, "PageRank converged");
        } else {
            warn!(
                iterations,
                residual,
                tolerance = self.config.tolerance,
                "PageRank hit the iteration cap before converging"
            );
        }
        metrics::record_pagerank(iterations, converged);

        let scores = graph
            .nodes()
            .iter()
            .cloned()
            .zip(scores)
            .collect();

        PageRankOutcome {
            scores,
            iterations,
            converged,
            residual,
        }
    }
}
