//! Relevance engines
//!
//! Two ways to score how relevant each document is:
//! - Entailment (zero-shot NLI against a fixed hypothesis, precomputed)
//! - Vector search (cosine distance to a live query embedding)
//!
//! Both produce a [`RelevanceTable`](risotto_common::models::RelevanceTable)
//! keyed by document id.

mod entailment;
mod vector;

pub use entailment::EntailmentScorer;
pub use vector::{cosine_distance, VectorSearch};
