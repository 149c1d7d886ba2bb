//! RISOTTO Search
//!
//! Query side of the pipeline:
//! - Citation importance (graph + PageRank)
//! - Relevance engines (entailment, embedding similarity)
//! - Ranking and filtering
//! - Cached query service and text rendering

pub mod citation;
pub mod ranking;
pub mod render;
pub mod retrieval;
pub mod service;
