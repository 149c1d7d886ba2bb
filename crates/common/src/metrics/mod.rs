//! Metrics and observability utilities
//!
//! Provides Prometheus-style metrics with latency-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all RISOTTO metrics
pub const METRICS_PREFIX: &str = "risotto";

/// Histogram buckets for query latency (in seconds)
/// Target: interactive, low hundreds of milliseconds
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms - interactive target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Buckets for model backend latency (typically slower)
pub const MODEL_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Query metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of ranking queries"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Ranking query latency in seconds"
    );

    describe_gauge!(
        format!("{}_query_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of papers returned by the last query"
    );

    describe_counter!(
        format!("{}_join_dropped_rows_total", METRICS_PREFIX),
        Unit::Count,
        "Rows dropped because an id was missing from one of the joined tables"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_documents_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Documents accepted into the corpus"
    );

    describe_counter!(
        format!("{}_documents_excluded_total", METRICS_PREFIX),
        Unit::Count,
        "Malformed records excluded from the corpus"
    );

    describe_gauge!(
        format!("{}_pagerank_iterations", METRICS_PREFIX),
        Unit::Count,
        "Power iterations used by the last importance computation"
    );

    // Model backend metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding backend requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding backend latency in seconds"
    );

    describe_counter!(
        format!("{}_classifier_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total entailment classifier requests"
    );

    describe_histogram!(
        format!("{}_classifier_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Entailment classifier latency in seconds"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total table cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total table cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to time a ranking query
pub struct QueryMetrics {
    start: Instant,
    engine: String,
}

impl QueryMetrics {
    /// Start tracking a query
    pub fn start(engine: &str) -> Self {
        Self {
            start: Instant::now(),
            engine: engine.to_string(),
        }
    }

    /// Record query completion
    pub fn finish(self, result_count: usize, success: bool) {
        let status = if success { "success" } else { "error" };

        counter!(
            format!("{}_queries_total", METRICS_PREFIX),
            "engine" => self.engine.clone(),
            "status" => status
        )
        .increment(1);

        histogram!(
            format!("{}_query_duration_seconds", METRICS_PREFIX),
            "engine" => self.engine.clone()
        )
        .record(self.start.elapsed().as_secs_f64());

        gauge!(
            format!("{}_query_results_count", METRICS_PREFIX),
            "engine" => self.engine
        )
        .set(result_count as f64);
    }
}

/// Helper to record rows lost in a join
pub fn record_dropped_rows(engine: &str, dropped: usize) {
    if dropped == 0 {
        return;
    }
    counter!(
        format!("{}_join_dropped_rows_total", METRICS_PREFIX),
        "engine" => engine.to_string()
    )
    .increment(dropped as u64);
}

/// Helper to record corpus ingestion
pub fn record_ingestion(accepted: usize, excluded: usize) {
    counter!(format!("{}_documents_ingested_total", METRICS_PREFIX)).increment(accepted as u64);
    counter!(format!("{}_documents_excluded_total", METRICS_PREFIX)).increment(excluded as u64);
}

/// Helper to record an importance computation
pub fn record_pagerank(iterations: usize, converged: bool) {
    gauge!(
        format!("{}_pagerank_iterations", METRICS_PREFIX),
        "converged" => converged.to_string()
    )
    .set(iterations as f64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);

        counter!(
            format!("{}_embedding_texts_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(batch_size as u64);
    }
}

/// Helper to record classifier metrics
pub fn record_classification(duration_secs: f64, backend: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_classifier_requests_total", METRICS_PREFIX),
        "backend" => backend.to_string(),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_classifier_duration_seconds", METRICS_PREFIX),
            "backend" => backend.to_string()
        )
        .record(duration_secs);

        counter!(
            format!("{}_classifier_pairs_total", METRICS_PREFIX),
            "backend" => backend.to_string()
        )
        .increment(batch_size as u64);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, MODEL_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
        assert!(LATENCY_BUCKETS.contains(&0.250));
    }

    #[test]
    fn test_query_metrics() {
        let metrics = QueryMetrics::start("similarity");
        metrics.finish(5, true);
        record_dropped_rows("similarity", 0);
        record_dropped_rows("similarity", 3);
        // Without an installed recorder these are no-ops
    }
}
