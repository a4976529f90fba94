//! Analyzer - reduces a run's results into [`Metrics`]

use std::collections::BTreeMap;
use std::time::Duration;

use llmperf_core::Collector;
use llmperf_stats::compute_percentiles;
use tracing::debug;

use crate::metrics::{FirstTokenMetrics, Metrics};

/// Key used for failures that carry no error category
pub const UNKNOWN_ERROR_TYPE: &str = "unknown";

/// Computes [`Metrics`] from a [`Collector`]. Stateless and idempotent.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer<'a> {
    collector: &'a Collector,
}

impl<'a> Analyzer<'a> {
    /// Analyzer over `collector`
    pub fn new(collector: &'a Collector) -> Self {
        Self { collector }
    }

    /// Compute the metrics snapshot
    pub fn analyze(&self) -> Metrics {
        analyze(self.collector)
    }
}

/// Compute the metrics snapshot of a collector.
///
/// Percentiles use the nearest-rank rule over successful results only;
/// first-token statistics consider only nonzero first-token latencies.
pub fn analyze(collector: &Collector) -> Metrics {
    let total_requests = collector.total_count();
    let successful_requests = collector.success_count();

    let mut metrics = Metrics {
        total_requests,
        successful_requests,
        failed_requests: total_requests - successful_requests,
        total_duration: collector.duration(),
        ..Default::default()
    };

    if total_requests > 0 {
        metrics.success_rate = successful_requests as f64 / total_requests as f64 * 100.0;
    }

    let seconds = metrics.total_duration.as_secs_f64();
    if seconds > 0.0 {
        metrics.qps = successful_requests as f64 / seconds;
    }

    if successful_requests > 0 {
        let mut latencies = Vec::with_capacity(successful_requests);
        let mut first_token_latencies = Vec::new();
        let mut request_tokens = 0u64;
        let mut response_tokens = 0u64;

        for result in collector.successful() {
            latencies.push(result.latency);
            request_tokens += result.request_tokens;
            response_tokens += result.response_tokens;
            if !result.first_token_latency.is_zero() {
                first_token_latencies.push(result.first_token_latency);
            }
        }

        metrics.average_latency = mean_duration(&latencies);
        if let Some(p) = compute_percentiles(&latencies) {
            metrics.latency_p50 = p.p50;
            metrics.latency_p90 = p.p90;
            metrics.latency_p99 = p.p99;
        }

        metrics.total_tokens = request_tokens + response_tokens;
        metrics.average_request_tokens = request_tokens as f64 / successful_requests as f64;
        metrics.average_response_tokens = response_tokens as f64 / successful_requests as f64;
        if seconds > 0.0 {
            metrics.tokens_per_second = metrics.total_tokens as f64 / seconds;
        }

        metrics.first_token = compute_percentiles(&first_token_latencies).map(|p| FirstTokenMetrics {
            average: mean_duration(&first_token_latencies),
            p50: p.p50,
            p90: p.p90,
            p99: p.p99,
        });
    }

    let mut error_counts = BTreeMap::new();
    let mut error_type_counts = BTreeMap::new();
    for result in collector.failed() {
        let category = result.error_category();
        *error_counts.entry(category.to_string()).or_insert(0) += 1;

        let bucket = if category.is_empty() {
            UNKNOWN_ERROR_TYPE
        } else {
            category
        };
        *error_type_counts.entry(bucket.to_string()).or_insert(0) += 1;
    }
    metrics.error_counts = error_counts;
    metrics.error_type_counts = error_type_counts;

    debug!(
        target: "llmperf::analyzer",
        total = metrics.total_requests,
        failed = metrics.failed_requests,
        qps = metrics.qps,
        "analyzed run"
    );
    metrics
}

/// Integer mean of a set of durations (nanosecond precision, truncated)
fn mean_duration(values: &[Duration]) -> Duration {
    if values.is_empty() {
        return Duration::ZERO;
    }
    let total: u128 = values.iter().map(Duration::as_nanos).sum();
    let mean = total / values.len() as u128;
    Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX))
}
