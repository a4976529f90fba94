//! Concurrency recommendation
//!
//! Combines the QPS (gradient) bottleneck, the end-to-end latency bottleneck
//! and the best-QPS / best-throughput / best-latency levels into a single
//! recommended concurrency with a reason string.

use crate::bottleneck::{
    Algorithm, BottleneckDetector, BottleneckResult, BottleneckThresholds, GradientDetector,
    LatencyDetector,
};
use crate::comparison::{ConcurrentComparison, ConcurrentTestResult};

/// Recommends a concurrency level from a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Recommender {
    thresholds: BottleneckThresholds,
}

impl Recommender {
    /// Recommender using the given thresholds
    pub fn new(thresholds: BottleneckThresholds) -> Self {
        Self { thresholds }
    }

    /// Produce the recommendation.
    ///
    /// Precedence:
    /// 1. Both bottlenecks fired: the lower concurrency of the two (QPS on ties).
    /// 2. One fired: that one, with a caveat when its level processed at most
    ///    twice as many requests as its concurrency.
    /// 3. Neither: the best-QPS level, with the reason depending on whether it
    ///    also maximizes token throughput or trades against latency.
    pub fn recommend(&self, comparison: &ConcurrentComparison) -> BottleneckResult {
        let results = &comparison.test_results;
        match results.as_slice() {
            [] => return BottleneckResult::empty(Algorithm::RecommendedConcurrency),
            [only] => {
                return recommendation(only).with_reason("Only one concurrency level tested");
            }
            _ => {}
        }

        let qps_bottleneck = GradientDetector::new(self.thresholds.gradient).detect(results);
        let latency_bottleneck =
            LatencyDetector::end_to_end(self.thresholds.latency).detect(results);

        let Some(best_qps) = comparison.best_qps() else {
            return recommendation(&results[0]).with_reason("Fallback to first test result");
        };
        let (Some(best_tokens), Some(best_latency)) = (
            comparison.best_tokens_throughput(),
            comparison.best_latency(),
        ) else {
            return recommendation(best_qps).with_reason("Fallback to best QPS result");
        };

        match (qps_bottleneck.is_bottleneck, latency_bottleneck.is_bottleneck) {
            (true, true) => {
                if qps_bottleneck.concurrency <= latency_bottleneck.concurrency {
                    let reason = format!(
                        "QPS bottleneck detected at concurrency {}. Recommend staying below this level for optimal performance.",
                        qps_bottleneck.concurrency
                    );
                    adopt(&qps_bottleneck, reason)
                } else {
                    adopt(&latency_bottleneck, latency_reason(&latency_bottleneck, None))
                }
            }
            (true, false) => {
                let total = total_requests_at(comparison, qps_bottleneck.concurrency);
                let reason = if is_small_sample(total, qps_bottleneck.concurrency) {
                    format!(
                        "QPS bottleneck detected at concurrency {}, but only {} requests were processed. This may indicate the bottleneck is not genuine - consider running longer tests to confirm.",
                        qps_bottleneck.concurrency, total
                    )
                } else {
                    format!(
                        "QPS bottleneck detected at concurrency {}. Recommend staying below this level for optimal throughput.",
                        qps_bottleneck.concurrency
                    )
                };
                adopt(&qps_bottleneck, reason)
            }
            (false, true) => {
                let total = total_requests_at(comparison, latency_bottleneck.concurrency);
                let sample = is_small_sample(total, latency_bottleneck.concurrency).then_some(total);
                adopt(&latency_bottleneck, latency_reason(&latency_bottleneck, sample))
            }
            (false, false) => {
                let reason = if best_tokens.concurrency == best_qps.concurrency {
                    format!(
                        "Optimal concurrency {} maximizes both QPS and token throughput.",
                        best_qps.concurrency
                    )
                } else if best_latency.concurrency <= best_qps.concurrency
                    && best_latency.concurrency <= best_tokens.concurrency
                {
                    format!(
                        "Recommended concurrency {} for balanced performance between QPS and latency.",
                        best_qps.concurrency
                    )
                } else {
                    format!(
                        "Recommended concurrency {} for maximum QPS.",
                        best_qps.concurrency
                    )
                };
                recommendation(best_qps).with_reason(reason)
            }
        }
    }
}

/// Non-bottleneck recommendation describing `point`
fn recommendation(point: &ConcurrentTestResult) -> BottleneckResult {
    BottleneckResult::at(point, false, Algorithm::RecommendedConcurrency)
}

/// Recommendation taking over a detector's data point
fn adopt(found: &BottleneckResult, reason: String) -> BottleneckResult {
    BottleneckResult {
        reason,
        is_bottleneck: false,
        algorithm: Algorithm::RecommendedConcurrency,
        ..found.clone()
    }
}

fn latency_reason(found: &BottleneckResult, small_sample: Option<usize>) -> String {
    match small_sample {
        Some(total) => format!(
            "Latency bottleneck detected at concurrency {}, but only {} requests were processed. This may indicate the bottleneck is not genuine - consider running longer tests to confirm.",
            found.concurrency, total
        ),
        None => format!(
            "Latency bottleneck detected at concurrency {}. Recommend staying below this level to maintain low latency.",
            found.concurrency
        ),
    }
}

/// Total requests of the first recorded level with `concurrency`
fn total_requests_at(comparison: &ConcurrentComparison, concurrency: usize) -> usize {
    comparison
        .test_results
        .iter()
        .find(|r| r.concurrency == concurrency)
        .map(|r| r.metrics.total_requests)
        .unwrap_or(0)
}

fn is_small_sample(total_requests: usize, concurrency: usize) -> bool {
    total_requests > 0 && total_requests <= concurrency * 2
}
