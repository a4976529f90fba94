//! Bottleneck Detection
//!
//! Three heuristics locate the concurrency level where scaling stops paying
//! off. Each sorts a copy of its input by concurrency and never touches the
//! caller's slice:
//! - Gradient: QPS gained per added unit of concurrency drops below a threshold
//! - Statistical: QPS over a sliding window stops varying (CV below threshold)
//! - Latency: relative latency growth outpaces relative concurrency growth

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::comparison::ConcurrentTestResult;
use crate::metrics::Metrics;

/// Algorithm that produced a [`BottleneckResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// QPS gradient
    GradientBased,
    /// QPS coefficient of variation
    StatisticalBased,
    /// Latency growth ratio (end-to-end or first-token)
    LatencyBased,
    /// Combined recommendation
    RecommendedConcurrency,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::GradientBased => "GradientBased",
            Algorithm::StatisticalBased => "StatisticalBased",
            Algorithm::LatencyBased => "LatencyBased",
            Algorithm::RecommendedConcurrency => "RecommendedConcurrency",
        };
        f.write_str(name)
    }
}

/// Where a detector fired, or the last level if it never did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckResult {
    /// Concurrency level of the result
    pub concurrency: usize,
    /// Human-readable explanation (recommendations only)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// QPS at that level
    #[serde(with = "crate::round")]
    pub qps: f64,
    /// Token throughput at that level
    #[serde(with = "crate::round")]
    pub tokens_per_sec: f64,
    /// Average latency at that level in whole milliseconds
    pub average_latency_ms: u64,
    /// Whether the threshold condition actually fired
    pub is_bottleneck: bool,
    /// Producing algorithm
    pub algorithm: Algorithm,
}

impl BottleneckResult {
    /// Non-bottleneck result with no data point
    pub fn empty(algorithm: Algorithm) -> Self {
        Self {
            concurrency: 0,
            reason: String::new(),
            qps: 0.0,
            tokens_per_sec: 0.0,
            average_latency_ms: 0,
            is_bottleneck: false,
            algorithm,
        }
    }

    /// Result describing `point`, with its end-to-end average latency
    pub fn at(point: &ConcurrentTestResult, is_bottleneck: bool, algorithm: Algorithm) -> Self {
        Self {
            concurrency: point.concurrency,
            reason: String::new(),
            qps: point.metrics.qps,
            tokens_per_sec: point.metrics.tokens_per_second,
            average_latency_ms: millis(point.metrics.average_latency.as_nanos() as f64),
            is_bottleneck,
            algorithm,
        }
    }

    /// Attach an explanation
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

/// Tunables of the detectors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BottleneckThresholds {
    /// Minimum QPS gain per unit of concurrency
    pub gradient: f64,
    /// Maximum latency-growth / concurrency-growth ratio
    pub latency: f64,
    /// Sliding window length of the statistical detector
    pub statistical_window: usize,
    /// CV below which QPS counts as plateaued
    pub statistical: f64,
}

impl Default for BottleneckThresholds {
    fn default() -> Self {
        Self {
            gradient: 0.05,
            latency: 1.0,
            statistical_window: 3,
            statistical: 0.05,
        }
    }
}

/// A bottleneck detection algorithm
pub trait BottleneckDetector {
    /// Algorithm tag reported in results
    fn algorithm(&self) -> Algorithm;

    /// Analyze a sweep; `results` may be in any order
    fn detect(&self, results: &[ConcurrentTestResult]) -> BottleneckResult;
}

/// References to `results` ordered by ascending concurrency
fn sorted_by_concurrency(results: &[ConcurrentTestResult]) -> Vec<&ConcurrentTestResult> {
    let mut sorted: Vec<_> = results.iter().collect();
    sorted.sort_by_key(|r| r.concurrency);
    sorted
}

fn millis(nanos: f64) -> u64 {
    (nanos / 1_000_000.0) as u64
}

/// Flags the first adjacent pair whose QPS gradient falls below a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientDetector {
    /// Minimum QPS gain per unit of concurrency
    pub threshold: f64,
}

impl GradientDetector {
    /// Detector with the given threshold
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for GradientDetector {
    fn default() -> Self {
        Self::new(BottleneckThresholds::default().gradient)
    }
}

impl BottleneckDetector for GradientDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::GradientBased
    }

    /// The earlier level of the first pair with `ΔQPS / Δconcurrency`
    /// below the threshold. Pairs where either side had no successes, or
    /// concurrency did not change, are skipped.
    fn detect(&self, results: &[ConcurrentTestResult]) -> BottleneckResult {
        let sorted = sorted_by_concurrency(results);
        let Some(last) = sorted.last() else {
            return BottleneckResult::empty(self.algorithm());
        };

        for pair in sorted.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.metrics.successful_requests == 0 || curr.metrics.successful_requests == 0 {
                continue;
            }
            let concurrency_diff = curr.concurrency as f64 - prev.concurrency as f64;
            if concurrency_diff == 0.0 {
                continue;
            }

            let gradient = (curr.metrics.qps - prev.metrics.qps) / concurrency_diff;
            if gradient < self.threshold {
                return BottleneckResult::at(prev, true, self.algorithm());
            }
        }

        BottleneckResult::at(last, false, self.algorithm())
    }
}

/// Flags the first window of QPS values whose coefficient of variation falls
/// below a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatisticalDetector {
    /// Number of consecutive levels per window
    pub window: usize,
    /// CV threshold
    pub threshold: f64,
}

impl StatisticalDetector {
    /// Detector with the given window and threshold
    pub fn new(window: usize, threshold: f64) -> Self {
        Self { window, threshold }
    }
}

impl Default for StatisticalDetector {
    fn default() -> Self {
        let defaults = BottleneckThresholds::default();
        Self::new(defaults.statistical_window, defaults.statistical)
    }
}

impl BottleneckDetector for StatisticalDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::StatisticalBased
    }

    /// First level of the first window with CV below the threshold.
    ///
    /// Windows end strictly before the last level, so the trailing window
    /// is never examined. Windows with a zero mean are skipped. Fewer levels
    /// than the window size yields an empty non-bottleneck result.
    fn detect(&self, results: &[ConcurrentTestResult]) -> BottleneckResult {
        if self.window == 0 || results.len() < self.window {
            return BottleneckResult::empty(self.algorithm());
        }

        let sorted = sorted_by_concurrency(results);
        let qps: Vec<f64> = sorted.iter().map(|r| r.metrics.qps).collect();

        for end in self.window..qps.len() {
            let start = end - self.window;
            let summary = llmperf_stats::compute_summary(&qps[start..end]);
            if summary.is_stable(self.threshold) {
                return BottleneckResult::at(sorted[start], true, self.algorithm());
            }
        }

        match sorted.last() {
            Some(last) => BottleneckResult::at(last, false, self.algorithm()),
            None => BottleneckResult::empty(self.algorithm()),
        }
    }
}

/// Which latency a [`LatencyDetector`] tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMetric {
    /// Average end-to-end latency
    EndToEnd,
    /// Average first-token latency
    FirstToken,
}

impl LatencyMetric {
    fn nanos(self, metrics: &Metrics) -> f64 {
        match self {
            LatencyMetric::EndToEnd => metrics.average_latency.as_nanos() as f64,
            LatencyMetric::FirstToken => metrics.average_first_token_latency().as_nanos() as f64,
        }
    }
}

/// Flags the first adjacent pair where latency grows faster, relatively,
/// than concurrency does
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyDetector {
    /// Ratio above which latency growth counts as a bottleneck
    pub threshold: f64,
    /// Tracked latency
    pub metric: LatencyMetric,
}

impl LatencyDetector {
    /// End-to-end latency detector
    pub fn end_to_end(threshold: f64) -> Self {
        Self {
            threshold,
            metric: LatencyMetric::EndToEnd,
        }
    }

    /// First-token latency detector
    pub fn first_token(threshold: f64) -> Self {
        Self {
            threshold,
            metric: LatencyMetric::FirstToken,
        }
    }

    fn result_at(&self, point: &ConcurrentTestResult, is_bottleneck: bool) -> BottleneckResult {
        BottleneckResult {
            average_latency_ms: millis(self.metric.nanos(&point.metrics)),
            ..BottleneckResult::at(point, is_bottleneck, self.algorithm())
        }
    }
}

impl BottleneckDetector for LatencyDetector {
    fn algorithm(&self) -> Algorithm {
        Algorithm::LatencyBased
    }

    /// The earlier level of the first pair where
    /// `(Δlatency / latency) / (Δconcurrency / concurrency)` exceeds the
    /// threshold. Pairs without successes, with a zero latency, or with
    /// unchanged concurrency are skipped.
    fn detect(&self, results: &[ConcurrentTestResult]) -> BottleneckResult {
        let sorted = sorted_by_concurrency(results);
        let Some(last) = sorted.last() else {
            return BottleneckResult::empty(self.algorithm());
        };

        for pair in sorted.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.metrics.successful_requests == 0 || curr.metrics.successful_requests == 0 {
                continue;
            }

            let prev_latency = self.metric.nanos(&prev.metrics);
            let curr_latency = self.metric.nanos(&curr.metrics);
            if prev_latency == 0.0 || curr_latency == 0.0 {
                continue;
            }

            let concurrency_diff = curr.concurrency as f64 - prev.concurrency as f64;
            if concurrency_diff == 0.0 {
                continue;
            }

            let latency_growth = (curr_latency - prev_latency) / prev_latency;
            let concurrency_growth = concurrency_diff / prev.concurrency as f64;
            let ratio = latency_growth / concurrency_growth;

            if ratio > self.threshold {
                return self.result_at(prev, true);
            }
        }

        self.result_at(last, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn qps_series(qps: &[f64]) -> Vec<ConcurrentTestResult> {
        qps.iter()
            .enumerate()
            .map(|(i, &qps)| ConcurrentTestResult {
                concurrency: i + 1,
                metrics: Metrics {
                    total_requests: 50,
                    successful_requests: 50,
                    qps,
                    tokens_per_second: qps * 100.0,
                    average_latency: Duration::from_millis(100),
                    ..Default::default()
                },
            })
            .collect()
    }

    fn latency_series(latencies_ms: &[u64]) -> Vec<ConcurrentTestResult> {
        latencies_ms
            .iter()
            .enumerate()
            .map(|(i, &ms)| ConcurrentTestResult {
                concurrency: i + 1,
                metrics: Metrics {
                    total_requests: 50,
                    successful_requests: 50,
                    qps: 10.0,
                    average_latency: Duration::from_millis(ms),
                    ..Default::default()
                },
            })
            .collect()
    }

    #[test]
    fn test_gradient_flags_earlier_point_of_flattening_pair() {
        let results = qps_series(&[10.0, 20.0, 25.0, 27.0, 27.5]);

        let found = GradientDetector::new(10.0).detect(&results);

        assert!(found.is_bottleneck);
        assert_eq!(found.concurrency, 2);
        assert_eq!(found.qps, 20.0);
        assert_eq!(found.average_latency_ms, 100);
        assert_eq!(found.algorithm, Algorithm::GradientBased);
    }

    #[test]
    fn test_gradient_returns_last_point_when_scaling_holds() {
        let results = qps_series(&[10.0, 20.0, 30.0]);

        let found = GradientDetector::default().detect(&results);

        assert!(!found.is_bottleneck);
        assert_eq!(found.concurrency, 3);
    }

    #[test]
    fn test_gradient_ignores_input_order() {
        let mut results = qps_series(&[10.0, 20.0, 25.0, 27.0, 27.5]);
        let before = results.clone();
        results.reverse();

        let found = GradientDetector::new(10.0).detect(&results);

        assert_eq!(found.concurrency, 2);
        // caller's slice untouched
        assert_eq!(results[0], before[4]);
    }

    #[test]
    fn test_gradient_skips_pairs_without_successes() {
        let mut results = qps_series(&[10.0, 10.5, 30.0]);
        results[1].metrics.successful_requests = 0;

        let found = GradientDetector::new(1.0).detect(&results);

        assert!(!found.is_bottleneck);
        assert_eq!(found.concurrency, 3);
    }

    #[test]
    fn test_gradient_skips_duplicate_concurrency() {
        let mut results = qps_series(&[10.0, 10.0]);
        results[1].concurrency = 1;

        let found = GradientDetector::new(1.0).detect(&results);

        assert!(!found.is_bottleneck);
    }

    #[test]
    fn test_statistical_finds_plateau() {
        let results = qps_series(&[10.0, 20.0, 30.0, 31.0, 31.5, 32.0]);

        let found = StatisticalDetector::new(3, 0.05).detect(&results);

        assert!(found.is_bottleneck);
        assert_eq!(found.concurrency, 3);
        assert_eq!(found.algorithm, Algorithm::StatisticalBased);
    }

    #[test]
    fn test_statistical_ignores_trailing_window() {
        let results = qps_series(&[10.0, 20.0, 40.0, 40.0]);

        let found = StatisticalDetector::new(2, 0.01).detect(&results);

        assert!(!found.is_bottleneck);
        assert_eq!(found.concurrency, 4);
    }

    #[test]
    fn test_statistical_exact_window_examines_nothing() {
        let results = qps_series(&[30.0, 30.0, 30.0]);

        let found = StatisticalDetector::new(3, 0.05).detect(&results);

        assert!(!found.is_bottleneck);
        assert_eq!(found.concurrency, 3);
    }

    #[test]
    fn test_statistical_needs_a_full_window() {
        let results = qps_series(&[10.0, 10.0]);

        let found = StatisticalDetector::new(3, 0.05).detect(&results);

        assert!(!found.is_bottleneck);
        assert_eq!(found.concurrency, 0);
    }

    #[test]
    fn test_statistical_skips_zero_mean_windows() {
        let results = qps_series(&[0.0, 0.0, 0.0, 0.0]);

        let found = StatisticalDetector::new(3, 0.05).detect(&results);

        assert!(!found.is_bottleneck);
        assert_eq!(found.concurrency, 4);
    }

    #[test]
    fn test_latency_ratio_detects_superlinear_growth() {
        let results = latency_series(&[100, 150, 250, 400, 800]);

        let found = LatencyDetector::end_to_end(1.0).detect(&results);

        // 1->2: 0.5 / 1.0 = 0.5; 2->3: 0.667 / 0.5 = 1.33
        assert!(found.is_bottleneck);
        assert_eq!(found.concurrency, 2);
        assert_eq!(found.average_latency_ms, 150);
        assert_eq!(found.algorithm, Algorithm::LatencyBased);
    }

    #[test]
    fn test_latency_linear_growth_is_not_a_bottleneck() {
        let results = latency_series(&[100, 200, 300, 400]);

        let found = LatencyDetector::end_to_end(1.0).detect(&results);

        assert!(!found.is_bottleneck);
        assert_eq!(found.concurrency, 4);
        assert_eq!(found.average_latency_ms, 400);
    }

    #[test]
    fn test_first_token_variant_reads_first_token_latency() {
        let mut results = latency_series(&[100, 100, 100]);
        for (result, ms) in results.iter_mut().zip([20u64, 80, 90]) {
            result.metrics.first_token = Some(crate::metrics::FirstTokenMetrics {
                average: Duration::from_millis(ms),
                ..Default::default()
            });
        }

        let found = LatencyDetector::first_token(1.0).detect(&results);

        assert!(found.is_bottleneck);
        assert_eq!(found.concurrency, 1);
        assert_eq!(found.average_latency_ms, 20);
    }

    #[test]
    fn test_first_token_variant_without_streaming_data() {
        let results = latency_series(&[100, 500, 900]);

        let found = LatencyDetector::first_token(1.0).detect(&results);

        assert!(!found.is_bottleneck);
        assert_eq!(found.average_latency_ms, 0);
    }

    #[test]
    fn test_degenerate_inputs_never_flag() {
        let detectors: Vec<Box<dyn BottleneckDetector>> = vec![
            Box::new(GradientDetector::default()),
            Box::new(StatisticalDetector::default()),
            Box::new(LatencyDetector::end_to_end(1.0)),
            Box::new(LatencyDetector::first_token(1.0)),
        ];
        let single = qps_series(&[42.0]);

        for detector in &detectors {
            assert!(!detector.detect(&[]).is_bottleneck);
            assert!(!detector.detect(&single).is_bottleneck);
        }
        assert_eq!(GradientDetector::default().detect(&single).concurrency, 1);
        assert_eq!(GradientDetector::default().detect(&[]).concurrency, 0);
    }
}
