//! Sweep data points and "best at metric X" queries

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::bottleneck::{
    BottleneckDetector, BottleneckResult, BottleneckThresholds, GradientDetector, LatencyDetector,
    StatisticalDetector,
};
use crate::metrics::Metrics;
use crate::recommend::Recommender;

/// Metrics of one concurrency level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrentTestResult {
    /// Concurrency level tested
    pub concurrency: usize,
    /// Metrics observed at that level
    pub metrics: Metrics,
}

/// All levels of a sweep.
///
/// Order of `test_results` carries no meaning. Every `best_*` query breaks
/// ties in favor of the higher concurrency level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcurrentComparison {
    /// One entry per tested level
    pub test_results: Vec<ConcurrentTestResult>,
}

impl ConcurrentComparison {
    /// Empty comparison
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the metrics of one level
    pub fn add(&mut self, concurrency: usize, metrics: Metrics) {
        self.test_results.push(ConcurrentTestResult {
            concurrency,
            metrics,
        });
    }

    /// Number of levels recorded
    pub fn len(&self) -> usize {
        self.test_results.len()
    }

    /// Whether no level was recorded
    pub fn is_empty(&self) -> bool {
        self.test_results.is_empty()
    }

    /// Level with the highest QPS
    pub fn best_qps(&self) -> Option<&ConcurrentTestResult> {
        self.best_by(|m| Some(m.qps), Ordering::Greater)
    }

    /// Level with the highest token throughput
    pub fn best_tokens_throughput(&self) -> Option<&ConcurrentTestResult> {
        self.best_by(|m| Some(m.tokens_per_second), Ordering::Greater)
    }

    /// Level with the highest success rate
    pub fn best_success_rate(&self) -> Option<&ConcurrentTestResult> {
        self.best_by(|m| Some(m.success_rate), Ordering::Greater)
    }

    /// Level with the lowest nonzero average latency
    pub fn best_latency(&self) -> Option<&ConcurrentTestResult> {
        self.best_by(
            |m| nonzero_nanos(m.average_latency.as_nanos()),
            Ordering::Less,
        )
    }

    /// Level with the lowest nonzero average first-token latency
    pub fn best_first_token_latency(&self) -> Option<&ConcurrentTestResult> {
        self.best_by(
            |m| nonzero_nanos(m.average_first_token_latency().as_nanos()),
            Ordering::Less,
        )
    }

    /// QPS bottleneck with the default gradient detector
    pub fn qps_bottleneck(&self) -> BottleneckResult {
        GradientDetector::default().detect(&self.test_results)
    }

    /// QPS plateau with the default statistical detector
    pub fn statistical_bottleneck(&self) -> BottleneckResult {
        StatisticalDetector::default().detect(&self.test_results)
    }

    /// End-to-end latency bottleneck with the default latency detector
    pub fn latency_bottleneck(&self) -> BottleneckResult {
        LatencyDetector::end_to_end(BottleneckThresholds::default().latency).detect(&self.test_results)
    }

    /// First-token latency bottleneck with the default latency detector
    pub fn first_token_latency_bottleneck(&self) -> BottleneckResult {
        LatencyDetector::first_token(BottleneckThresholds::default().latency).detect(&self.test_results)
    }

    /// Recommended concurrency with default thresholds
    pub fn recommended_concurrency(&self) -> BottleneckResult {
        Recommender::default().recommend(self)
    }

    /// Best entry by `key`, where `better` is the ordering a candidate's value
    /// must have against the current best to replace it. Entries whose key is
    /// `None` are skipped; if every entry is skipped the first one is returned.
    fn best_by<F>(&self, key: F, better: Ordering) -> Option<&ConcurrentTestResult>
    where
        F: Fn(&Metrics) -> Option<f64>,
    {
        let mut best: Option<(&ConcurrentTestResult, f64)> = None;

        for candidate in &self.test_results {
            let Some(value) = key(&candidate.metrics) else {
                continue;
            };
            best = match best {
                None => Some((candidate, value)),
                Some((current, current_value)) => {
                    let replace = match value.partial_cmp(&current_value) {
                        Some(Ordering::Equal) => candidate.concurrency > current.concurrency,
                        Some(ordering) => ordering == better,
                        None => false,
                    };
                    if replace {
                        Some((candidate, value))
                    } else {
                        Some((current, current_value))
                    }
                }
            };
        }

        best.map(|(result, _)| result).or_else(|| self.test_results.first())
    }
}

fn nonzero_nanos(nanos: u128) -> Option<f64> {
    (nanos > 0).then_some(nanos as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn level(concurrency: usize, qps: f64, tokens: f64, latency_ms: u64) -> ConcurrentTestResult {
        ConcurrentTestResult {
            concurrency,
            metrics: Metrics {
                total_requests: 100,
                successful_requests: 100,
                qps,
                tokens_per_second: tokens,
                average_latency: Duration::from_millis(latency_ms),
                ..Default::default()
            },
        }
    }

    fn comparison(levels: Vec<ConcurrentTestResult>) -> ConcurrentComparison {
        ConcurrentComparison {
            test_results: levels,
        }
    }

    #[test]
    fn test_empty_has_no_best() {
        let cmp = ConcurrentComparison::new();
        assert!(cmp.best_qps().is_none());
        assert!(cmp.best_latency().is_none());
        assert!(cmp.best_first_token_latency().is_none());
    }

    #[test]
    fn test_best_qps_and_throughput() {
        let cmp = comparison(vec![
            level(4, 30.0, 900.0, 130),
            level(1, 10.0, 300.0, 100),
            level(8, 25.0, 950.0, 300),
        ]);

        assert_eq!(cmp.best_qps().unwrap().concurrency, 4);
        assert_eq!(cmp.best_tokens_throughput().unwrap().concurrency, 8);
        assert_eq!(cmp.best_latency().unwrap().concurrency, 1);
    }

    #[test]
    fn test_ties_prefer_higher_concurrency() {
        let cmp = comparison(vec![
            level(8, 20.0, 500.0, 100),
            level(2, 20.0, 500.0, 100),
            level(16, 20.0, 500.0, 100),
            level(4, 20.0, 500.0, 100),
        ]);

        assert_eq!(cmp.best_qps().unwrap().concurrency, 16);
        assert_eq!(cmp.best_tokens_throughput().unwrap().concurrency, 16);
        assert_eq!(cmp.best_latency().unwrap().concurrency, 16);
        assert_eq!(cmp.best_success_rate().unwrap().concurrency, 16);
    }

    #[test]
    fn test_best_latency_skips_zero() {
        let cmp = comparison(vec![
            level(1, 0.0, 0.0, 0),
            level(2, 10.0, 100.0, 250),
            level(4, 12.0, 120.0, 200),
        ]);

        assert_eq!(cmp.best_latency().unwrap().concurrency, 4);
        // no level streamed: falls back to the first entry
        assert_eq!(cmp.best_first_token_latency().unwrap().concurrency, 1);
    }

    #[test]
    fn test_add_and_serialize() {
        let mut cmp = ConcurrentComparison::new();
        cmp.add(2, Metrics::default());

        let json = serde_json::to_value(&cmp).unwrap();
        assert_eq!(json["test_results"][0]["concurrency"], 2);
        assert_eq!(cmp.len(), 1);
    }
}
