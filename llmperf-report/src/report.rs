//! Report Data Structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bottleneck::{
    BottleneckDetector, BottleneckResult, BottleneckThresholds, GradientDetector, LatencyDetector,
    StatisticalDetector,
};
use crate::comparison::{ConcurrentComparison, ConcurrentTestResult};
use crate::recommend::Recommender;

/// Schema version of [`SweepReport`]
pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// Execution mode of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Whole dataset once per level
    Batch,
    /// Duration/quota bounded load
    Stress,
}

/// Report metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Report schema version
    pub schema_version: u32,
    /// llmperf version that produced the report
    pub version: String,
    /// When the report was generated
    pub timestamp: DateTime<Utc>,
    /// Provider name
    pub provider: String,
    /// Model name, empty if not configured
    pub model: String,
    /// Execution mode
    pub mode: RunMode,
}

impl ReportMeta {
    /// Metadata stamped with the current time and crate version
    pub fn new(provider: impl Into<String>, model: impl Into<String>, mode: RunMode) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            provider: provider.into(),
            model: model.into(),
            mode,
        }
    }
}

/// Complete result of a concurrency sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Run metadata
    pub meta: ReportMeta,
    /// One entry per tested level, in test order
    pub test_results: Vec<ConcurrentTestResult>,
    /// Gradient detector output
    pub qps_bottleneck: BottleneckResult,
    /// Statistical detector output
    pub statistical_bottleneck: BottleneckResult,
    /// End-to-end latency detector output
    pub latency_bottleneck: BottleneckResult,
    /// First-token latency detector output
    pub first_token_latency_bottleneck: BottleneckResult,
    /// Recommended concurrency
    pub recommendation: BottleneckResult,
}

impl SweepReport {
    /// Run every detector and the recommender over `comparison`
    pub fn build(
        meta: ReportMeta,
        comparison: &ConcurrentComparison,
        thresholds: &BottleneckThresholds,
    ) -> Self {
        let results = &comparison.test_results;
        Self {
            meta,
            test_results: results.clone(),
            qps_bottleneck: GradientDetector::new(thresholds.gradient).detect(results),
            statistical_bottleneck: StatisticalDetector::new(
                thresholds.statistical_window,
                thresholds.statistical,
            )
            .detect(results),
            latency_bottleneck: LatencyDetector::end_to_end(thresholds.latency).detect(results),
            first_token_latency_bottleneck: LatencyDetector::first_token(thresholds.latency)
                .detect(results),
            recommendation: Recommender::new(*thresholds).recommend(comparison),
        }
    }

    /// Whether any level streamed first-token data
    pub fn has_first_token_data(&self) -> bool {
        self.test_results
            .iter()
            .any(|r| r.metrics.first_token.is_some())
    }
}
