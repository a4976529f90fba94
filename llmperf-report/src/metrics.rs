//! Metrics snapshot of one test run

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// First-token latency statistics, only present for runs where at least one
/// successful request reported a nonzero first-token latency
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FirstTokenMetrics {
    /// Mean first-token latency
    #[serde(rename = "average_first_token_latency", with = "llmperf_core::duration_ms")]
    pub average: Duration,
    /// Median first-token latency
    #[serde(rename = "first_token_latency_p50", with = "llmperf_core::duration_ms")]
    pub p50: Duration,
    /// 90th percentile first-token latency
    #[serde(rename = "first_token_latency_p90", with = "llmperf_core::duration_ms")]
    pub p90: Duration,
    /// 99th percentile first-token latency
    #[serde(rename = "first_token_latency_p99", with = "llmperf_core::duration_ms")]
    pub p99: Duration,
}

/// Aggregate performance of one run.
///
/// Pure output of the analyzer: recomputing from the same results yields an
/// identical value. `successful_requests + failed_requests == total_requests`
/// always holds, and every latency and token field is zero when nothing
/// succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Number of results
    pub total_requests: usize,
    /// Successful results
    pub successful_requests: usize,
    /// Failed results
    pub failed_requests: usize,
    /// Successful / total, in percent
    #[serde(with = "crate::round")]
    pub success_rate: f64,

    /// Wall-clock span of the run
    #[serde(with = "llmperf_core::duration_ms")]
    pub total_duration: Duration,
    /// Mean end-to-end latency of successful requests
    #[serde(with = "llmperf_core::duration_ms")]
    pub average_latency: Duration,
    /// Median latency
    #[serde(with = "llmperf_core::duration_ms")]
    pub latency_p50: Duration,
    /// 90th percentile latency
    #[serde(with = "llmperf_core::duration_ms")]
    pub latency_p90: Duration,
    /// 99th percentile latency
    #[serde(with = "llmperf_core::duration_ms")]
    pub latency_p99: Duration,

    /// Successful requests per second
    #[serde(with = "crate::round")]
    pub qps: f64,
    /// Prompt plus completion tokens of successful requests
    pub total_tokens: u64,
    /// `total_tokens` per second
    #[serde(with = "crate::round")]
    pub tokens_per_second: f64,
    /// Mean prompt tokens per successful request
    #[serde(with = "crate::round")]
    pub average_request_tokens: f64,
    /// Mean completion tokens per successful request
    #[serde(with = "crate::round")]
    pub average_response_tokens: f64,

    /// Streaming statistics
    #[serde(flatten)]
    pub first_token: Option<FirstTokenMetrics>,

    /// Failures by error category as recorded (an empty category is its own key)
    pub error_counts: BTreeMap<String, usize>,
    /// Failures by error category, empty categories counted as `"unknown"`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub error_type_counts: BTreeMap<String, usize>,
}

impl Metrics {
    /// Mean first-token latency, zero when not measured
    pub fn average_first_token_latency(&self) -> Duration {
        self.first_token.map(|ft| ft.average).unwrap_or_default()
    }
}
