#![warn(missing_docs)]
//! # llmperf
//!
//! Load generation and concurrency benchmarking for completion-style
//! inference endpoints.
//!
//! llmperf drives an OpenAI-compatible endpoint with a dataset of request
//! bodies and reports how it behaves as concurrency grows:
//! - **Batch mode**: every dataset case exactly once, results in dataset order
//! - **Stress mode**: round-robin load bounded by duration and/or request quota
//! - **Sweeps**: one run per concurrency level, warmup at most once
//! - **Metrics**: QPS, token throughput, nearest-rank latency percentiles,
//!   first-token latency, error histograms
//! - **Bottleneck detection**: gradient, statistical and latency detectors
//!   plus a recommended concurrency
//!
//! ## Quick Start
//!
//! ```ignore
//! use llmperf::prelude::*;
//!
//! let executor = RequestExecutor::new(sender, Params::new(), Default::default());
//! let mut engine = Engine::new(executor, EngineConfig::default());
//! let mut comparison = ConcurrentComparison::new();
//! for level in [1, 2, 4, 8] {
//!     engine.set_concurrency(level);
//!     let collector = Collector::from(engine.run_batch(&dataset)?);
//!     comparison.add(level, analyze(&collector));
//! }
//! let recommendation = comparison.recommended_concurrency();
//! ```

// Re-export core types
pub use llmperf_core::{
    Choice, Collector, Delta, Engine, EngineConfig, EngineError, Message, NETWORK_ERROR_INDICATORS,
    Params, ProviderError, RequestCase, RequestExecutor, RequestResult, RequestSender, Response,
    ResultHook, Usage, WarmupGate, categorize_error, merge_params,
};

// Re-export analysis and reporting
pub use llmperf_report::{
    Algorithm, Analyzer, BottleneckDetector, BottleneckResult, BottleneckThresholds,
    ConcurrentComparison, ConcurrentTestResult, FirstTokenMetrics, GradientDetector,
    LatencyDetector, LatencyMetric, Metrics, OutputFormat, Recommender, ReportMeta, RunMode,
    StatisticalDetector, SweepReport, analyze,
};

// Re-export stats
pub use llmperf_stats::{
    Percentiles, SummaryStatistics, compute_percentiles, compute_summary, nearest_rank,
};

// Re-export the command-line harness
pub use llmperf_cli::{
    LlmPerfConfig, OpenAiProvider, Sweep, build_provider, load_dataset, parse_jsonl,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Collector, ConcurrentComparison, Engine, EngineConfig, Params, RequestCase,
        RequestExecutor, RequestSender, analyze,
    };
}

/// Run the llmperf command-line interface.
///
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     llmperf::run()
/// }
/// ```
pub use llmperf_cli::run;
