//! Concurrency sweep coordination
//!
//! Runs the engine once per concurrency level and keeps one
//! [`ConcurrentTestResult`](llmperf_report::ConcurrentTestResult) per level.
//! The warmup gate lives here so a stress sweep warms up only before its
//! first level.

use llmperf_core::{Collector, Engine, EngineError, RequestCase, WarmupGate};
use llmperf_report::{ConcurrentComparison, Metrics, RunMode, analyze};
use tracing::info;

/// Drives an [`Engine`] across concurrency levels
#[derive(Debug)]
pub struct Sweep {
    engine: Engine,
    mode: RunMode,
    gate: WarmupGate,
    comparison: ConcurrentComparison,
}

impl Sweep {
    /// Sweep running `engine` in `mode`
    pub fn new(engine: Engine, mode: RunMode) -> Self {
        Self {
            engine,
            mode,
            gate: WarmupGate::new(),
            comparison: ConcurrentComparison::new(),
        }
    }

    /// Execution mode
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Whether the warmup phase has already run
    pub fn warmup_consumed(&self) -> bool {
        self.gate.is_consumed()
    }

    /// Run one level, record its metrics and hand back the raw results
    pub fn run_level(
        &mut self,
        concurrency: usize,
        dataset: &[RequestCase],
    ) -> Result<Collector, EngineError> {
        self.engine.set_concurrency(concurrency);
        let results = match self.mode {
            RunMode::Batch => self.engine.run_batch(dataset)?,
            RunMode::Stress => self.engine.run_stress(dataset, &mut self.gate)?,
        };

        let collector = Collector::from(results);
        let metrics = analyze(&collector);
        log_level_summary(concurrency, &metrics);
        self.comparison.add(concurrency, metrics);
        Ok(collector)
    }

    /// Run every level in order, calling `on_level` with each level's
    /// results and every level recorded so far. The first error from either
    /// side stops the sweep.
    pub fn run<E, F>(
        &mut self,
        levels: &[usize],
        dataset: &[RequestCase],
        mut on_level: F,
    ) -> Result<(), E>
    where
        E: From<EngineError>,
        F: FnMut(usize, &Collector, &ConcurrentComparison) -> Result<(), E>,
    {
        for &concurrency in levels {
            let collector = self.run_level(concurrency, dataset)?;
            on_level(concurrency, &collector, &self.comparison)?;
        }
        Ok(())
    }

    /// Levels recorded so far
    pub fn comparison(&self) -> &ConcurrentComparison {
        &self.comparison
    }

    /// Consume the sweep, keeping the recorded levels
    pub fn into_comparison(self) -> ConcurrentComparison {
        self.comparison
    }
}

fn log_level_summary(concurrency: usize, metrics: &Metrics) {
    info!(
        target: "llmperf::sweep",
        concurrency,
        total = metrics.total_requests,
        failed = metrics.failed_requests,
        success_rate = metrics.success_rate,
        qps = metrics.qps,
        avg_latency_ms = metrics.average_latency.as_millis() as u64,
        p99_latency_ms = metrics.latency_p99.as_millis() as u64,
        tokens_per_second = metrics.tokens_per_second,
        "Level complete"
    );
}
