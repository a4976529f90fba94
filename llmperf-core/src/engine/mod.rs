//! Engine - Worker Pool Scheduling
//!
//! Two execution modes share one pool strategy: a rayon pool sized to the
//! concurrency level, one long-lived job per virtual user, and a channel
//! that streams results back to the calling thread.
//! - Batch: every dataset case exactly once, output in dataset order
//! - Stress: round-robin over the dataset until a duration or quota bound
//! - Warmup: optional pre-phase of a stress run, at most once per [`WarmupGate`]

mod batch;
mod pool;
mod stress;
mod warmup;

use std::sync::Arc;
use std::time::Duration;

use crate::executor::RequestExecutor;
use crate::result::RequestResult;

pub use warmup::WarmupGate;

/// Callback invoked on the calling thread for each result as it arrives
pub type ResultHook = Arc<dyn Fn(&RequestResult) + Send + Sync>;

/// Scheduling parameters of an engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of concurrent workers (values below 1 run one worker)
    pub concurrency: usize,
    /// Stress: per-worker wall-clock bound (zero = unset)
    pub duration: Duration,
    /// Stress: per-worker request quota (zero = unset)
    pub requests_per_worker: u64,
    /// Stress: pause after each request of a worker
    pub request_interval: Duration,
    /// Warmup length (zero = no warmup)
    pub warmup: Duration,
    /// Pause after each warmup request
    pub warmup_interval: Duration,
    /// Stress: capacity of the result channel; results beyond it are dropped
    pub result_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            duration: Duration::ZERO,
            requests_per_worker: 0,
            request_interval: Duration::from_millis(10),
            warmup: Duration::ZERO,
            warmup_interval: Duration::from_millis(100),
            result_buffer: 1000,
        }
    }
}

/// Load generation engine
pub struct Engine {
    executor: RequestExecutor,
    config: EngineConfig,
    on_result: Option<ResultHook>,
}

impl Engine {
    /// Create an engine
    pub fn new(executor: RequestExecutor, config: EngineConfig) -> Self {
        Self {
            executor,
            config,
            on_result: None,
        }
    }

    /// Register a callback fired for every collected result (progress display)
    pub fn with_result_hook(mut self, hook: ResultHook) -> Self {
        self.on_result = Some(hook);
        self
    }

    /// Scheduling parameters
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Change the concurrency level for subsequent runs
    pub fn set_concurrency(&mut self, concurrency: usize) {
        self.config.concurrency = concurrency;
    }

    /// Effective number of workers, at least 1
    pub fn concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    fn notify(&self, result: &RequestResult) {
        if let Some(hook) = &self.on_result {
            hook(result);
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("executor", &self.executor)
            .field("config", &self.config)
            .field("on_result", &self.on_result.is_some())
            .finish()
    }
}
