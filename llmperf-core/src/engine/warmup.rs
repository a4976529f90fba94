//! Warmup phase and its run-once gate

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use tracing::{error, info};

use super::Engine;
use super::pool::{build_pool, run_workers};
use crate::error::EngineError;
use crate::provider::RequestCase;

/// Run-once flag for the warmup phase.
///
/// Owned by whoever drives a sweep and passed to every stress run of it, so
/// warmup happens before the first measured level only. A fresh gate starts
/// open.
#[derive(Debug, Default)]
pub struct WarmupGate {
    consumed: bool,
}

impl WarmupGate {
    /// Open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether warmup has already been attempted through this gate
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Close the gate, returning true if it was open
    pub(crate) fn claim(&mut self) -> bool {
        !std::mem::replace(&mut self.consumed, true)
    }
}

impl Engine {
    /// Run warmup unless `gate` was already consumed or no warmup is configured
    pub fn warmup(&self, dataset: &[RequestCase], gate: &mut WarmupGate) -> Result<(), EngineError> {
        if self.config.warmup.is_zero() || !gate.claim() {
            return Ok(());
        }
        self.run_warmup(dataset)
    }

    /// Round-robin requests for the warmup duration; the first failure stops
    /// every worker and is returned.
    fn run_warmup(&self, dataset: &[RequestCase]) -> Result<(), EngineError> {
        if dataset.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let concurrency = self.concurrency();
        let length = self.config.warmup;
        let interval = self.config.warmup_interval;
        info!(
            target: "llmperf::engine::warmup",
            concurrency,
            duration = ?length,
            "Starting warmup"
        );

        let pool = build_pool(concurrency)?;
        let aborted = AtomicBool::new(false);
        let first_error = OnceLock::new();

        run_workers(&pool, concurrency, |worker_id| {
            let started = Instant::now();
            let mut index = worker_id;

            while started.elapsed() < length && !aborted.load(Ordering::Acquire) {
                let result = self.executor.execute(&dataset[index % dataset.len()]);
                if !result.success {
                    let _ = first_error.set(result.error.unwrap_or_default());
                    aborted.store(true, Ordering::Release);
                    break;
                }
                index += 1;
                if !interval.is_zero() {
                    thread::sleep(interval);
                }
            }
        });

        match first_error.into_inner() {
            Some(message) => {
                error!(target: "llmperf::engine::warmup", "Warmup failed: {message}");
                Err(EngineError::WarmupFailed { message })
            }
            None => Ok(()),
        }
    }
}
