//! Stress mode: duration- and/or quota-bounded repeated execution

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::pool::run_streaming;
use super::{Engine, WarmupGate};
use crate::error::EngineError;
use crate::provider::RequestCase;
use crate::result::RequestResult;

/// Per-worker stop condition; a zero field is unset
#[derive(Debug, Clone, Copy)]
struct StressBound {
    duration: Duration,
    quota: u64,
}

impl StressBound {
    fn reached(&self, elapsed: Duration, completed: u64) -> bool {
        (!self.duration.is_zero() && elapsed >= self.duration)
            || (self.quota > 0 && completed >= self.quota)
    }
}

impl Engine {
    /// Run `concurrency` workers against the dataset until each reaches its
    /// duration or request quota, whichever is configured and comes first.
    ///
    /// Worker `i` starts at dataset index `i` and walks round-robin. Results
    /// arrive in completion order. When the result channel is full a result
    /// is dropped (and logged) instead of stalling the worker.
    ///
    /// Warmup runs first if configured and `gate` is still open.
    pub fn run_stress(
        &self,
        dataset: &[RequestCase],
        gate: &mut WarmupGate,
    ) -> Result<Vec<RequestResult>, EngineError> {
        if dataset.is_empty() {
            return Err(EngineError::EmptyDataset);
        }
        let bound = StressBound {
            duration: self.config.duration,
            quota: self.config.requests_per_worker,
        };
        if bound.duration.is_zero() && bound.quota == 0 {
            return Err(EngineError::UnboundedStress);
        }

        self.warmup(dataset, gate)?;

        let concurrency = self.concurrency();
        let interval = self.config.request_interval;
        info!(
            target: "llmperf::engine::stress",
            concurrency,
            duration = ?bound.duration,
            quota = bound.quota,
            "Starting stress run"
        );

        let dropped = AtomicU64::new(0);
        let mut results = Vec::new();

        run_streaming(
            concurrency,
            mpsc::sync_channel(self.config.result_buffer.max(1)),
            |worker_id, tx| {
                let started = Instant::now();
                let mut completed = 0u64;
                let mut index = worker_id;

                while !bound.reached(started.elapsed(), completed) {
                    let case = &dataset[index % dataset.len()];
                    index = index.wrapping_add(1);

                    let result = self.executor.execute(case);
                    completed += 1;

                    match tx.try_send(result) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            dropped.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                target: "llmperf::engine::stress",
                                worker_id,
                                "Result channel full, dropping result"
                            );
                        }
                        Err(TrySendError::Disconnected(_)) => break,
                    }

                    if !interval.is_zero() {
                        thread::sleep(interval);
                    }
                }
            },
            |result| {
                self.notify(&result);
                results.push(result);
            },
        )?;

        info!(
            target: "llmperf::engine::stress",
            collected = results.len(),
            dropped = dropped.load(Ordering::Relaxed),
            "Stress run finished"
        );
        Ok(results)
    }
}
