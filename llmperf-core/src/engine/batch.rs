//! Batch mode: each dataset case exactly once, results in dataset order

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use tracing::{debug, info};

use super::Engine;
use super::pool::run_streaming;
use crate::error::EngineError;
use crate::provider::RequestCase;
use crate::result::RequestResult;

/// Closed, pre-filled queue of `(index, case)` jobs.
///
/// Every index is handed out to exactly one caller of [`JobQueue::next`].
struct JobQueue<'a> {
    cases: &'a [RequestCase],
    cursor: AtomicUsize,
}

impl<'a> JobQueue<'a> {
    fn new(cases: &'a [RequestCase]) -> Self {
        Self {
            cases,
            cursor: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> Option<(usize, &'a RequestCase)> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.cases.get(index).map(|case| (index, case))
    }
}

impl Engine {
    /// Execute every case once with `concurrency` workers.
    ///
    /// `results[i]` is the outcome of `dataset[i]` regardless of completion
    /// order. Failed requests are recorded, they never abort the batch.
    pub fn run_batch(&self, dataset: &[RequestCase]) -> Result<Vec<RequestResult>, EngineError> {
        let concurrency = self.concurrency();
        info!(
            target: "llmperf::engine::batch",
            concurrency,
            cases = dataset.len(),
            "Starting batch run"
        );

        if dataset.is_empty() {
            return Ok(Vec::new());
        }

        let queue = JobQueue::new(dataset);
        let mut slots: Vec<Option<RequestResult>> = (0..dataset.len()).map(|_| None).collect();

        run_streaming(
            concurrency,
            mpsc::sync_channel(dataset.len()),
            |worker_id, tx| {
                while let Some((index, case)) = queue.next() {
                    let result = self.executor.execute(case);
                    if tx.send((index, result)).is_err() {
                        break;
                    }
                }
                debug!(target: "llmperf::engine::batch", worker_id, "worker drained queue");
            },
            |(index, result)| {
                self.notify(&result);
                slots[index] = Some(result);
            },
        )?;

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(EngineError::MissingResult { index }))
            .collect()
    }
}
