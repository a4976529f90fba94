//! Worker pool plumbing shared by all modes

use std::sync::mpsc::{Receiver, SyncSender};
use std::thread;

use rayon::ThreadPool;

use crate::error::EngineError;

/// Build a pool with exactly `workers` threads
pub(super) fn build_pool(workers: usize) -> Result<ThreadPool, EngineError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("llmperf-worker-{i}"))
        .build()
        .map_err(|e| EngineError::WorkerPool(e.to_string()))
}

/// Run `work(worker_id)` once per worker on the pool and wait for all of them
pub(super) fn run_workers<W>(pool: &ThreadPool, workers: usize, work: W)
where
    W: Fn(usize) + Sync,
{
    let work = &work;
    pool.scope(|scope| {
        for worker_id in 0..workers {
            scope.spawn(move |_| work(worker_id));
        }
    });
}

/// Run workers that report through `tx`, draining `rx` on the calling thread.
///
/// A closer thread waits for every worker and then drops the last sender,
/// which ends the drain loop.
pub(super) fn run_streaming<T, W, C>(
    workers: usize,
    (tx, rx): (SyncSender<T>, Receiver<T>),
    work: W,
    mut consume: C,
) -> Result<(), EngineError>
where
    T: Send,
    W: Fn(usize, &SyncSender<T>) + Sync,
    C: FnMut(T),
{
    let pool = build_pool(workers)?;
    let work = &work;

    thread::scope(|scope| {
        scope.spawn(move || {
            run_workers(&pool, workers, |worker_id| work(worker_id, &tx));
            drop(tx);
        });

        for item in rx {
            consume(item);
        }
    });

    Ok(())
}
