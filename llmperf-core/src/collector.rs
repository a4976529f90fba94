//! Result collection for one test run

use std::time::Duration;

use crate::result::RequestResult;

/// Append-only store of the results of one run.
///
/// All results belong to the same run (same concurrency level, dataset and
/// mode). Order is whatever the engine produced: dataset order for batch
/// runs, completion order for stress runs.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    results: Vec<RequestResult>,
}

impl Collector {
    /// Empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one result
    pub fn add(&mut self, result: RequestResult) {
        self.results.push(result);
    }

    /// All results in insertion order
    pub fn results(&self) -> &[RequestResult] {
        &self.results
    }

    /// Successful results only
    pub fn successful(&self) -> impl Iterator<Item = &RequestResult> {
        self.results.iter().filter(|r| r.success)
    }

    /// Failed results only
    pub fn failed(&self) -> impl Iterator<Item = &RequestResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Number of results
    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    /// Number of successful results
    pub fn success_count(&self) -> usize {
        self.successful().count()
    }

    /// Number of failed results
    pub fn failure_count(&self) -> usize {
        self.total_count() - self.success_count()
    }

    /// Whether nothing was collected
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Wall-clock span of the run: latest end minus earliest start.
    ///
    /// Zero for an empty collector, never negative.
    pub fn duration(&self) -> Duration {
        let Some(first) = self.results.iter().map(|r| r.start_time).min() else {
            return Duration::ZERO;
        };
        let last = self
            .results
            .iter()
            .map(|r| r.end_time)
            .max()
            .unwrap_or(first);

        (last - first).to_std().unwrap_or(Duration::ZERO)
    }

    /// Consume the collector, returning its results
    pub fn into_results(self) -> Vec<RequestResult> {
        self.results
    }
}

impl From<Vec<RequestResult>> for Collector {
    fn from(results: Vec<RequestResult>) -> Self {
        Self { results }
    }
}

impl Extend<RequestResult> for Collector {
    fn extend<I: IntoIterator<Item = RequestResult>>(&mut self, iter: I) {
        self.results.extend(iter);
    }
}
