//! Percentile Computation
//!
//! Nearest-rank percentiles: the reported value is the element at sorted
//! index `floor(n * p)`. There is no interpolation between ranks; reports
//! stay comparable with earlier runs only as long as this rule is kept.

use serde::{Deserialize, Serialize};

/// Median fraction
pub const P50: f64 = 0.50;
/// 90th percentile fraction
pub const P90: f64 = 0.90;
/// 99th percentile fraction
pub const P99: f64 = 0.99;

/// Standard percentiles reported for latency distributions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentiles<T> {
    /// 50th percentile (median)
    pub p50: T,
    /// 90th percentile
    pub p90: T,
    /// 99th percentile
    pub p99: T,
}

/// Index selected by the nearest-rank rule for a sample of `len` values.
///
/// Returns `None` for an empty sample. Fractions at or above 1.0 clamp to
/// the last element.
pub fn nearest_rank_index(len: usize, fraction: f64) -> Option<usize> {
    if len == 0 {
        return None;
    }

    let rank = (len as f64 * fraction).floor();
    if rank.is_nan() || rank <= 0.0 {
        return Some(0);
    }

    Some((rank as usize).min(len - 1))
}

/// Value at the nearest-rank index of an already sorted slice
pub fn nearest_rank<T: Copy>(sorted: &[T], fraction: f64) -> Option<T> {
    nearest_rank_index(sorted.len(), fraction).map(|idx| sorted[idx])
}

/// Compute p50/p90/p99 over an unsorted sample.
///
/// The input is copied and sorted ascending, so the result does not depend
/// on the order of `samples`. Returns `None` when `samples` is empty.
///
/// # Examples
///
/// ```
/// # use llmperf_stats::compute_percentiles;
/// let samples: Vec<u64> = (1..=10).collect();
/// let p = compute_percentiles(&samples).unwrap();
/// assert_eq!(p.p50, 6); // index floor(10 * 0.5) = 5
/// assert_eq!(p.p90, 10); // index floor(10 * 0.9) = 9
/// ```
pub fn compute_percentiles<T: Copy + Ord>(samples: &[T]) -> Option<Percentiles<T>> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_unstable();

    Some(Percentiles {
        p50: nearest_rank(&sorted, P50)?,
        p90: nearest_rank(&sorted, P90)?,
        p99: nearest_rank(&sorted, P99)?,
    })
}
