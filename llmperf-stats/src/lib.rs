#![warn(missing_docs)]
//! llmperf Statistical Helpers
//!
//! Small, dependency-free numeric routines shared by the analyzer and the
//! bottleneck detectors:
//! - Nearest-rank percentiles (`floor(n * p)`, no interpolation)
//! - Mean, population standard deviation and coefficient of variation

mod percentiles;
mod summary;

pub use percentiles::{P50, P90, P99, Percentiles, compute_percentiles, nearest_rank, nearest_rank_index};
pub use summary::{SummaryStatistics, coefficient_of_variation, compute_summary, mean, population_std_dev};
