//! Summary Statistics
//!
//! Mean and dispersion over a series of measurements. Standard deviation is
//! the population form (divide by `n`), which is what the QPS stability
//! window expects.

/// Mean, spread and extremes of a series
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryStatistics {
    /// Number of values summarized
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
}

impl SummaryStatistics {
    /// Coefficient of variation (`std_dev / mean`), `None` when the mean is zero
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        if self.mean == 0.0 {
            None
        } else {
            Some(self.std_dev / self.mean)
        }
    }

    /// Whether the series is stable: its CV exists and is below `threshold`
    pub fn is_stable(&self, threshold: f64) -> bool {
        self.coefficient_of_variation()
            .is_some_and(|cv| cv < threshold)
    }
}

/// Arithmetic mean, 0.0 for an empty series
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0.0 for an empty series
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Coefficient of variation of a series, `None` when empty or the mean is zero
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    compute_summary(values).coefficient_of_variation()
}

/// Compute summary statistics for a series
pub fn compute_summary(values: &[f64]) -> SummaryStatistics {
    if values.is_empty() {
        return SummaryStatistics::default();
    }

    let min = values
        .iter()
        .copied()
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);
    let max = values
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap_or(0.0);

    SummaryStatistics {
        count: values.len(),
        mean: mean(values),
        std_dev: population_std_dev(values),
        min,
        max,
    }
}
