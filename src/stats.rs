//! Descriptive statistics shared by the evaluator, the decision engine and the analysers.
//!
//! Variances are population variances. Empty inputs yield zeros rather than NaN.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Percentiles reported in [`SummaryStatistics`]
pub const REPORTED_PERCENTILES: [u8; 7] = [10, 25, 50, 75, 90, 95, 99];

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// `std_dev / mean`, or `None` when the mean is zero
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let mean = mean(values);
    if mean == 0.0 {
        return None;
    }
    Some(std_dev(values) / mean.abs())
}

/// Nearest-rank percentile over already sorted values
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

pub fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Least-squares fit of `value = intercept + slope * index`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation between index and value
    pub correlation: f64,
}

pub fn linear_regression(values: &[f64]) -> LinearFit {
    let n = values.len();
    if n < 2 {
        return LinearFit {
            slope: 0.0,
            intercept: values.first().copied().unwrap_or(0.0),
            correlation: 0.0,
        };
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = y - y_mean;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let slope = if sxx != 0.0 { sxy / sxx } else { 0.0 };
    let correlation = if sxx != 0.0 && syy != 0.0 {
        sxy / (sxx.sqrt() * syy.sqrt())
    } else {
        0.0
    };

    LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
        correlation,
    }
}

/// Statistical summary of a metric window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Keyed by percentile (10, 25, 50, 75, 90, 95, 99)
    pub percentiles: BTreeMap<u8, f64>,
}

impl SummaryStatistics {
    pub fn from_values(values: &[f64]) -> Self {
        let sorted = sorted_copy(values);
        let percentiles = REPORTED_PERCENTILES
            .iter()
            .map(|&p| (p, percentile_sorted(&sorted, p as f64)))
            .collect();

        Self {
            count: values.len(),
            mean: mean(values),
            median: median_sorted(&sorted),
            std_dev: std_dev(values),
            min: sorted.first().copied().unwrap_or(0.0),
            max: sorted.last().copied().unwrap_or(0.0),
            percentiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_moments() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), 5.0);
        assert_eq!(variance(&values), 4.0);
        assert_eq!(std_dev(&values), 2.0);
        assert_eq!(coefficient_of_variation(&values), Some(0.4));
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn regression_recovers_line() {
        let values: Vec<f64> = (0..50).map(|i| 3.0 + 0.5 * i as f64).collect();
        let fit = linear_regression(&values);
        assert!((fit.slope - 0.5).abs() < 1e-9);
        assert!((fit.intercept - 3.0).abs() < 1e-9);
        assert!((fit.correlation - 1.0).abs() < 1e-9);

        let flat = linear_regression(&[4.0; 10]);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.correlation, 0.0);
    }

    #[test]
    fn summary_percentiles() {
        let values: Vec<f64> = (1..=101).map(|i| i as f64).collect();
        let summary = SummaryStatistics::from_values(&values);
        assert_eq!(summary.count, 101);
        assert_eq!(summary.median, 51.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 101.0);
        assert_eq!(summary.percentiles[&10], 11.0);
        assert_eq!(summary.percentiles[&99], 100.0);
        assert_eq!(summary.percentiles.len(), REPORTED_PERCENTILES.len());
    }
}
