//! Additive decomposition of a series into trend, seasonal and residual parts

use serde::{Deserialize, Serialize};

use crate::series::TimeSeries;

/// Seasonal period assumed by the decomposer (hourly samples, daily cycle)
pub const DECOMPOSITION_PERIOD: usize = 24;

/// Upper bound of the moving-average window
const MAX_TREND_WINDOW: usize = 24;

/// `original[i] == trend[i] + seasonal[i] + residual[i]`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendComponents {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSeriesDecomposer;

impl TimeSeriesDecomposer {
    pub fn new() -> Self {
        Self
    }

    pub fn decompose(&self, series: &TimeSeries) -> TrendComponents {
        self.decompose_values(&series.values())
    }

    pub fn decompose_values(&self, values: &[f64]) -> TrendComponents {
        let n = values.len();
        if n == 0 {
            return TrendComponents::default();
        }

        let window = MAX_TREND_WINDOW.min(n / 4).max(1);
        let trend = centered_moving_average(values, window);

        let detrended: Vec<f64> = values.iter().zip(&trend).map(|(v, t)| v - t).collect();
        let seasonal = phase_averages(&detrended, DECOMPOSITION_PERIOD);
        let residual = detrended.iter().zip(&seasonal).map(|(d, s)| d - s).collect();

        TrendComponents {
            trend,
            seasonal,
            residual,
        }
    }
}

/// Moving average centered on each index; windows shrink at the edges instead of wrapping
fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + window - half).min(n);
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Average of each phase broadcast back over the series; all zeros with fewer than two cycles
fn phase_averages(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    if n < 2 * period {
        return vec![0.0; n];
    }

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, v) in values.iter().enumerate() {
        sums[i % period] += v;
        counts[i % period] += 1;
    }
    let averages: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    (0..n).map(|i| averages[i % period]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn seasonal_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 0.3 * i as f64 + 15.0 * (2.0 * PI * i as f64 / 24.0).sin() + ((i * 7) % 5) as f64)
            .collect()
    }

    #[test]
    fn components_reconstruct_original() {
        let values = seasonal_series(240);
        let parts = TimeSeriesDecomposer::new().decompose_values(&values);
        assert_eq!(parts.trend.len(), values.len());
        for i in 0..values.len() {
            let rebuilt = parts.trend[i] + parts.seasonal[i] + parts.residual[i];
            assert!((rebuilt - values[i]).abs() < 1e-9, "index {}", i);
        }
    }

    #[test]
    fn short_series_has_no_seasonal_part() {
        let values = seasonal_series(40);
        let parts = TimeSeriesDecomposer::new().decompose_values(&values);
        assert!(parts.seasonal.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn seasonal_part_repeats_with_period() {
        let values = seasonal_series(96);
        let parts = TimeSeriesDecomposer::new().decompose_values(&values);
        for i in 0..(96 - DECOMPOSITION_PERIOD) {
            assert_eq!(parts.seasonal[i], parts.seasonal[i + DECOMPOSITION_PERIOD]);
        }
    }

    #[test]
    fn moving_average_shrinks_at_edges() {
        let avg = centered_moving_average(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(avg, vec![1.0, 1.5, 2.5, 3.5]);
        assert!(TimeSeriesDecomposer::new().decompose_values(&[]).trend.is_empty());
    }
}
