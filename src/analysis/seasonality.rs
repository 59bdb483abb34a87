//! Seasonal pattern detection over hourly, weekly and monthly candidate periods

use serde::{Deserialize, Serialize};

use crate::series::TimeSeries;
use crate::stats;

/// Candidate periods in samples: a day, a week and a month of hourly data
pub const CANDIDATE_PERIODS: [usize; 3] = [24, 168, 720];

/// A repeating pattern found in a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPattern {
    /// Period in samples
    pub period: usize,
    /// `std_dev / mean` of the phase-averaged values
    pub strength: f64,
    /// 0.8 once two full cycles were observed, 0.5 otherwise
    pub confidence: f64,
    /// Phases whose average sits more than one std-dev above the mean
    pub peaks: Vec<usize>,
    /// Phases whose average sits more than one std-dev below the mean
    pub troughs: Vec<usize>,
    /// Phase-averaged values, one per phase
    pub seasonal_values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SeasonalityDetector {
    /// Minimum strength for a pattern to be reported
    threshold: f64,
}

impl SeasonalityDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn detect(&self, series: &TimeSeries) -> Option<SeasonalPattern> {
        self.detect_values(&series.values())
    }

    pub fn detect_values(&self, values: &[f64]) -> Option<SeasonalPattern> {
        let mut best: Option<SeasonalPattern> = None;

        // Ascending scan, so equal strengths keep the shorter period
        for &period in CANDIDATE_PERIODS.iter() {
            if values.len() < 2 * period {
                continue;
            }
            let candidate = evaluate_period(values, period);
            let better = best
                .as_ref()
                .map_or(true, |current| candidate.strength > current.strength);
            if better {
                best = Some(candidate);
            }
        }

        best.filter(|pattern| pattern.strength > self.threshold)
    }
}

fn evaluate_period(values: &[f64], period: usize) -> SeasonalPattern {
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, v) in values.iter().enumerate() {
        sums[i % period] += v;
        counts[i % period] += 1;
    }
    let seasonal_values: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    let mean = stats::mean(&seasonal_values);
    let std_dev = stats::std_dev(&seasonal_values);
    let strength = if mean != 0.0 { std_dev / mean.abs() } else { 0.0 };

    let cycles = values.len() / period;
    let confidence = if cycles >= 2 { 0.8 } else { 0.5 };

    let peaks = seasonal_values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v > mean + std_dev)
        .map(|(i, _)| i)
        .collect();
    let troughs = seasonal_values
        .iter()
        .enumerate()
        .filter(|(_, &v)| v < mean - std_dev)
        .map(|(i, _)| i)
        .collect();

    SeasonalPattern {
        period,
        strength,
        confidence,
        peaks,
        troughs,
        seasonal_values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(n: usize, period: f64, amplitude: f64, mean: f64) -> Vec<f64> {
        (0..n)
            .map(|i| mean + amplitude * (2.0 * PI * i as f64 / period).sin())
            .collect()
    }

    #[test]
    fn finds_daily_sine() {
        let values = sine(200, 24.0, 20.0, 50.0);
        let pattern = SeasonalityDetector::new(0.1).detect_values(&values).unwrap();
        assert_eq!(pattern.period, 24);
        // A pure sine's phase averages have std-dev amplitude / sqrt(2)
        let expected = 20.0 / 2f64.sqrt() / 50.0;
        assert!((pattern.strength - expected).abs() < 0.01, "strength {}", pattern.strength);
        assert_eq!(pattern.confidence, 0.8);
        assert!(pattern.peaks.contains(&6));
        assert!(pattern.troughs.contains(&18));
    }

    #[test]
    fn flat_series_has_no_pattern() {
        assert!(SeasonalityDetector::new(0.1).detect_values(&[10.0; 400]).is_none());
    }

    #[test]
    fn too_short_for_any_candidate() {
        let values = sine(47, 24.0, 20.0, 50.0);
        assert!(SeasonalityDetector::new(0.0).detect_values(&values).is_none());
    }

    #[test]
    fn weak_pattern_below_threshold() {
        let values = sine(200, 24.0, 2.0, 50.0);
        assert!(SeasonalityDetector::new(0.1).detect_values(&values).is_none());
        assert!(SeasonalityDetector::new(0.01).detect_values(&values).is_some());
    }

    #[test]
    fn weekly_pattern_beats_daily_when_stronger() {
        let values = sine(400, 168.0, 30.0, 60.0);
        let pattern = SeasonalityDetector::new(0.1).detect_values(&values).unwrap();
        assert_eq!(pattern.period, 168);
    }
}
