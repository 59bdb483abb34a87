//! Sliding-window change point detection on mean and variance

use serde::{Deserialize, Serialize};

use crate::series::TimeSeries;
use crate::stats;
use crate::types::Timestamp;

/// At most this many change points are reported
pub const MAX_CHANGE_POINTS: usize = 10;

/// Smallest window compared on each side of the cursor
const MIN_WINDOW: usize = 5;

/// Floor for the pooled std-dev so constant windows do not divide by zero
const MIN_POOLED_STD_DEV: f64 = 1e-6;

/// Percent change beyond which a mean shift counts as an increase or decrease
const DIRECTIONAL_CHANGE_PERCENT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Increase,
    Decrease,
    LevelShift,
    VarianceChange,
}

/// A position where mean or variance shifts against the preceding window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePoint {
    /// Index of the first sample after the change
    pub index: usize,
    pub timestamp: Option<Timestamp>,
    pub change_type: ChangeType,
    pub significance: f64,
    pub mean_before: f64,
    pub mean_after: f64,
    pub variance_before: f64,
    pub variance_after: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone)]
pub struct ChangePointDetector {
    /// Minimum significance for a change point to be reported
    sensitivity: f64,
}

impl ChangePointDetector {
    pub fn new(sensitivity: f64) -> Self {
        Self { sensitivity }
    }

    pub fn detect(&self, series: &TimeSeries) -> Vec<ChangePoint> {
        let mut points = self.detect_values(&series.values());
        for point in &mut points {
            point.timestamp = series.points.get(point.index).map(|p| p.timestamp);
        }
        points
    }

    pub fn detect_values(&self, values: &[f64]) -> Vec<ChangePoint> {
        let n = values.len();
        let window = MIN_WINDOW.max(n / 20);
        if n < 2 * window {
            return Vec::new();
        }

        let mut points = Vec::new();
        for i in window..=(n - window) {
            let before = &values[i - window..i];
            let after = &values[i..i + window];

            let mean_before = stats::mean(before);
            let mean_after = stats::mean(after);
            let variance_before = stats::variance(before);
            let variance_after = stats::variance(after);

            let mean_delta = mean_after - mean_before;
            let pooled = ((variance_before + variance_after) / 2.0).sqrt().max(MIN_POOLED_STD_DEV);
            let significance = mean_delta.abs() / pooled;
            if significance <= self.sensitivity {
                continue;
            }

            let percent_change = percent_change(mean_before, mean_after);
            let variance_delta = (variance_after - variance_before).abs();
            let change_type = if variance_delta > mean_delta.abs() {
                ChangeType::VarianceChange
            } else if percent_change.abs() > DIRECTIONAL_CHANGE_PERCENT {
                if mean_delta > 0.0 {
                    ChangeType::Increase
                } else {
                    ChangeType::Decrease
                }
            } else {
                ChangeType::LevelShift
            };

            points.push(ChangePoint {
                index: i,
                timestamp: None,
                change_type,
                significance,
                mean_before,
                mean_after,
                variance_before,
                variance_after,
                percent_change,
            });
        }

        // Most confident breaks first, not the earliest ones
        points.sort_by(|a, b| b.significance.total_cmp(&a.significance));
        points.truncate(MAX_CHANGE_POINTS);
        points
    }
}

fn percent_change(before: f64, after: f64) -> f64 {
    if before.abs() < f64::EPSILON {
        return match after.partial_cmp(&before) {
            Some(std::cmp::Ordering::Greater) => 100.0,
            Some(std::cmp::Ordering::Less) => -100.0,
            _ => 0.0,
        };
    }
    (after - before) / before.abs() * 100.0
}
