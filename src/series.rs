//! Single-metric time series extracted from [`ResourceMetrics`] samples

use serde::{Deserialize, Serialize};

use crate::types::{MetricValue, ResourceId, ResourceMetrics, Timestamp};

/// One reading of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: Timestamp,
    pub value: MetricValue,
}

/// Time-ordered readings of a single metric of a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub resource_id: ResourceId,
    pub metric: String,
    pub points: Vec<MetricPoint>,
}

impl TimeSeries {
    pub fn new(resource_id: &str, metric: &str, mut points: Vec<MetricPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            resource_id: resource_id.to_string(),
            metric: metric.to_string(),
            points,
        }
    }

    /// Build a series from evenly spaced values, starting at `start` with `step_secs` between points
    pub fn from_values(resource_id: &str, metric: &str, start: Timestamp, step_secs: u64, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| MetricPoint {
                timestamp: start + i as u64 * step_secs,
                value,
            })
            .collect();
        Self::new(resource_id, metric, points)
    }

    /// Extract `metric` for `resource_id` from raw samples, skipping samples without it
    pub fn from_metrics(resource_id: &str, metric: &str, samples: &[ResourceMetrics]) -> Self {
        let points = samples
            .iter()
            .filter(|s| s.resource_id == resource_id)
            .filter_map(|s| {
                s.value(metric).map(|value| MetricPoint {
                    timestamp: s.timestamp,
                    value,
                })
            })
            .collect();
        Self::new(resource_id, metric, points)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::metrics_at;

    #[test]
    fn extracts_and_orders_one_metric() {
        let samples = vec![
            metrics_at("web", "svc", 30, vec![("cpu.usage", 3.0)]),
            metrics_at("web", "svc", 10, vec![("cpu.usage", 1.0)]),
            metrics_at("db", "svc", 20, vec![("cpu.usage", 9.0)]),
            metrics_at("web", "svc", 20, vec![("memory.usage", 5.0)]),
        ];
        let series = TimeSeries::from_metrics("web", "cpu.usage", &samples);
        assert_eq!(series.values(), vec![1.0, 3.0]);
        assert_eq!(series.points[0].timestamp, 10);
    }

    #[test]
    fn evenly_spaced_values() {
        let series = TimeSeries::from_values("web", "cpu.usage", 100, 60, &[1.0, 2.0, 3.0]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.points[2].timestamp, 220);
        assert!(!series.is_empty());
    }
}
