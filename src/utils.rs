//! Utility functions for common operations

use crate::types::{MetricValue, ResourceMetrics, Timestamp};
use std::collections::HashMap;

/// Create ResourceMetrics with a single reading
pub fn single_metric(
    resource_id: &str,
    resource_type: &str,
    metric_name: &str,
    value: MetricValue,
) -> ResourceMetrics {
    metrics_at(resource_id, resource_type, current_timestamp(), vec![(metric_name, value)])
}

/// Create ResourceMetrics with multiple readings
pub fn multi_metrics(
    resource_id: &str,
    resource_type: &str,
    metrics: Vec<(&str, MetricValue)>,
) -> ResourceMetrics {
    metrics_at(resource_id, resource_type, current_timestamp(), metrics)
}

/// Create ResourceMetrics stamped with an explicit time
pub fn metrics_at(
    resource_id: &str,
    resource_type: &str,
    timestamp: Timestamp,
    metrics: Vec<(&str, MetricValue)>,
) -> ResourceMetrics {
    let metrics_map: HashMap<String, MetricValue> = metrics
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

    ResourceMetrics {
        resource_id: resource_id.to_string(),
        resource_type: resource_type.to_string(),
        timestamp,
        metrics: metrics_map,
    }
}

/// Get current Unix timestamp
pub fn current_timestamp() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Fresh random identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_metrics() {
        let rm = single_metric("id", "type", "cpu.usage", 99.0);
        assert_eq!(rm.value("cpu.usage"), Some(99.0));
        let rm2 = multi_metrics("id2", "type2", vec![("cpu.usage", 88.0), ("memory.usage", 77.0)]);
        assert_eq!(rm2.value("memory.usage"), Some(77.0));
        assert_eq!(rm2.value("disk.usage"), None);
        let rm3 = metrics_at("id3", "type3", 42, vec![]);
        assert_eq!(rm3.timestamp, 42);
        assert!(current_timestamp() > 0);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }
}
