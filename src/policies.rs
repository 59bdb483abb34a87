//! Convenience builders for common threshold definitions

use crate::types::{
    metric_names, ComparisonOperator, ScalingPolicy, ThresholdCondition, ThresholdDefinition,
};

/// Scale up above `scale_up_value`, down below `scale_down_value`, both sustained for `duration_secs`.
///
/// A `cooldown_secs` of 0 defers to the engine-wide alert cooldown.
pub fn metric_threshold(
    resource_id: &str,
    metric: &str,
    scale_up_value: f64,
    scale_down_value: f64,
    duration_secs: u64,
    cooldown_secs: u64,
) -> ThresholdDefinition {
    ThresholdDefinition {
        resource_id: resource_id.to_string(),
        metric: metric.to_string(),
        scale_up: ThresholdCondition {
            value: scale_up_value,
            operator: ComparisonOperator::GreaterThan,
            duration_secs,
            cooldown_secs,
        },
        scale_down: ThresholdCondition {
            value: scale_down_value,
            operator: ComparisonOperator::LessThan,
            duration_secs,
            cooldown_secs,
        },
        policy: ScalingPolicy::default(),
    }
}

/// Create a simple CPU-based threshold
pub fn cpu_threshold(
    resource_id: &str,
    scale_up_percent: f64,
    scale_down_percent: f64,
    duration_secs: u64,
) -> ThresholdDefinition {
    metric_threshold(
        resource_id,
        metric_names::CPU_USAGE,
        scale_up_percent,
        scale_down_percent,
        duration_secs,
        0,
    )
}

/// Create a memory-based threshold
pub fn memory_threshold(
    resource_id: &str,
    scale_up_percent: f64,
    scale_down_percent: f64,
    duration_secs: u64,
) -> ThresholdDefinition {
    metric_threshold(
        resource_id,
        metric_names::MEMORY_USAGE,
        scale_up_percent,
        scale_down_percent,
        duration_secs,
        0,
    )
}

/// Create a threshold on inbound network traffic
pub fn network_in_threshold(
    resource_id: &str,
    scale_up_bytes: f64,
    scale_down_bytes: f64,
    duration_secs: u64,
) -> ThresholdDefinition {
    metric_threshold(
        resource_id,
        metric_names::NETWORK_IN,
        scale_up_bytes,
        scale_down_bytes,
        duration_secs,
        0,
    )
}

/// Replace the capacity bounds and step sizes of a definition
pub fn with_policy(
    mut definition: ThresholdDefinition,
    min_instances: u32,
    max_instances: u32,
    step: u32,
) -> ThresholdDefinition {
    definition.policy = ScalingPolicy {
        min_instances,
        max_instances,
        scale_up_by: step,
        scale_down_by: step,
    };
    definition
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_preset_shape() {
        let def = cpu_threshold("web", 80.0, 20.0, 300);
        assert_eq!(def.metric, "cpu.usage");
        assert_eq!(def.scale_up.operator, ComparisonOperator::GreaterThan);
        assert_eq!(def.scale_down.operator, ComparisonOperator::LessThan);
        assert_eq!(def.scale_up.duration_secs, 300);
        assert_eq!(def.scale_up.cooldown_secs, 0);
        assert_eq!(def.policy, ScalingPolicy::default());
    }

    #[test]
    fn policy_override() {
        let def = with_policy(memory_threshold("db", 85.0, 30.0, 60), 2, 8, 2);
        assert_eq!(def.metric, "memory.usage");
        assert_eq!(def.policy.min_instances, 2);
        assert_eq!(def.policy.max_instances, 8);
        assert_eq!(def.policy.scale_down_by, 2);
        assert_eq!(network_in_threshold("lb", 1e9, 1e6, 120).metric, "network.in");
    }
}
