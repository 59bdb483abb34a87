// src/registry.rs

use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{WatchtowerError, WatchtowerResult};
use crate::types::{
    ResourceId, ScalingPolicy, ScalingThreshold, ThresholdCondition, ThresholdDefinition, ThresholdId,
    ThresholdUpdate,
};
use crate::utils::{current_timestamp, new_id};

/// Id-keyed store of scaling thresholds.
///
/// Thresholds are only ever created through validation, and a rejected
/// create or update leaves the registry untouched.
#[derive(Debug, Default)]
pub struct ThresholdRegistry {
    thresholds: HashMap<ThresholdId, ScalingThreshold>,
}

impl ThresholdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a new threshold under a fresh id
    pub fn create(&mut self, definition: ThresholdDefinition) -> WatchtowerResult<ScalingThreshold> {
        validate_identity(&definition.resource_id, &definition.metric)?;
        validate_condition("scale_up", &definition.scale_up)?;
        validate_condition("scale_down", &definition.scale_down)?;
        validate_policy(&definition.policy)?;

        let now = current_timestamp();
        let threshold = ScalingThreshold {
            id: new_id(),
            resource_id: definition.resource_id,
            metric: definition.metric,
            scale_up: definition.scale_up,
            scale_down: definition.scale_down,
            policy: definition.policy,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        info!(
            "Registered threshold {} for {}/{}",
            threshold.id, threshold.resource_id, threshold.metric
        );
        self.thresholds.insert(threshold.id.clone(), threshold.clone());
        Ok(threshold)
    }

    /// Apply a partial update; the merged threshold is validated before it replaces the old one
    pub fn update(&mut self, id: &str, update: ThresholdUpdate) -> WatchtowerResult<ScalingThreshold> {
        let current = self
            .thresholds
            .get(id)
            .ok_or_else(|| WatchtowerError::threshold_not_found(id))?;

        let mut merged = current.clone();
        if let Some(scale_up) = update.scale_up {
            validate_condition("scale_up", &scale_up)?;
            merged.scale_up = scale_up;
        }
        if let Some(scale_down) = update.scale_down {
            validate_condition("scale_down", &scale_down)?;
            merged.scale_down = scale_down;
        }
        if let Some(policy) = update.policy {
            validate_policy(&policy)?;
            merged.policy = policy;
        }
        if let Some(is_active) = update.is_active {
            merged.is_active = is_active;
        }
        merged.updated_at = current_timestamp();

        debug!("Updated threshold {}", id);
        self.thresholds.insert(merged.id.clone(), merged.clone());
        Ok(merged)
    }

    /// Mark a threshold inactive; it stays registered but is never evaluated again
    pub fn deactivate(&mut self, id: &str) -> WatchtowerResult<ScalingThreshold> {
        let threshold = self
            .thresholds
            .get_mut(id)
            .ok_or_else(|| WatchtowerError::threshold_not_found(id))?;
        threshold.is_active = false;
        threshold.updated_at = current_timestamp();
        info!("Deactivated threshold {}", id);
        Ok(threshold.clone())
    }

    pub fn get(&self, id: &str) -> Option<&ScalingThreshold> {
        self.thresholds.get(id)
    }

    pub fn list(&self) -> Vec<ScalingThreshold> {
        let mut thresholds: Vec<ScalingThreshold> = self.thresholds.values().cloned().collect();
        thresholds.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        thresholds
    }

    /// Active thresholds of every resource
    pub fn active(&self) -> Vec<ScalingThreshold> {
        self.thresholds.values().filter(|t| t.is_active).cloned().collect()
    }

    pub fn active_for_resource(&self, resource_id: &ResourceId) -> Vec<ScalingThreshold> {
        self.thresholds
            .values()
            .filter(|t| t.is_active && &t.resource_id == resource_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

fn validate_identity(resource_id: &str, metric: &str) -> WatchtowerResult<()> {
    if resource_id.trim().is_empty() {
        return Err(WatchtowerError::validation("resource_id must not be empty"));
    }
    if metric.trim().is_empty() {
        return Err(WatchtowerError::validation("metric must not be empty"));
    }
    Ok(())
}

fn validate_condition(side: &str, condition: &ThresholdCondition) -> WatchtowerResult<()> {
    if !condition.value.is_finite() {
        return Err(WatchtowerError::validation(format!(
            "{} value must be finite, got {}",
            side, condition.value
        )));
    }
    Ok(())
}

fn validate_policy(policy: &ScalingPolicy) -> WatchtowerResult<()> {
    if policy.max_instances < policy.min_instances {
        return Err(WatchtowerError::validation(format!(
            "max_instances ({}) must be >= min_instances ({})",
            policy.max_instances, policy.min_instances
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies;

    #[test]
    fn create_assigns_id_and_activates() {
        let mut registry = ThresholdRegistry::new();
        let threshold = registry.create(policies::cpu_threshold("web", 80.0, 20.0, 300)).unwrap();
        assert!(!threshold.id.is_empty());
        assert!(threshold.is_active);
        assert_eq!(threshold.created_at, threshold.updated_at);
        assert_eq!(registry.get(&threshold.id), Some(&threshold));
        assert_eq!(registry.active_for_resource(&"web".to_string()).len(), 1);
        assert!(registry.active_for_resource(&"db".to_string()).is_empty());
    }

    #[test]
    fn invalid_definitions_leave_no_state() {
        let mut registry = ThresholdRegistry::new();

        let mut bad_policy = policies::cpu_threshold("web", 80.0, 20.0, 300);
        bad_policy.policy.min_instances = 5;
        bad_policy.policy.max_instances = 2;
        assert!(matches!(registry.create(bad_policy), Err(WatchtowerError::Validation { .. })));

        let mut bad_value = policies::cpu_threshold("web", 80.0, 20.0, 300);
        bad_value.scale_up.value = f64::NAN;
        assert!(registry.create(bad_value).is_err());

        let empty = policies::cpu_threshold("", 80.0, 20.0, 300);
        assert!(registry.create(empty).is_err());

        assert!(registry.is_empty());
    }

    #[test]
    fn update_is_all_or_nothing() {
        let mut registry = ThresholdRegistry::new();
        let threshold = registry.create(policies::cpu_threshold("web", 80.0, 20.0, 300)).unwrap();

        let mut raised = threshold.scale_up.clone();
        raised.value = 90.0;
        let rejected = ThresholdUpdate {
            scale_up: Some(raised.clone()),
            policy: Some(ScalingPolicy {
                min_instances: 4,
                max_instances: 1,
                ..ScalingPolicy::default()
            }),
            ..ThresholdUpdate::default()
        };
        assert!(registry.update(&threshold.id, rejected).is_err());
        assert_eq!(registry.get(&threshold.id).unwrap().scale_up.value, 80.0);

        let accepted = ThresholdUpdate {
            scale_up: Some(raised),
            ..ThresholdUpdate::default()
        };
        let updated = registry.update(&threshold.id, accepted).unwrap();
        assert_eq!(updated.scale_up.value, 90.0);
        assert_eq!(updated.scale_down, threshold.scale_down);
    }

    #[test]
    fn deactivate_keeps_threshold() {
        let mut registry = ThresholdRegistry::new();
        let threshold = registry.create(policies::memory_threshold("db", 85.0, 30.0, 600)).unwrap();
        let deactivated = registry.deactivate(&threshold.id).unwrap();
        assert!(!deactivated.is_active);
        assert_eq!(registry.len(), 1);
        assert!(registry.active().is_empty());
        assert!(matches!(
            registry.deactivate("missing"),
            Err(WatchtowerError::ThresholdNotFound { .. })
        ));
    }
}
