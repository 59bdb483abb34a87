// src/decision.rs

use tracing::{error, info, warn};

use crate::callbacks::{CallbackContext, ScalingExecutor};
use crate::error::{WatchtowerError, WatchtowerResult};
use crate::events::{EventBus, WatchtowerEvent};
use crate::stats;
use crate::types::{
    CapacityAlert, DecisionConfig, ExecutionStep, MetricValue, ScaleDirection, ScalingAction, ScalingDecision,
    ScalingThreshold, StepKind,
};
use crate::utils::{current_timestamp, new_id};

const TREND_WEIGHT: f64 = 0.6;
const STABILITY_WEIGHT: f64 = 0.4;

/// Result of running a decision against the actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Executed,
    Skipped,
}

/// Turns alerts into scaling decisions and runs them against the actuator
#[derive(Debug, Clone)]
pub struct ScalingDecisionEngine {
    config: DecisionConfig,
    events: EventBus,
}

impl ScalingDecisionEngine {
    pub fn new(config: DecisionConfig, events: EventBus) -> Self {
        Self { config, events }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Build a decision for an alert.
    ///
    /// `recent` holds the latest readings of the threshold's metric, oldest first.
    pub fn decide(
        &self,
        alert: &CapacityAlert,
        threshold: &ScalingThreshold,
        recent: &[MetricValue],
        current_capacity: u32,
    ) -> ScalingDecision {
        let policy = &threshold.policy;
        let raw_target = match alert.alert_type {
            ScaleDirection::Up => current_capacity.saturating_add(policy.scale_up_by),
            ScaleDirection::Down => current_capacity.saturating_sub(policy.scale_down_by),
        };
        // Clamping never turns a scale-up into a shrink (or the reverse)
        let clamped = raw_target.clamp(policy.min_instances, policy.max_instances);
        let target_capacity = match alert.alert_type {
            ScaleDirection::Up => clamped.max(current_capacity),
            ScaleDirection::Down => clamped.min(current_capacity),
        };

        let action = if target_capacity == current_capacity {
            ScalingAction::NoAction
        } else if target_capacity > current_capacity {
            ScalingAction::ScaleUp
        } else {
            ScalingAction::ScaleDown
        };

        let window_start = recent.len().saturating_sub(self.config.recent_window);
        let window = &recent[window_start..];
        let confidence =
            TREND_WEIGHT * trend_score(window, alert.alert_type) + STABILITY_WEIGHT * stability_score(window);

        let skip_reason = if action == ScalingAction::NoAction {
            Some(format!(
                "{} at {} instances, already at or past its {} bound of {}",
                threshold.resource_id,
                current_capacity,
                if alert.alert_type == ScaleDirection::Up { "upper" } else { "lower" },
                if alert.alert_type == ScaleDirection::Up {
                    policy.max_instances
                } else {
                    policy.min_instances
                }
            ))
        } else if confidence < self.config.confidence_gate {
            Some(format!(
                "confidence {:.2} below gate {:.2}",
                confidence, self.config.confidence_gate
            ))
        } else {
            None
        };

        ScalingDecision {
            id: new_id(),
            resource_id: threshold.resource_id.clone(),
            threshold_id: threshold.id.clone(),
            alert_id: alert.id.clone(),
            current_capacity,
            target_capacity,
            action,
            confidence,
            should_execute: skip_reason.is_none(),
            skip_reason,
            reason: format!(
                "{} ({} {} {}, observed {:.2})",
                alert.message,
                alert.condition.metric,
                alert.condition.operator.symbol(),
                alert.condition.threshold_value,
                alert.condition.current_value
            ),
            execution_plan: execution_plan(current_capacity, target_capacity),
            rollback_plan: rollback_plan(current_capacity),
            decided_at: current_timestamp(),
        }
    }

    /// Run a decision.
    ///
    /// Skipped decisions never reach the actuator. A failed execution is
    /// rolled back exactly once and never retried.
    pub async fn execute(
        &self,
        decision: &ScalingDecision,
        executor: &dyn ScalingExecutor,
        context: &CallbackContext,
    ) -> WatchtowerResult<ExecutionOutcome> {
        self.events
            .emit(WatchtowerEvent::ScalingDecisionMade {
                decision_id: decision.id.clone(),
                resource_id: decision.resource_id.clone(),
                action: decision.action,
                confidence: decision.confidence,
                should_execute: decision.should_execute,
            })
            .await;

        if !decision.should_execute {
            let reason = decision.skip_reason.clone().unwrap_or_default();
            info!("Scaling of {} skipped: {}", decision.resource_id, reason);
            self.events
                .emit(WatchtowerEvent::ScalingSkipped {
                    decision_id: decision.id.clone(),
                    resource_id: decision.resource_id.clone(),
                    reason,
                })
                .await;
            return Ok(ExecutionOutcome::Skipped);
        }

        let scaling_error = match executor.execute(decision, context).await {
            Ok(()) => {
                info!(
                    "Scaled {} from {} to {}",
                    decision.resource_id, decision.current_capacity, decision.target_capacity
                );
                self.events
                    .emit(WatchtowerEvent::ScalingExecuted {
                        decision_id: decision.id.clone(),
                        resource_id: decision.resource_id.clone(),
                        from_capacity: decision.current_capacity,
                        to_capacity: decision.target_capacity,
                    })
                    .await;
                return Ok(ExecutionOutcome::Executed);
            }
            Err(e) => e.to_string(),
        };

        error!("Scaling of {} failed: {}", decision.resource_id, scaling_error);
        self.events
            .emit(WatchtowerEvent::ScalingFailed {
                decision_id: decision.id.clone(),
                resource_id: decision.resource_id.clone(),
                error: scaling_error.clone(),
            })
            .await;

        match executor.rollback(decision, context).await {
            Ok(()) => {
                warn!(
                    "Rolled {} back to {} instances",
                    decision.resource_id, decision.current_capacity
                );
                Err(WatchtowerError::scaling_failed(decision.resource_id.clone(), scaling_error))
            }
            Err(rollback_error) => {
                let rollback_error = rollback_error.to_string();
                error!("Rollback of {} failed: {}", decision.resource_id, rollback_error);
                self.events
                    .emit(WatchtowerEvent::RollbackFailed {
                        decision_id: decision.id.clone(),
                        resource_id: decision.resource_id.clone(),
                        error: rollback_error.clone(),
                    })
                    .await;
                Err(WatchtowerError::RollbackFailed {
                    resource_id: decision.resource_id.clone(),
                    scaling_error,
                    rollback_error,
                })
            }
        }
    }
}

/// Share of consecutive steps moving in the alert's direction
fn trend_score(values: &[MetricValue], direction: ScaleDirection) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let moving = values
        .windows(2)
        .filter(|pair| match direction {
            ScaleDirection::Up => pair[1] > pair[0],
            ScaleDirection::Down => pair[1] < pair[0],
        })
        .count();
    moving as f64 / (values.len() - 1) as f64
}

/// `clamp(1 - cv, 0.1, 1.0)`; a zero mean counts as fully unstable
fn stability_score(values: &[MetricValue]) -> f64 {
    let cv = if values.is_empty() {
        1.0
    } else {
        stats::coefficient_of_variation(values).unwrap_or(1.0)
    };
    (1.0 - cv).clamp(0.1, 1.0)
}

fn execution_plan(from: u32, to: u32) -> Vec<ExecutionStep> {
    vec![
        ExecutionStep {
            order: 1,
            name: "validate prerequisites".to_string(),
            kind: StepKind::ValidatePrerequisites,
            estimated_duration_secs: 30,
            validation_checks: vec!["resource_healthy".to_string(), "quota_available".to_string()],
        },
        ExecutionStep {
            order: 2,
            name: format!("scale from {} to {}", from, to),
            kind: StepKind::Scale { from, to },
            estimated_duration_secs: 120,
            validation_checks: vec!["scaling_accepted".to_string()],
        },
        ExecutionStep {
            order: 3,
            name: "verify capacity".to_string(),
            kind: StepKind::VerifyCapacity { expected: to },
            estimated_duration_secs: 60,
            validation_checks: vec!["capacity_matches_target".to_string(), "health_checks_passing".to_string()],
        },
    ]
}

fn rollback_plan(previous: u32) -> Vec<ExecutionStep> {
    vec![ExecutionStep {
        order: 1,
        name: format!("restore capacity to {}", previous),
        kind: StepKind::RestoreCapacity { to: previous },
        estimated_duration_secs: 120,
        validation_checks: vec!["capacity_matches_previous".to_string()],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::MockScalingExecutor;
    use crate::events::EventLog;
    use crate::policies;
    use crate::types::{AlertCondition, AlertSeverity, AlertStatus, ComparisonOperator, ScalingPolicy};
    use std::sync::Arc;

    fn threshold(policy: ScalingPolicy) -> ScalingThreshold {
        let def = policies::cpu_threshold("web", 80.0, 20.0, 300);
        ScalingThreshold {
            id: "t-1".to_string(),
            resource_id: def.resource_id,
            metric: def.metric,
            scale_up: def.scale_up,
            scale_down: def.scale_down,
            policy,
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn alert(direction: ScaleDirection) -> CapacityAlert {
        CapacityAlert {
            id: "a-1".to_string(),
            threshold_id: "t-1".to_string(),
            resource_id: "web".to_string(),
            alert_type: direction,
            severity: AlertSeverity::Medium,
            condition: AlertCondition {
                metric: "cpu.usage".to_string(),
                operator: ComparisonOperator::GreaterThan,
                threshold_value: 80.0,
                current_value: 90.0,
                sustained_secs: 300,
            },
            message: "cpu.usage high".to_string(),
            status: AlertStatus::Active,
            escalation_level: 0,
            confidence: 1.0,
            triggered_at: 0,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
        }
    }

    fn rising() -> Vec<f64> {
        (0..10).map(|i| 85.0 + i as f64 * 0.5).collect()
    }

    fn engine(log: &Arc<EventLog>) -> ScalingDecisionEngine {
        ScalingDecisionEngine::new(DecisionConfig::default(), EventBus::new(vec![log.clone()]))
    }

    #[test]
    fn steady_rise_is_confident() {
        let log = Arc::new(EventLog::default());
        let policy = ScalingPolicy {
            min_instances: 2,
            max_instances: 10,
            scale_up_by: 2,
            scale_down_by: 1,
        };
        let decision = engine(&log).decide(&alert(ScaleDirection::Up), &threshold(policy), &rising(), 4);
        assert_eq!(decision.action, ScalingAction::ScaleUp);
        assert_eq!(decision.target_capacity, 6);
        assert!(decision.confidence > 0.9, "confidence {}", decision.confidence);
        assert!(decision.should_execute);
        assert_eq!(decision.execution_plan.len(), 3);
        assert_eq!(decision.execution_plan[1].kind, StepKind::Scale { from: 4, to: 6 });
        assert_eq!(decision.rollback_plan[0].kind, StepKind::RestoreCapacity { to: 4 });
    }

    #[test]
    fn target_is_clamped_and_no_op_is_skipped() {
        let log = Arc::new(EventLog::default());
        let policy = ScalingPolicy {
            min_instances: 1,
            max_instances: 5,
            scale_up_by: 3,
            scale_down_by: 3,
        };
        let up = engine(&log).decide(&alert(ScaleDirection::Up), &threshold(policy.clone()), &rising(), 4);
        assert_eq!(up.target_capacity, 5);

        let at_max = engine(&log).decide(&alert(ScaleDirection::Up), &threshold(policy.clone()), &rising(), 5);
        assert_eq!(at_max.action, ScalingAction::NoAction);
        assert!(!at_max.should_execute);

        let down = engine(&log).decide(&alert(ScaleDirection::Down), &threshold(policy), &[], 2);
        assert_eq!(down.target_capacity, 1);
        assert_eq!(down.action, ScalingAction::ScaleDown);
    }

    #[test]
    fn out_of_bounds_capacity_never_reverses_direction() {
        let log = Arc::new(EventLog::default());
        let policy = ScalingPolicy {
            min_instances: 2,
            max_instances: 5,
            scale_up_by: 1,
            scale_down_by: 1,
        };

        // Already above max: a scale-up alert must not shrink to 5
        let up = engine(&log).decide(&alert(ScaleDirection::Up), &threshold(policy.clone()), &rising(), 8);
        assert_eq!(up.action, ScalingAction::NoAction);
        assert_eq!(up.target_capacity, 8);
        assert!(!up.should_execute);
        assert!(up.skip_reason.unwrap().contains("upper bound of 5"));

        // Below min: a scale-down alert must not grow to 2
        let down = engine(&log).decide(&alert(ScaleDirection::Down), &threshold(policy.clone()), &[], 1);
        assert_eq!(down.action, ScalingAction::NoAction);
        assert_eq!(down.target_capacity, 1);

        // Below min with a scale-up alert still grows into range
        let grow = engine(&log).decide(&alert(ScaleDirection::Up), &threshold(policy), &rising(), 0);
        assert_eq!(grow.action, ScalingAction::ScaleUp);
        assert_eq!(grow.target_capacity, 2);
    }

    #[test]
    fn flat_or_noisy_history_falls_below_gate() {
        let log = Arc::new(EventLog::default());
        let flat = engine(&log).decide(&alert(ScaleDirection::Up), &threshold(ScalingPolicy::default()), &[90.0; 10], 1);
        // No rising steps: 0.6 * 0 + 0.4 * 1
        assert!((flat.confidence - 0.4).abs() < 1e-9);
        assert!(!flat.should_execute);
        assert!(flat.skip_reason.unwrap().contains("below gate"));
    }

    #[test]
    fn scores() {
        assert_eq!(trend_score(&[1.0, 2.0, 3.0], ScaleDirection::Up), 1.0);
        assert_eq!(trend_score(&[3.0, 2.0, 2.0], ScaleDirection::Down), 0.5);
        assert_eq!(trend_score(&[1.0], ScaleDirection::Up), 0.0);
        assert_eq!(stability_score(&[0.0, 0.0]), 0.1);
        assert_eq!(stability_score(&[5.0; 4]), 1.0);
    }

    #[tokio::test]
    async fn skipped_decision_never_calls_actuator() {
        let log = Arc::new(EventLog::default());
        let engine = engine(&log);
        let decision = engine.decide(&alert(ScaleDirection::Up), &threshold(ScalingPolicy::default()), &[90.0; 10], 1);

        let mut executor = MockScalingExecutor::new();
        executor.expect_execute().never();
        executor.expect_rollback().never();

        let outcome = engine.execute(&decision, &executor, &CallbackContext::now()).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Skipped);
        assert_eq!(log.names(), vec!["scalingDecisionMade", "scalingSkipped"]);
    }

    #[tokio::test]
    async fn successful_execution() {
        let log = Arc::new(EventLog::default());
        let engine = engine(&log);
        let decision = engine.decide(&alert(ScaleDirection::Up), &threshold(ScalingPolicy::default()), &rising(), 1);

        let mut executor = MockScalingExecutor::new();
        executor.expect_execute().times(1).returning(|_, _| Ok(()));
        executor.expect_rollback().never();

        let outcome = engine.execute(&decision, &executor, &CallbackContext::now()).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Executed);
        assert_eq!(log.names(), vec!["scalingDecisionMade", "scalingExecuted"]);
    }

    #[tokio::test]
    async fn failure_rolls_back_once() {
        let log = Arc::new(EventLog::default());
        let engine = engine(&log);
        let decision = engine.decide(&alert(ScaleDirection::Up), &threshold(ScalingPolicy::default()), &rising(), 1);

        let mut executor = MockScalingExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|_, _| Err(WatchtowerError::callback_failed("execute", "api timeout")));
        executor.expect_rollback().times(1).returning(|_, _| Ok(()));

        let err = engine.execute(&decision, &executor, &CallbackContext::now()).await.unwrap_err();
        assert!(matches!(err, WatchtowerError::ScalingFailed { .. }));
        assert_eq!(log.names(), vec!["scalingDecisionMade", "scalingFailed"]);
    }

    #[tokio::test]
    async fn failed_rollback_is_reported() {
        let log = Arc::new(EventLog::default());
        let engine = engine(&log);
        let decision = engine.decide(&alert(ScaleDirection::Up), &threshold(ScalingPolicy::default()), &rising(), 1);

        let mut executor = MockScalingExecutor::new();
        executor
            .expect_execute()
            .times(1)
            .returning(|_, _| Err(WatchtowerError::callback_failed("execute", "api timeout")));
        executor
            .expect_rollback()
            .times(1)
            .returning(|_, _| Err(WatchtowerError::callback_failed("rollback", "api down")));

        let err = engine.execute(&decision, &executor, &CallbackContext::now()).await.unwrap_err();
        match err {
            WatchtowerError::RollbackFailed {
                resource_id,
                scaling_error,
                rollback_error,
            } => {
                assert_eq!(resource_id, "web");
                assert!(scaling_error.contains("api timeout"));
                assert!(rollback_error.contains("api down"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(
            log.names(),
            vec!["scalingDecisionMade", "scalingFailed", "rollbackFailed"]
        );
    }
}
