// src/alerts.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{WatchtowerError, WatchtowerResult};
use crate::types::{
    AlertCondition, AlertId, AlertSeverity, AlertStatus, CapacityAlert, MetricValue, ScalingThreshold,
    ThresholdEvaluation,
};
use crate::utils::{current_timestamp, new_id};

/// Resolved and suppressed alerts kept around for late lookups
pub const DEFAULT_TERMINAL_RETENTION: usize = 256;

#[derive(Debug, Default)]
struct AlertTable {
    by_id: HashMap<AlertId, CapacityAlert>,
    /// Terminal alerts, oldest first; evicted past the retention limit
    retired: VecDeque<AlertId>,
}

impl AlertTable {
    fn values(&self) -> impl Iterator<Item = &CapacityAlert> {
        self.by_id.values()
    }

    fn retire(&mut self, alert_id: &str, retention: usize) {
        self.retired.push_back(alert_id.to_string());
        while self.retired.len() > retention {
            if let Some(evicted) = self.retired.pop_front() {
                self.by_id.remove(&evicted);
                debug!("Evicted alert {}", evicted);
            }
        }
    }
}

/// Shared store of capacity alerts.
///
/// Cloning is cheap; every clone sees the same alerts, which is how the
/// escalation timers re-read an alert when they fire. Only the most recent
/// terminal alerts are retained.
#[derive(Debug, Clone)]
pub struct AlertStore {
    alerts: Arc<RwLock<AlertTable>>,
    default_cooldown_secs: u64,
    max_concurrent_alerts: usize,
    terminal_retention: usize,
}

impl AlertStore {
    pub fn new(default_cooldown_secs: u64, max_concurrent_alerts: usize) -> Self {
        Self {
            alerts: Arc::new(RwLock::new(AlertTable::default())),
            default_cooldown_secs,
            max_concurrent_alerts,
            terminal_retention: DEFAULT_TERMINAL_RETENTION,
        }
    }

    /// How many resolved or suppressed alerts stay queryable
    pub fn with_terminal_retention(mut self, retention: usize) -> Self {
        self.terminal_retention = retention;
        self
    }

    /// Open an alert for a triggered evaluation.
    ///
    /// Returns `None` when an active alert for the same resource and metric is
    /// still inside its cooldown, or when the active-alert cap is reached.
    pub async fn open(&self, evaluation: &ThresholdEvaluation, threshold: &ScalingThreshold) -> Option<CapacityAlert> {
        let direction = evaluation.direction.filter(|_| evaluation.is_triggered)?;
        let condition = threshold.condition(direction);
        let cooldown = if condition.cooldown_secs > 0 {
            condition.cooldown_secs
        } else {
            self.default_cooldown_secs
        };
        let now = evaluation.evaluated_at;

        let mut alerts = self.alerts.write().await;

        let cooling = alerts.values().any(|a| {
            a.status == AlertStatus::Active
                && a.resource_id == evaluation.resource_id
                && a.condition.metric == evaluation.metric
                && now.saturating_sub(a.triggered_at) < cooldown
        });
        if cooling {
            debug!(
                "Alert for {}/{} suppressed by {}s cooldown",
                evaluation.resource_id, evaluation.metric, cooldown
            );
            return None;
        }

        let active = alerts.values().filter(|a| a.status == AlertStatus::Active).count();
        if active >= self.max_concurrent_alerts {
            warn!(
                "Not opening alert for {}/{}: {} alerts already active",
                evaluation.resource_id, evaluation.metric, active
            );
            return None;
        }

        let severity = AlertSeverity::from_deviation(deviation(evaluation.current_value, condition.value));
        let alert = CapacityAlert {
            id: new_id(),
            threshold_id: threshold.id.clone(),
            resource_id: evaluation.resource_id.clone(),
            alert_type: direction,
            severity,
            condition: AlertCondition {
                metric: evaluation.metric.clone(),
                operator: condition.operator,
                threshold_value: condition.value,
                current_value: evaluation.current_value,
                sustained_secs: evaluation.duration_secs,
            },
            message: format!(
                "{} is {:.2} ({} {}) for {}s on {}",
                evaluation.metric,
                evaluation.current_value,
                condition.operator.symbol(),
                condition.value,
                evaluation.duration_secs,
                evaluation.resource_id
            ),
            status: AlertStatus::Active,
            escalation_level: 0,
            confidence: evaluation.confidence,
            triggered_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
        };

        info!("Alert {} opened: {} [{:?}]", alert.id, alert.message, alert.severity);
        alerts.by_id.insert(alert.id.clone(), alert.clone());
        Some(alert)
    }

    pub async fn acknowledge(&self, alert_id: &str, by: &str) -> WatchtowerResult<CapacityAlert> {
        self.transition(alert_id, AlertStatus::Acknowledged, |alert, now| {
            alert.acknowledged_at = Some(now);
            alert.acknowledged_by = Some(by.to_string());
        })
        .await
    }

    pub async fn resolve(&self, alert_id: &str) -> WatchtowerResult<CapacityAlert> {
        self.transition(alert_id, AlertStatus::Resolved, |alert, now| {
            alert.resolved_at = Some(now);
        })
        .await
    }

    pub async fn suppress(&self, alert_id: &str) -> WatchtowerResult<CapacityAlert> {
        self.transition(alert_id, AlertStatus::Suppressed, |alert, now| {
            alert.resolved_at = Some(now);
        })
        .await
    }

    /// Bump the escalation level of a still-active alert.
    ///
    /// Returns `None` (and changes nothing) once the alert has left ACTIVE.
    pub async fn escalate(&self, alert_id: &str, raise_severity: bool) -> Option<CapacityAlert> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts.by_id.get_mut(alert_id)?;
        if alert.status != AlertStatus::Active {
            return None;
        }
        alert.escalation_level += 1;
        if raise_severity {
            alert.severity = alert.severity.raised();
        }
        Some(alert.clone())
    }

    pub async fn get(&self, alert_id: &str) -> Option<CapacityAlert> {
        self.alerts.read().await.by_id.get(alert_id).cloned()
    }

    /// Active alerts, oldest first
    pub async fn list_active(&self) -> Vec<CapacityAlert> {
        let mut active: Vec<CapacityAlert> = self
            .alerts
            .read()
            .await
            .values()
            .filter(|a| a.status == AlertStatus::Active)
            .cloned()
            .collect();
        active.sort_by_key(|a| a.triggered_at);
        active
    }

    pub async fn active_count(&self) -> usize {
        self.alerts
            .read()
            .await
            .values()
            .filter(|a| a.status == AlertStatus::Active)
            .count()
    }

    /// Ids of every alert a threshold has raised
    pub async fn ids_for_threshold(&self, threshold_id: &str) -> Vec<AlertId> {
        self.alerts
            .read()
            .await
            .values()
            .filter(|a| a.threshold_id == threshold_id)
            .map(|a| a.id.clone())
            .collect()
    }

    async fn transition<F>(&self, alert_id: &str, to: AlertStatus, apply: F) -> WatchtowerResult<CapacityAlert>
    where
        F: FnOnce(&mut CapacityAlert, u64),
    {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .by_id
            .get_mut(alert_id)
            .ok_or_else(|| WatchtowerError::alert_not_found(alert_id))?;
        if !alert.status.can_transition_to(to) {
            return Err(WatchtowerError::invalid_transition(alert_id, alert.status, to));
        }
        alert.status = to;
        apply(alert, current_timestamp());
        info!("Alert {} is now {:?}", alert_id, to);
        let updated = alert.clone();

        if to.is_terminal() {
            alerts.retire(alert_id, self.terminal_retention);
        }
        Ok(updated)
    }

    /// Alerts currently held, terminal ones included
    pub async fn len(&self) -> usize {
        self.alerts.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.read().await.by_id.is_empty()
    }
}

/// Relative deviation from the threshold value; any departure from a zero threshold is unbounded
fn deviation(current: MetricValue, threshold: MetricValue) -> f64 {
    let delta = (current - threshold).abs();
    if threshold == 0.0 {
        return if delta > 0.0 { f64::INFINITY } else { 0.0 };
    }
    delta / threshold.abs()
}
