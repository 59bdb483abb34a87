// src/escalation.rs

use std::time::Duration;
use tracing::{debug, info};

use crate::alerts::AlertStore;
use crate::callbacks::Notifier;
use crate::events::{EventBus, WatchtowerEvent};
use crate::scheduler::TaskScheduler;
use crate::types::{CapacityAlert, EscalationAction, EscalationRule};

/// Drives each new alert through the configured escalation chain.
///
/// One timer task per alert walks the rules in level order. Every step
/// re-reads the alert when it fires and the chain stops as soon as the alert
/// is no longer ACTIVE.
#[derive(Debug, Clone)]
pub struct EscalationScheduler {
    rules: Vec<EscalationRule>,
    alerts: AlertStore,
    notifier: Notifier,
    events: EventBus,
    timers: TaskScheduler,
}

impl EscalationScheduler {
    pub fn new(mut rules: Vec<EscalationRule>, alerts: AlertStore, notifier: Notifier, events: EventBus) -> Self {
        rules.sort_by_key(|r| r.level);
        Self {
            rules,
            alerts,
            notifier,
            events,
            timers: TaskScheduler::new(),
        }
    }

    /// Arm the escalation chain for a freshly opened alert
    pub fn start(&self, alert: &CapacityAlert) {
        if self.rules.is_empty() {
            return;
        }

        let alert_id = alert.id.clone();
        let rules = self.rules.clone();
        let alerts = self.alerts.clone();
        let notifier = self.notifier.clone();
        let events = self.events.clone();

        self.timers.schedule(&alert.id, async move {
            for rule in rules {
                tokio::time::sleep(Duration::from_secs(rule.delay_secs)).await;

                let raise = rule.actions.contains(&EscalationAction::RaiseSeverity);
                let Some(escalated) = alerts.escalate(&alert_id, raise).await else {
                    debug!("Escalation of {} stopped: alert no longer active", alert_id);
                    return;
                };

                info!(
                    "Alert {} escalated to level {} (rule {})",
                    alert_id, escalated.escalation_level, rule.level
                );
                if rule.actions.contains(&EscalationAction::Notify) {
                    notifier.notify_all(&escalated).await;
                }
                events
                    .emit(WatchtowerEvent::AlertEscalated {
                        alert_id: escalated.id.clone(),
                        resource_id: escalated.resource_id.clone(),
                        escalation_level: escalated.escalation_level,
                        severity: escalated.severity,
                    })
                    .await;
            }
        });
    }

    pub fn cancel(&self, alert_id: &str) -> bool {
        self.timers.cancel(alert_id)
    }

    /// Cancel the chains of every alert raised by a threshold
    pub async fn cancel_for_threshold(&self, threshold_id: &str) -> usize {
        self.alerts
            .ids_for_threshold(threshold_id)
            .await
            .iter()
            .filter(|id| self.timers.cancel(id))
            .count()
    }

    pub fn is_pending(&self, alert_id: &str) -> bool {
        self.timers.is_scheduled(alert_id)
    }

    pub fn pending(&self) -> usize {
        self.timers.pending()
    }

    /// Cancel every outstanding chain
    pub fn shutdown(&self) -> usize {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            info!("Cancelled {} escalation timers", cancelled);
        }
        cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::RecordingChannel;
    use crate::events::EventLog;
    use crate::policies;
    use crate::types::{AlertSeverity, AlertStatus, ScaleDirection, ScalingPolicy, ScalingThreshold, ThresholdEvaluation};
    use std::sync::Arc;

    fn rules() -> Vec<EscalationRule> {
        vec![
            EscalationRule {
                level: 2,
                delay_secs: 600,
                actions: vec![EscalationAction::Notify, EscalationAction::RaiseSeverity],
            },
            EscalationRule {
                level: 1,
                delay_secs: 300,
                actions: vec![EscalationAction::Notify],
            },
        ]
    }

    async fn open_alert(store: &AlertStore) -> CapacityAlert {
        let def = policies::cpu_threshold("web", 80.0, 20.0, 300);
        let threshold = ScalingThreshold {
            id: "t-1".to_string(),
            resource_id: def.resource_id,
            metric: def.metric,
            scale_up: def.scale_up,
            scale_down: def.scale_down,
            policy: ScalingPolicy::default(),
            is_active: true,
            created_at: 0,
            updated_at: 0,
        };
        let evaluation = ThresholdEvaluation {
            threshold_id: "t-1".to_string(),
            resource_id: "web".to_string(),
            metric: "cpu.usage".to_string(),
            current_value: 90.0,
            direction: Some(ScaleDirection::Up),
            is_triggered: true,
            duration_secs: 300,
            confidence: 1.0,
            evaluated_at: 300,
        };
        store.open(&evaluation, &threshold).await.unwrap()
    }

    fn scheduler(store: &AlertStore, channel: &Arc<RecordingChannel>, log: &Arc<EventLog>) -> EscalationScheduler {
        EscalationScheduler::new(
            rules(),
            store.clone(),
            Notifier::new(vec![channel.clone()]),
            EventBus::new(vec![log.clone()]),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn walks_rules_in_level_order() {
        let store = AlertStore::new(300, 100);
        let channel = Arc::new(RecordingChannel::new("pager"));
        let log = Arc::new(EventLog::default());
        let escalation = scheduler(&store, &channel, &log);
        let alert = open_alert(&store).await;
        escalation.start(&alert);

        tokio::time::sleep(Duration::from_secs(301)).await;
        let after_first = store.get(&alert.id).await.unwrap();
        assert_eq!(after_first.escalation_level, 1);
        assert_eq!(after_first.severity, AlertSeverity::Medium);
        assert_eq!(channel.sent().len(), 1);

        // Second delay counts from the first fire
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(store.get(&alert.id).await.unwrap().escalation_level, 2);
        let after_second = store.get(&alert.id).await.unwrap();
        assert_eq!(after_second.severity, AlertSeverity::High);
        assert_eq!(log.names(), vec!["alertEscalated", "alertEscalated"]);
        assert!(!escalation.is_pending(&alert.id));
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_alert_stops_escalating() {
        let store = AlertStore::new(300, 100);
        let channel = Arc::new(RecordingChannel::new("pager"));
        let log = Arc::new(EventLog::default());
        let escalation = scheduler(&store, &channel, &log);
        let alert = open_alert(&store).await;
        escalation.start(&alert);

        tokio::time::sleep(Duration::from_secs(100)).await;
        store.acknowledge(&alert.id, "ops").await.unwrap();
        tokio::time::sleep(Duration::from_secs(1000)).await;

        let stored = store.get(&alert.id).await.unwrap();
        assert_eq!(stored.status, AlertStatus::Acknowledged);
        assert_eq!(stored.escalation_level, 0);
        assert!(log.events().is_empty());
        assert!(channel.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_by_threshold_and_shutdown() {
        let store = AlertStore::new(0, 100);
        let channel = Arc::new(RecordingChannel::new("pager"));
        let log = Arc::new(EventLog::default());
        let escalation = scheduler(&store, &channel, &log);

        let first = open_alert(&store).await;
        escalation.start(&first);
        assert_eq!(escalation.cancel_for_threshold("t-1").await, 1);
        assert!(!escalation.is_pending(&first.id));

        let second = open_alert(&store).await;
        escalation.start(&second);
        assert_eq!(escalation.pending(), 1);
        assert_eq!(escalation.shutdown(), 1);

        tokio::time::sleep(Duration::from_secs(2000)).await;
        assert!(log.events().is_empty());
        assert_eq!(store.get(&second.id).await.unwrap().escalation_level, 0);
    }
}
