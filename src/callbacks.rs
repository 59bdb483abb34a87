// src/callbacks.rs

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::WatchtowerResult;
use crate::events::{EventBus, WatchtowerEvent};
use crate::types::{CapacityAlert, MetricValue, ResourceMetrics, ScalingDecision, Timestamp};
use crate::utils::current_timestamp;

/// Context provided to callbacks with additional information
#[derive(Debug, Clone, Default)]
pub struct CallbackContext {
    /// Current timestamp when callback is invoked
    pub timestamp: Timestamp,
    /// Any additional metadata from the engine
    pub metadata: HashMap<String, String>,
}

impl CallbackContext {
    pub fn now() -> Self {
        Self {
            timestamp: current_timestamp(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// The sampler: where metrics come from.
///
/// Implement this to feed the engine from any monitoring system.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Pull the current batch of samples, called once per evaluation tick
    async fn sample(&self, context: &CallbackContext) -> WatchtowerResult<Vec<ResourceMetrics>>;

    /// Validate that metrics are reasonable/expected
    ///
    /// Called on every sample before it is recorded. Return `Ok(None)` to drop
    /// the sample, or a modified copy to smooth it.
    async fn validate_metrics(
        &self,
        metrics: &ResourceMetrics,
        _context: &CallbackContext,
    ) -> WatchtowerResult<Option<ResourceMetrics>> {
        Ok(Some(metrics.clone()))
    }

    /// Historical readings for a trend sweep, oldest first.
    ///
    /// The default returns nothing and the engine falls back to the history
    /// it retained itself.
    async fn fetch_history(
        &self,
        _resource_id: &str,
        _metric: &str,
        _context: &CallbackContext,
    ) -> WatchtowerResult<Vec<(Timestamp, MetricValue)>> {
        Ok(Vec::new())
    }
}

/// The actuator: resizes a resource.
///
/// This is where you integrate with your infrastructure (K8s, AWS, etc.).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScalingExecutor: Send + Sync {
    /// Move the resource to `decision.target_capacity`
    async fn execute(&self, decision: &ScalingDecision, context: &CallbackContext) -> WatchtowerResult<()>;

    /// Restore the resource to `decision.current_capacity` after a failed execute
    async fn rollback(&self, decision: &ScalingDecision, context: &CallbackContext) -> WatchtowerResult<()>;

    /// Current capacity (e.g. number of instances); `None` when unknown
    async fn current_capacity(
        &self,
        _resource_id: &str,
        _context: &CallbackContext,
    ) -> WatchtowerResult<Option<u32>> {
        Ok(None)
    }
}

/// A destination for alert notifications (pager, chat, e-mail, ...)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Inactive channels are skipped
    fn is_active(&self) -> bool {
        true
    }

    async fn send(&self, alert: &CapacityAlert) -> WatchtowerResult<()>;
}

/// Trait for receiving engine events
///
/// Useful for logging, auditing, or custom business logic.
#[async_trait]
pub trait EventObserver: Send + Sync {
    async fn on_event(&self, event: &WatchtowerEvent) -> WatchtowerResult<()>;
}

/// Combine all callbacks into a single struct for easier management
#[derive(Clone)]
pub struct WatchtowerCallbacks {
    pub metrics_provider: Arc<dyn MetricsProvider>,
    pub scaling_executor: Arc<dyn ScalingExecutor>,
    pub channels: Vec<Arc<dyn NotificationChannel>>,
    pub observers: Vec<Arc<dyn EventObserver>>,
}

impl WatchtowerCallbacks {
    /// Create a new callback configuration
    pub fn new(metrics_provider: Arc<dyn MetricsProvider>, scaling_executor: Arc<dyn ScalingExecutor>) -> Self {
        Self {
            metrics_provider,
            scaling_executor,
            channels: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Add a channel alerts are sent to
    pub fn add_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Add an observer to receive engine events
    pub fn add_observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Add multiple observers at once
    pub fn add_observers(mut self, observers: Vec<Arc<dyn EventObserver>>) -> Self {
        self.observers.extend(observers);
        self
    }

    pub fn event_bus(&self) -> EventBus {
        EventBus::new(self.observers.clone())
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.channels.clone())
    }
}

/// Sends alerts to every active channel at once
#[derive(Clone, Default)]
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Send to all active channels concurrently; returns how many succeeded.
    ///
    /// Failures are logged and never propagated.
    pub async fn notify_all(&self, alert: &CapacityAlert) -> usize {
        let active: Vec<&Arc<dyn NotificationChannel>> = self.channels.iter().filter(|c| c.is_active()).collect();
        let results = join_all(active.iter().map(|channel| channel.send(alert))).await;

        let mut delivered = 0;
        for (channel, result) in active.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Notification via {} failed for alert {}: {}", channel.name(), alert.id, e),
            }
        }
        delivered
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.channels.iter().map(|c| c.name()).collect();
        f.debug_struct("Notifier").field("channels", &names).finish()
    }
}

/// Channel that records what it was sent, for assertions in tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingChannel {
    pub(crate) name: String,
    pub(crate) active: bool,
    pub(crate) fail: bool,
    sent: std::sync::Mutex<Vec<CapacityAlert>>,
}

#[cfg(test)]
impl RecordingChannel {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: true,
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<CapacityAlert> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active
    }

    async fn send(&self, alert: &CapacityAlert) -> WatchtowerResult<()> {
        if self.fail {
            return Err(crate::error::WatchtowerError::callback_failed("send", "channel unavailable"));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(alert.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AlertCondition, AlertSeverity, AlertStatus, ComparisonOperator, ScaleDirection,
    };

    fn sample_alert() -> CapacityAlert {
        CapacityAlert {
            id: "a-1".to_string(),
            threshold_id: "t-1".to_string(),
            resource_id: "web".to_string(),
            alert_type: ScaleDirection::Up,
            severity: AlertSeverity::Medium,
            condition: AlertCondition {
                metric: "cpu.usage".to_string(),
                operator: ComparisonOperator::GreaterThan,
                threshold_value: 80.0,
                current_value: 90.0,
                sustained_secs: 300,
            },
            message: "cpu.usage above 80".to_string(),
            status: AlertStatus::Active,
            escalation_level: 0,
            confidence: 1.0,
            triggered_at: 0,
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn notify_all_skips_inactive_and_swallows_failures() {
        let ok = Arc::new(RecordingChannel::new("chat"));
        let broken = Arc::new(RecordingChannel {
            fail: true,
            ..RecordingChannel::new("pager")
        });
        let off = Arc::new(RecordingChannel {
            active: false,
            ..RecordingChannel::new("email")
        });
        let notifier = Notifier::new(vec![ok.clone(), broken, off.clone()]);

        let delivered = notifier.notify_all(&sample_alert()).await;
        assert_eq!(delivered, 1);
        assert_eq!(ok.sent().len(), 1);
        assert!(off.sent().is_empty());
    }

    #[test]
    fn context_metadata() {
        let ctx = CallbackContext::now().with_metadata("trigger", "evaluation");
        assert!(ctx.timestamp > 0);
        assert_eq!(ctx.metadata["trigger"], "evaluation");
    }
}
