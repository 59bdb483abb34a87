// src/events.rs

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::analysis::TrendDirection;
use crate::callbacks::EventObserver;
use crate::types::{AlertId, AlertSeverity, ResourceId, ScalingAction, ThresholdId};

/// Everything the engine reports to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WatchtowerEvent {
    ThresholdCreated {
        threshold_id: ThresholdId,
        resource_id: ResourceId,
        metric: String,
    },
    ThresholdUpdated {
        threshold_id: ThresholdId,
        resource_id: ResourceId,
    },
    ThresholdDeactivated {
        threshold_id: ThresholdId,
        resource_id: ResourceId,
    },
    AlertCreated {
        alert_id: AlertId,
        threshold_id: ThresholdId,
        resource_id: ResourceId,
        severity: AlertSeverity,
    },
    AlertEscalated {
        alert_id: AlertId,
        resource_id: ResourceId,
        escalation_level: u32,
        severity: AlertSeverity,
    },
    AlertAcknowledged {
        alert_id: AlertId,
        resource_id: ResourceId,
        acknowledged_by: String,
    },
    AlertResolved {
        alert_id: AlertId,
        resource_id: ResourceId,
        resolved_by: Option<String>,
    },
    AlertSuppressed {
        alert_id: AlertId,
        resource_id: ResourceId,
        reason: String,
    },
    ScalingDecisionMade {
        decision_id: String,
        resource_id: ResourceId,
        action: ScalingAction,
        confidence: f64,
        should_execute: bool,
    },
    ScalingExecuted {
        decision_id: String,
        resource_id: ResourceId,
        from_capacity: u32,
        to_capacity: u32,
    },
    ScalingFailed {
        decision_id: String,
        resource_id: ResourceId,
        error: String,
    },
    ScalingSkipped {
        decision_id: String,
        resource_id: ResourceId,
        reason: String,
    },
    RollbackFailed {
        decision_id: String,
        resource_id: ResourceId,
        error: String,
    },
    AnalysisStarted {
        trend_id: String,
        resource_id: ResourceId,
        metric: String,
    },
    AnalysisCompleted {
        trend_id: String,
        resource_id: ResourceId,
        metric: String,
        direction: TrendDirection,
    },
    AnalysisFailed {
        trend_id: String,
        resource_id: ResourceId,
        metric: String,
        error: String,
    },
}

impl WatchtowerEvent {
    /// Wire name of the event, identical to the serialized `event` tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::ThresholdCreated { .. } => "thresholdCreated",
            Self::ThresholdUpdated { .. } => "thresholdUpdated",
            Self::ThresholdDeactivated { .. } => "thresholdDeactivated",
            Self::AlertCreated { .. } => "alertCreated",
            Self::AlertEscalated { .. } => "alertEscalated",
            Self::AlertAcknowledged { .. } => "alertAcknowledged",
            Self::AlertResolved { .. } => "alertResolved",
            Self::AlertSuppressed { .. } => "alertSuppressed",
            Self::ScalingDecisionMade { .. } => "scalingDecisionMade",
            Self::ScalingExecuted { .. } => "scalingExecuted",
            Self::ScalingFailed { .. } => "scalingFailed",
            Self::ScalingSkipped { .. } => "scalingSkipped",
            Self::RollbackFailed { .. } => "rollbackFailed",
            Self::AnalysisStarted { .. } => "analysisStarted",
            Self::AnalysisCompleted { .. } => "analysisCompleted",
            Self::AnalysisFailed { .. } => "analysisFailed",
        }
    }

    pub fn resource_id(&self) -> &str {
        match self {
            Self::ThresholdCreated { resource_id, .. }
            | Self::ThresholdUpdated { resource_id, .. }
            | Self::ThresholdDeactivated { resource_id, .. }
            | Self::AlertCreated { resource_id, .. }
            | Self::AlertEscalated { resource_id, .. }
            | Self::AlertAcknowledged { resource_id, .. }
            | Self::AlertResolved { resource_id, .. }
            | Self::AlertSuppressed { resource_id, .. }
            | Self::ScalingDecisionMade { resource_id, .. }
            | Self::ScalingExecuted { resource_id, .. }
            | Self::ScalingFailed { resource_id, .. }
            | Self::ScalingSkipped { resource_id, .. }
            | Self::RollbackFailed { resource_id, .. }
            | Self::AnalysisStarted { resource_id, .. }
            | Self::AnalysisCompleted { resource_id, .. }
            | Self::AnalysisFailed { resource_id, .. } => resource_id,
        }
    }
}

/// Fans events out to every registered observer, in registration order
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Vec<Arc<dyn EventObserver>>,
}

impl EventBus {
    pub fn new(observers: Vec<Arc<dyn EventObserver>>) -> Self {
        Self { observers }
    }

    /// Deliver one event; observer failures are logged and never reach the caller
    pub async fn emit(&self, event: WatchtowerEvent) {
        for observer in &self.observers {
            if let Err(e) = observer.on_event(&event).await {
                warn!("Observer error on {}: {}", event.name(), e);
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Observer that keeps every event it sees, for assertions in tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct EventLog {
    events: std::sync::Mutex<Vec<WatchtowerEvent>>,
}

#[cfg(test)]
impl EventLog {
    pub(crate) fn events(&self) -> Vec<WatchtowerEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.name()).collect()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl EventObserver for EventLog {
    async fn on_event(&self, event: &WatchtowerEvent) -> crate::error::WatchtowerResult<()> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
        Ok(())
    }
}
