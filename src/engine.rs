// src/engine.rs

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::alerts::AlertStore;
use crate::analysis::{CapacityTrend, TrendAnalyzer};
use crate::callbacks::{CallbackContext, Notifier, WatchtowerCallbacks};
use crate::decision::{ExecutionOutcome, ScalingDecisionEngine};
use crate::error::{WatchtowerError, WatchtowerResult};
use crate::escalation::EscalationScheduler;
use crate::evaluator::ThresholdEvaluator;
use crate::events::{EventBus, WatchtowerEvent};
use crate::registry::ThresholdRegistry;
use crate::series::{MetricPoint, TimeSeries};
use crate::types::{
    AlertId, CapacityAlert, ResourceId, ResourceMetrics, ScalingThreshold, ThresholdDefinition, ThresholdEvaluation,
    ThresholdId, ThresholdUpdate, Timestamp, TrendTarget, WatchtowerConfig,
};
use crate::utils::{current_timestamp, new_id};

type Responder<T> = oneshot::Sender<WatchtowerResult<T>>;

/// Commands that can be sent to the watchtower engine
#[derive(Debug)]
pub enum EngineCommand {
    /// Push a batch of samples through validation, evaluation and alerting
    IngestMetrics {
        metrics: Vec<ResourceMetrics>,
        response: Responder<Vec<ThresholdEvaluation>>,
    },
    /// Pull a batch from the metrics provider right away
    EvaluateNow {
        response: Responder<Vec<ThresholdEvaluation>>,
    },
    CreateThreshold {
        definition: ThresholdDefinition,
        response: Responder<ScalingThreshold>,
    },
    UpdateThreshold {
        threshold_id: ThresholdId,
        update: ThresholdUpdate,
        response: Responder<ScalingThreshold>,
    },
    DeactivateThreshold {
        threshold_id: ThresholdId,
        response: Responder<ScalingThreshold>,
    },
    ListThresholds {
        response: oneshot::Sender<Vec<ScalingThreshold>>,
    },
    AcknowledgeAlert {
        alert_id: AlertId,
        by: String,
        response: Responder<CapacityAlert>,
    },
    ResolveAlert {
        alert_id: AlertId,
        by: Option<String>,
        response: Responder<CapacityAlert>,
    },
    SuppressAlert {
        alert_id: AlertId,
        reason: String,
        response: Responder<CapacityAlert>,
    },
    ListActiveAlerts {
        response: oneshot::Sender<Vec<CapacityAlert>>,
    },
    /// Run a trend analysis for one resource and metric now
    AnalyzeTrend {
        resource_id: ResourceId,
        metric: String,
        response: Responder<CapacityTrend>,
    },
    /// Latest stored analysis for a resource and metric
    GetTrend {
        resource_id: ResourceId,
        metric: String,
        response: oneshot::Sender<Option<CapacityTrend>>,
    },
    /// Get current engine status
    GetStatus {
        response: oneshot::Sender<EngineStatus>,
    },
    /// Cancel outstanding timers and stop the engine loop
    Shutdown,
}

/// Status information about the watchtower engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub is_running: bool,
    pub thresholds: usize,
    pub active_alerts: usize,
    pub resources_tracked: usize,
    pub evaluations_run: u64,
    pub decisions_executed: u64,
    pub last_evaluation: Option<Timestamp>,
    pub last_analysis: Option<Timestamp>,
}

/// The main watchtower monitoring and scaling engine
pub struct WatchtowerEngine {
    config: WatchtowerConfig,
    callbacks: WatchtowerCallbacks,
    registry: Arc<RwLock<ThresholdRegistry>>,
    evaluator: Arc<RwLock<ThresholdEvaluator>>,
    alerts: AlertStore,
    escalation: EscalationScheduler,
    decisions: ScalingDecisionEngine,
    analyzer: TrendAnalyzer,
    trends: Arc<RwLock<HashMap<TrendTarget, CapacityTrend>>>,
    events: EventBus,
    notifier: Notifier,
    status: Arc<RwLock<EngineStatus>>,
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    command_rx: Option<mpsc::UnboundedReceiver<EngineCommand>>,
}

impl WatchtowerEngine {
    /// Create a new engine; fails on an invalid configuration
    pub fn new(config: WatchtowerConfig, callbacks: WatchtowerCallbacks) -> WatchtowerResult<Self> {
        config.validate()?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let events = callbacks.event_bus();
        let notifier = callbacks.notifier();
        let alerts = AlertStore::new(config.alert_cooldown_secs, config.max_concurrent_alerts);
        let escalation = EscalationScheduler::new(
            config.escalation_rules.clone(),
            alerts.clone(),
            notifier.clone(),
            events.clone(),
        );

        Ok(Self {
            registry: Arc::new(RwLock::new(ThresholdRegistry::new())),
            evaluator: Arc::new(RwLock::new(ThresholdEvaluator::new(config.history_size))),
            alerts,
            escalation,
            decisions: ScalingDecisionEngine::new(config.decision.clone(), events.clone()),
            analyzer: TrendAnalyzer::new(config.analysis.clone()),
            trends: Arc::new(RwLock::new(HashMap::new())),
            events,
            notifier,
            status: Arc::new(RwLock::new(EngineStatus::default())),
            command_tx,
            command_rx: Some(command_rx),
            config,
            callbacks,
        })
    }

    /// Get a handle to send commands to the engine
    pub fn handle(&self) -> WatchtowerHandle {
        WatchtowerHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Start the engine loop (consumes self); returns once shut down
    pub async fn start(mut self) -> WatchtowerResult<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| WatchtowerError::engine_not_running("Engine already started"))?;

        self.status.write().await.is_running = true;
        info!("Watchtower engine starting...");

        let evaluation_period = Duration::from_secs(self.config.evaluation_interval_secs);
        let analysis_period = Duration::from_secs(self.config.analysis_interval_secs);
        let mut evaluation_timer = interval_at(Instant::now() + evaluation_period, evaluation_period);
        let mut analysis_timer = interval_at(Instant::now() + analysis_period, analysis_period);

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(EngineCommand::Shutdown) => {
                            info!("Shutdown command received");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            info!("Command channel closed, shutting down engine");
                            break;
                        }
                    }
                }

                _ = evaluation_timer.tick() => {
                    if let Err(e) = self.evaluate_from_provider().await {
                        error!("Error during evaluation: {}", e);
                    }
                }

                _ = analysis_timer.tick() => {
                    self.run_analysis_sweep().await;
                }
            }
        }

        self.escalation.shutdown();
        self.status.write().await.is_running = false;
        info!("Watchtower engine stopped");
        Ok(())
    }

    /// Handle incoming commands
    async fn handle_command(&self, command: EngineCommand) {
        match command {
            EngineCommand::IngestMetrics { metrics, response } => {
                let evaluations = self.process_batch(metrics).await;
                let _ = response.send(Ok(evaluations));
            }
            EngineCommand::EvaluateNow { response } => {
                let _ = response.send(self.evaluate_from_provider().await);
            }
            EngineCommand::CreateThreshold { definition, response } => {
                let _ = response.send(self.create_threshold(definition).await);
            }
            EngineCommand::UpdateThreshold {
                threshold_id,
                update,
                response,
            } => {
                let _ = response.send(self.update_threshold(&threshold_id, update).await);
            }
            EngineCommand::DeactivateThreshold { threshold_id, response } => {
                let _ = response.send(self.deactivate_threshold(&threshold_id).await);
            }
            EngineCommand::ListThresholds { response } => {
                let _ = response.send(self.registry.read().await.list());
            }
            EngineCommand::AcknowledgeAlert { alert_id, by, response } => {
                let _ = response.send(self.acknowledge_alert(&alert_id, &by).await);
            }
            EngineCommand::ResolveAlert { alert_id, by, response } => {
                let _ = response.send(self.resolve_alert(&alert_id, by).await);
            }
            EngineCommand::SuppressAlert {
                alert_id,
                reason,
                response,
            } => {
                let _ = response.send(self.suppress_alert(&alert_id, reason).await);
            }
            EngineCommand::ListActiveAlerts { response } => {
                let _ = response.send(self.alerts.list_active().await);
            }
            EngineCommand::AnalyzeTrend {
                resource_id,
                metric,
                response,
            } => {
                let _ = response.send(self.analyze_target(&resource_id, &metric).await);
            }
            EngineCommand::GetTrend {
                resource_id,
                metric,
                response,
            } => {
                let key = TrendTarget { resource_id, metric };
                let _ = response.send(self.trends.read().await.get(&key).cloned());
            }
            EngineCommand::GetStatus { response } => {
                let mut status = self.status.read().await.clone();
                status.thresholds = self.registry.read().await.len();
                status.active_alerts = self.alerts.active_count().await;
                let _ = response.send(status);
            }
            EngineCommand::Shutdown => {}
        }
    }

    async fn evaluate_from_provider(&self) -> WatchtowerResult<Vec<ThresholdEvaluation>> {
        let context = CallbackContext::now();
        let batch = self.callbacks.metrics_provider.sample(&context).await?;
        Ok(self.process_batch(batch).await)
    }

    /// Validate, record and evaluate a batch, then act on every trigger
    async fn process_batch(&self, batch: Vec<ResourceMetrics>) -> Vec<ThresholdEvaluation> {
        let context = CallbackContext::now();

        let mut validated = Vec::with_capacity(batch.len());
        for metrics in &batch {
            match self.callbacks.metrics_provider.validate_metrics(metrics, &context).await {
                Ok(Some(valid)) => validated.push(valid),
                Ok(None) => debug!("Dropped sample for {} during validation", metrics.resource_id),
                Err(e) => warn!("Validation of {} failed: {}", metrics.resource_id, e),
            }
        }

        let thresholds = self.registry.read().await.active();
        let (evaluations, resources_tracked) = {
            let mut evaluator = self.evaluator.write().await;
            let evaluations = evaluator.evaluate(&thresholds, &validated);
            (evaluations, evaluator.tracked_resources())
        };

        {
            let mut status = self.status.write().await;
            status.evaluations_run += 1;
            status.last_evaluation = Some(current_timestamp());
            status.resources_tracked = resources_tracked;
        }

        let by_id: HashMap<&str, &ScalingThreshold> = thresholds.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut triggered: HashMap<&str, Vec<(&ThresholdEvaluation, &ScalingThreshold)>> = HashMap::new();
        for evaluation in evaluations.iter().filter(|e| e.is_triggered) {
            if let Some(&threshold) = by_id.get(evaluation.threshold_id.as_str()) {
                triggered
                    .entry(evaluation.resource_id.as_str())
                    .or_default()
                    .push((evaluation, threshold));
            }
        }

        let resources: Vec<(&str, Vec<(&ThresholdEvaluation, &ScalingThreshold)>)> = triggered.into_iter().collect();
        for chunk in resources.chunks(self.config.evaluation_batch_size) {
            join_all(chunk.iter().map(|(_, items)| self.act_on_resource(items, &context))).await;
        }

        evaluations
    }

    /// Alert, notify, escalate and scale for one resource's triggers, in order.
    ///
    /// A failed scaling attempt is logged and the remaining triggers of the
    /// resource are still handled.
    async fn act_on_resource(&self, items: &[(&ThresholdEvaluation, &ScalingThreshold)], context: &CallbackContext) {
        for (evaluation, threshold) in items {
            let Some(alert) = self.alerts.open(evaluation, threshold).await else {
                continue;
            };

            self.events
                .emit(WatchtowerEvent::AlertCreated {
                    alert_id: alert.id.clone(),
                    threshold_id: alert.threshold_id.clone(),
                    resource_id: alert.resource_id.clone(),
                    severity: alert.severity,
                })
                .await;
            self.notifier.notify_all(&alert).await;
            self.escalation.start(&alert);

            let executor = &self.callbacks.scaling_executor;
            let current_capacity = match executor.current_capacity(&threshold.resource_id, context).await {
                Ok(Some(capacity)) => capacity,
                Ok(None) => threshold.policy.min_instances,
                Err(e) => {
                    warn!("Could not read capacity of {}: {}", threshold.resource_id, e);
                    threshold.policy.min_instances
                }
            };

            let recent = self.evaluator.read().await.recent_values(
                &threshold.resource_id,
                &threshold.metric,
                self.config.decision.recent_window,
            );
            let decision = self.decisions.decide(&alert, threshold, &recent, current_capacity);
            if self.config.enable_logging {
                info!(
                    "Decision {} for {}: {:?} {} -> {} (confidence {:.2})",
                    decision.id,
                    decision.resource_id,
                    decision.action,
                    decision.current_capacity,
                    decision.target_capacity,
                    decision.confidence
                );
            }

            match self.decisions.execute(&decision, executor.as_ref(), context).await {
                Ok(ExecutionOutcome::Executed) => self.status.write().await.decisions_executed += 1,
                Ok(ExecutionOutcome::Skipped) => {}
                Err(e) => error!(
                    "Decision {} for threshold {} on {} failed: {}",
                    decision.id, threshold.id, threshold.resource_id, e
                ),
            }
        }
    }

    async fn create_threshold(&self, definition: ThresholdDefinition) -> WatchtowerResult<ScalingThreshold> {
        let threshold = self.registry.write().await.create(definition)?;
        self.events
            .emit(WatchtowerEvent::ThresholdCreated {
                threshold_id: threshold.id.clone(),
                resource_id: threshold.resource_id.clone(),
                metric: threshold.metric.clone(),
            })
            .await;
        Ok(threshold)
    }

    async fn update_threshold(&self, id: &str, update: ThresholdUpdate) -> WatchtowerResult<ScalingThreshold> {
        let threshold = self.registry.write().await.update(id, update)?;
        if !threshold.is_active {
            self.stop_tracking(&threshold.id).await;
        }
        self.events
            .emit(WatchtowerEvent::ThresholdUpdated {
                threshold_id: threshold.id.clone(),
                resource_id: threshold.resource_id.clone(),
            })
            .await;
        Ok(threshold)
    }

    async fn deactivate_threshold(&self, id: &str) -> WatchtowerResult<ScalingThreshold> {
        let threshold = self.registry.write().await.deactivate(id)?;
        self.stop_tracking(&threshold.id).await;
        self.events
            .emit(WatchtowerEvent::ThresholdDeactivated {
                threshold_id: threshold.id.clone(),
                resource_id: threshold.resource_id.clone(),
            })
            .await;
        Ok(threshold)
    }

    /// Forget the trigger timers and cancel escalations of an inactive threshold
    async fn stop_tracking(&self, threshold_id: &str) {
        self.evaluator.write().await.forget_threshold(threshold_id);
        let cancelled = self.escalation.cancel_for_threshold(threshold_id).await;
        if cancelled > 0 {
            debug!("Cancelled {} escalations of threshold {}", cancelled, threshold_id);
        }
    }

    async fn acknowledge_alert(&self, alert_id: &str, by: &str) -> WatchtowerResult<CapacityAlert> {
        let alert = self.alerts.acknowledge(alert_id, by).await?;
        self.events
            .emit(WatchtowerEvent::AlertAcknowledged {
                alert_id: alert.id.clone(),
                resource_id: alert.resource_id.clone(),
                acknowledged_by: by.to_string(),
            })
            .await;
        Ok(alert)
    }

    async fn resolve_alert(&self, alert_id: &str, by: Option<String>) -> WatchtowerResult<CapacityAlert> {
        let alert = self.alerts.resolve(alert_id).await?;
        self.escalation.cancel(alert_id);
        self.events
            .emit(WatchtowerEvent::AlertResolved {
                alert_id: alert.id.clone(),
                resource_id: alert.resource_id.clone(),
                resolved_by: by,
            })
            .await;
        Ok(alert)
    }

    async fn suppress_alert(&self, alert_id: &str, reason: String) -> WatchtowerResult<CapacityAlert> {
        let alert = self.alerts.suppress(alert_id).await?;
        self.escalation.cancel(alert_id);
        self.events
            .emit(WatchtowerEvent::AlertSuppressed {
                alert_id: alert.id.clone(),
                resource_id: alert.resource_id.clone(),
                reason,
            })
            .await;
        Ok(alert)
    }

    /// Analyse every configured target; failures are logged and the sweep moves on
    async fn run_analysis_sweep(&self) {
        for target in &self.config.analysis_targets {
            if let Err(e) = self.analyze_target(&target.resource_id, &target.metric).await {
                warn!("Scheduled analysis of {}/{} failed: {}", target.resource_id, target.metric, e);
            }
        }
    }

    async fn analyze_target(&self, resource_id: &str, metric: &str) -> WatchtowerResult<CapacityTrend> {
        let trend_id = new_id();
        self.events
            .emit(WatchtowerEvent::AnalysisStarted {
                trend_id: trend_id.clone(),
                resource_id: resource_id.to_string(),
                metric: metric.to_string(),
            })
            .await;

        let series = self.load_series(resource_id, metric).await;
        let result = self.analyzer.analyze_with_id(trend_id.clone(), &series);
        self.status.write().await.last_analysis = Some(current_timestamp());

        match &result {
            Ok(trend) => {
                info!(
                    "Analysis {} of {}/{}: {:?}, {} recommendations",
                    trend_id,
                    resource_id,
                    metric,
                    trend.direction,
                    trend.recommendations.len()
                );
                let key = TrendTarget {
                    resource_id: resource_id.to_string(),
                    metric: metric.to_string(),
                };
                self.trends.write().await.insert(key, trend.clone());
                self.events
                    .emit(WatchtowerEvent::AnalysisCompleted {
                        trend_id,
                        resource_id: resource_id.to_string(),
                        metric: metric.to_string(),
                        direction: trend.direction,
                    })
                    .await;
            }
            Err(e) => {
                self.events
                    .emit(WatchtowerEvent::AnalysisFailed {
                        trend_id,
                        resource_id: resource_id.to_string(),
                        metric: metric.to_string(),
                        error: e.to_string(),
                    })
                    .await;
            }
        }
        result
    }

    /// Provider history when it has any, otherwise the samples retained by the evaluator
    async fn load_series(&self, resource_id: &str, metric: &str) -> TimeSeries {
        let context = CallbackContext::now();
        match self
            .callbacks
            .metrics_provider
            .fetch_history(resource_id, metric, &context)
            .await
        {
            Ok(points) if !points.is_empty() => {
                let points = points
                    .into_iter()
                    .map(|(timestamp, value)| MetricPoint { timestamp, value })
                    .collect();
                return TimeSeries::new(resource_id, metric, points);
            }
            Ok(_) => {}
            Err(e) => warn!("Fetching history of {}/{} failed: {}", resource_id, metric, e),
        }
        let samples = self.evaluator.read().await.history(resource_id);
        TimeSeries::from_metrics(resource_id, metric, &samples)
    }
}

/// Handle for interacting with a running watchtower engine
#[derive(Clone)]
pub struct WatchtowerHandle {
    command_tx: mpsc::UnboundedSender<EngineCommand>,
}

impl WatchtowerHandle {
    /// Push samples and get the resulting evaluations
    pub async fn ingest(&self, metrics: Vec<ResourceMetrics>) -> WatchtowerResult<Vec<ThresholdEvaluation>> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::IngestMetrics { metrics, response })?;
        rx.await?
    }

    /// Pull and evaluate a batch from the metrics provider now
    pub async fn evaluate_now(&self) -> WatchtowerResult<Vec<ThresholdEvaluation>> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::EvaluateNow { response })?;
        rx.await?
    }

    pub async fn create_threshold(&self, definition: ThresholdDefinition) -> WatchtowerResult<ScalingThreshold> {
        let (response, rx) = oneshot::channel();
        self.command_tx
            .send(EngineCommand::CreateThreshold { definition, response })?;
        rx.await?
    }

    pub async fn update_threshold(&self, threshold_id: &str, update: ThresholdUpdate) -> WatchtowerResult<ScalingThreshold> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::UpdateThreshold {
            threshold_id: threshold_id.to_string(),
            update,
            response,
        })?;
        rx.await?
    }

    pub async fn deactivate_threshold(&self, threshold_id: &str) -> WatchtowerResult<ScalingThreshold> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::DeactivateThreshold {
            threshold_id: threshold_id.to_string(),
            response,
        })?;
        rx.await?
    }

    pub async fn list_thresholds(&self) -> WatchtowerResult<Vec<ScalingThreshold>> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::ListThresholds { response })?;
        Ok(rx.await?)
    }

    pub async fn acknowledge_alert(&self, alert_id: &str, by: &str) -> WatchtowerResult<CapacityAlert> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::AcknowledgeAlert {
            alert_id: alert_id.to_string(),
            by: by.to_string(),
            response,
        })?;
        rx.await?
    }

    pub async fn resolve_alert(&self, alert_id: &str, by: Option<&str>) -> WatchtowerResult<CapacityAlert> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::ResolveAlert {
            alert_id: alert_id.to_string(),
            by: by.map(str::to_string),
            response,
        })?;
        rx.await?
    }

    pub async fn suppress_alert(&self, alert_id: &str, reason: &str) -> WatchtowerResult<CapacityAlert> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::SuppressAlert {
            alert_id: alert_id.to_string(),
            reason: reason.to_string(),
            response,
        })?;
        rx.await?
    }

    pub async fn active_alerts(&self) -> WatchtowerResult<Vec<CapacityAlert>> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::ListActiveAlerts { response })?;
        Ok(rx.await?)
    }

    pub async fn analyze_trend(&self, resource_id: &str, metric: &str) -> WatchtowerResult<CapacityTrend> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::AnalyzeTrend {
            resource_id: resource_id.to_string(),
            metric: metric.to_string(),
            response,
        })?;
        rx.await?
    }

    pub async fn latest_trend(&self, resource_id: &str, metric: &str) -> WatchtowerResult<Option<CapacityTrend>> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::GetTrend {
            resource_id: resource_id.to_string(),
            metric: metric.to_string(),
            response,
        })?;
        Ok(rx.await?)
    }

    /// Get current engine status
    pub async fn get_status(&self) -> WatchtowerResult<EngineStatus> {
        let (response, rx) = oneshot::channel();
        self.command_tx.send(EngineCommand::GetStatus { response })?;
        Ok(rx.await?)
    }

    /// Shutdown the engine
    pub async fn shutdown(&self) -> WatchtowerResult<()> {
        self.command_tx.send(EngineCommand::Shutdown)?;
        Ok(())
    }
}
