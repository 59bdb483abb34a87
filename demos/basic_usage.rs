// demos/basic_usage.rs
//! Basic usage showing the core Watchtower loop
//!
//! This demo:
//! - registers a CPU threshold with a capacity policy
//! - pushes a minute-by-minute load ramp through the engine
//! - prints the alerts, scaling decisions and trend analysis it produces
//!
//! Run with: cargo run --example basic_usage

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use watchtower::{
    policies, types::metric_names, utils, CallbackContext, EscalationAction, EscalationRule, EventObserver,
    MetricsProvider, ResourceMetrics, ScalingDecision, ScalingExecutor, WatchtowerCallbacks, WatchtowerConfig,
    WatchtowerEngine, WatchtowerEvent, WatchtowerResult,
};

/// Samples are pushed through the handle in this demo, so there is nothing to pull
struct PushOnlyProvider;

#[async_trait]
impl MetricsProvider for PushOnlyProvider {
    async fn sample(&self, _context: &CallbackContext) -> WatchtowerResult<Vec<ResourceMetrics>> {
        Ok(Vec::new())
    }
}

/// Pretends to resize a deployment by tracking a replica count
struct FakeDeployment {
    replicas: AtomicU32,
}

#[async_trait]
impl ScalingExecutor for FakeDeployment {
    async fn execute(&self, decision: &ScalingDecision, _context: &CallbackContext) -> WatchtowerResult<()> {
        println!(
            "Scaling {} from {} to {} replicas",
            decision.resource_id, decision.current_capacity, decision.target_capacity
        );
        self.replicas.store(decision.target_capacity, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self, decision: &ScalingDecision, _context: &CallbackContext) -> WatchtowerResult<()> {
        self.replicas.store(decision.current_capacity, Ordering::SeqCst);
        Ok(())
    }

    async fn current_capacity(&self, _resource_id: &str, _context: &CallbackContext) -> WatchtowerResult<Option<u32>> {
        Ok(Some(self.replicas.load(Ordering::SeqCst)))
    }
}

struct PrintingObserver;

#[async_trait]
impl EventObserver for PrintingObserver {
    async fn on_event(&self, event: &WatchtowerEvent) -> WatchtowerResult<()> {
        println!("event: {}", serde_json::to_string(event)?);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> WatchtowerResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = WatchtowerConfig::builder()
        .alert_cooldown(600)
        .min_data_points(12)
        .add_escalation_rule(EscalationRule {
            level: 1,
            delay_secs: 900,
            actions: vec![EscalationAction::Notify, EscalationAction::RaiseSeverity],
        })
        .build();

    let deployment = Arc::new(FakeDeployment {
        replicas: AtomicU32::new(2),
    });
    let callbacks = WatchtowerCallbacks::new(Arc::new(PushOnlyProvider), deployment.clone())
        .add_observer(Arc::new(PrintingObserver));

    let engine = WatchtowerEngine::new(config, callbacks)?;
    let handle = engine.handle();
    let engine_task = tokio::spawn(engine.start());

    let threshold = handle
        .create_threshold(policies::with_policy(
            policies::cpu_threshold("web-frontend", 75.0, 25.0, 300),
            2,
            12,
            2,
        ))
        .await?;
    println!("Registered threshold {}", threshold.id);

    // A steady climb from 60% to 95% CPU, one sample per minute
    let start = utils::current_timestamp();
    for minute in 0..15u64 {
        let cpu = 60.0 + minute as f64 * 2.5;
        let sample = utils::metrics_at(
            "web-frontend",
            "deployment",
            start + minute * 60,
            vec![(metric_names::CPU_USAGE, cpu), (metric_names::MEMORY_USAGE, 55.0)],
        );
        for evaluation in handle.ingest(vec![sample]).await? {
            if evaluation.is_triggered {
                println!(
                    "Triggered at minute {}: {} = {:.1} (confidence {:.2})",
                    minute, evaluation.metric, evaluation.current_value, evaluation.confidence
                );
            }
        }
    }

    for alert in handle.active_alerts().await? {
        println!("Active alert [{:?}]: {}", alert.severity, alert.message);
    }
    println!("Replicas now: {}", deployment.replicas.load(Ordering::SeqCst));

    let trend = handle.analyze_trend("web-frontend", metric_names::CPU_USAGE).await?;
    println!(
        "Trend: {:?}, slope {:.2}/sample, next hour forecast {:.1}",
        trend.direction,
        trend.slope,
        trend.forecast.short_term.first().copied().unwrap_or_default()
    );
    for recommendation in &trend.recommendations {
        println!("  [{:?}] {}", recommendation.priority, recommendation.description);
    }

    let status = handle.get_status().await?;
    println!("Status: {:?}", status);

    handle.shutdown().await?;
    engine_task
        .await
        .map_err(|e| watchtower::WatchtowerError::unexpected(e.to_string()))??;
    Ok(())
}
