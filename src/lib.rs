//! # Watchtower - Capacity Monitoring and Autoscaling Decisions
//!
//! Watchtower watches resource metrics, detects sustained threshold
//! violations, raises alerts and turns them into bounded, reversible scaling
//! decisions. Independently it analyses metric history for trend,
//! seasonality, change points, anomalies and forecasts.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                            Watchtower Engine                             │
//! ├──────────────────┬──────────────────┬──────────────────┬─────────────────┤
//! │ Threshold Layer  │   Alert Layer    │  Decision Layer  │ Trend Analysis  │
//! │                  │                  │                  │                 │
//! │ • Registry       │ • Cooldown gate  │ • Target sizing  │ • Decomposition │
//! │ • Sustained      │ • Lifecycle      │ • Confidence     │ • Seasonality   │
//! │   triggers       │ • Escalation     │ • Plans          │ • Change points │
//! │ • Confidence     │ • Notification   │ • Rollback       │ • Forecasts     │
//! └──────────────────┴──────────────────┴──────────────────┴─────────────────┘
//!                                        │
//!                              ┌─────────▼──────────────┐
//!                              │     Your Callbacks     │
//!                              │                        │
//!                              │ • MetricsProvider      │
//!                              │ • ScalingExecutor      │
//!                              │ • NotificationChannel  │
//!                              │ • EventObserver        │
//!                              └────────────────────────┘
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use watchtower::{
//!     policies, utils, CallbackContext, MetricsProvider, ResourceMetrics, ScalingDecision,
//!     ScalingExecutor, WatchtowerCallbacks, WatchtowerConfig, WatchtowerEngine, WatchtowerResult,
//! };
//! use std::sync::Arc;
//!
//! struct MyMetricsProvider;
//! #[async_trait::async_trait]
//! impl MetricsProvider for MyMetricsProvider {
//!     async fn sample(&self, _context: &CallbackContext) -> WatchtowerResult<Vec<ResourceMetrics>> {
//!         Ok(vec![utils::single_metric("web-servers", "deployment", "cpu.usage", 91.0)])
//!     }
//! }
//!
//! struct MyScalingExecutor;
//! #[async_trait::async_trait]
//! impl ScalingExecutor for MyScalingExecutor {
//!     async fn execute(&self, _decision: &ScalingDecision, _context: &CallbackContext) -> WatchtowerResult<()> {
//!         Ok(())
//!     }
//!     async fn rollback(&self, _decision: &ScalingDecision, _context: &CallbackContext) -> WatchtowerResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> WatchtowerResult<()> {
//!     let config = WatchtowerConfig::builder()
//!         .evaluation_interval(30)
//!         .add_analysis_target("web-servers", "cpu.usage")
//!         .build();
//!     let callbacks = WatchtowerCallbacks::new(Arc::new(MyMetricsProvider), Arc::new(MyScalingExecutor));
//!
//!     let engine = WatchtowerEngine::new(config, callbacks)?;
//!     let handle = engine.handle();
//!     tokio::spawn(engine.start());
//!
//!     // Scale up above 80% CPU sustained for five minutes
//!     handle
//!         .create_threshold(policies::cpu_threshold("web-servers", 80.0, 20.0, 300))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Deterministic triggers**: sustained-violation timers run on sample timestamps
//! - **Cooldowns and caps**: no alert storms while an alert is still active
//! - **Escalation chains**: cancellable timers per alert, threshold or engine
//! - **Safe execution**: confidence gate and exactly one rollback on failure
//! - **Trend analysis**: decomposition, seasonality, change points, anomalies and forecasts
//! - **TOML configuration** behind the default `config-toml` feature

pub mod alerts;
pub mod analysis;
pub mod callbacks;
pub mod decision;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod evaluator;
pub mod events;
pub mod policies;
pub mod registry;
pub mod scheduler;
pub mod series;
pub mod stats;
pub mod types;
pub mod utils;


// Re-export common types for convenience
pub use types::{
    AlertCondition, AlertId, AlertSeverity, AlertStatus, AnalysisConfig, CapacityAlert, ComparisonOperator,
    DecisionConfig, EscalationAction, EscalationRule, ExecutionStep, MetricValue, ResourceId, ResourceMetrics,
    ScaleDirection, ScalingAction, ScalingDecision, ScalingPolicy, ScalingThreshold, StepKind, ThresholdCondition,
    ThresholdDefinition, ThresholdEvaluation, ThresholdId, ThresholdUpdate, Timestamp, TrendTarget,
    WatchtowerConfig, WatchtowerConfigBuilder,
};

pub use error::{WatchtowerError, WatchtowerResult};

pub use callbacks::{
    CallbackContext, EventObserver, MetricsProvider, NotificationChannel, Notifier, ScalingExecutor,
    WatchtowerCallbacks,
};

pub use engine::{EngineStatus, WatchtowerEngine, WatchtowerHandle};

pub use events::{EventBus, WatchtowerEvent};

pub use alerts::AlertStore;
pub use decision::{ExecutionOutcome, ScalingDecisionEngine};
pub use escalation::EscalationScheduler;
pub use evaluator::ThresholdEvaluator;
pub use registry::ThresholdRegistry;
pub use scheduler::TaskScheduler;
pub use series::{MetricPoint, TimeSeries};

pub use analysis::{
    Anomaly, CapacityTrend, ChangePoint, ChangePointDetector, ChangeType, Forecast, ForecastEngine,
    RecommendationKind, RecommendationPriority, SeasonalPattern, SeasonalityDescriptor, SeasonalityDetector,
    TimeSeriesDecomposer, TrendAnalyzer, TrendComponents, TrendDirection, TrendRecommendation,
};
