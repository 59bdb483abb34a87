// src/types.rs

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::{WatchtowerError, WatchtowerResult};

/// Unique identifier for a resource (e.g., "web-servers", "database-pool")
pub type ResourceId = String;

/// Stable identifier of a registered scaling threshold
pub type ThresholdId = String;

/// Stable identifier of a capacity alert
pub type AlertId = String;

/// A metric value (CPU %, memory usage, bytes in, etc.)
pub type MetricValue = f64;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Well-known metric names carried by [`ResourceMetrics`]
pub mod metric_names {
    pub const CPU_USAGE: &str = "cpu.usage";
    pub const MEMORY_USAGE: &str = "memory.usage";
    pub const DISK_USAGE: &str = "disk.usage";
    pub const NETWORK_IN: &str = "network.in";
    pub const NETWORK_OUT: &str = "network.out";
}

/// Represents metrics for a specific resource at a point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceMetrics {
    /// Unique identifier for this resource
    pub resource_id: ResourceId,
    /// Type of resource (e.g., "kubernetes-deployment", "ec2-asg", "database")
    pub resource_type: String,
    /// When these metrics were collected
    pub timestamp: Timestamp,
    /// Readings keyed by metric name, see [`metric_names`] for the standard ones.
    /// Anything else is a custom reading.
    pub metrics: HashMap<String, MetricValue>,
}

impl ResourceMetrics {
    /// Look up a single reading
    pub fn value(&self, metric: &str) -> Option<MetricValue> {
        self.metrics.get(metric).copied()
    }
}

/// Comparison applied between an observed value and a threshold value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComparisonOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl ComparisonOperator {
    /// Does `observed <op> threshold` hold?
    pub fn holds(&self, observed: MetricValue, threshold: MetricValue) -> bool {
        match self {
            Self::GreaterThan => observed > threshold,
            Self::GreaterOrEqual => observed >= threshold,
            Self::LessThan => observed < threshold,
            Self::LessOrEqual => observed <= threshold,
            Self::Equal => (observed - threshold).abs() < f64::EPSILON,
            Self::NotEqual => (observed - threshold).abs() >= f64::EPSILON,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

/// One side (scale-up or scale-down) of a threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdCondition {
    /// Value the metric is compared against
    pub value: MetricValue,
    /// How the metric is compared against `value`
    pub operator: ComparisonOperator,
    /// How long the condition must hold continuously before it triggers
    pub duration_secs: u64,
    /// Minimum time after an alert before another one may be raised
    pub cooldown_secs: u64,
}

/// Capacity bounds and step sizes for a resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingPolicy {
    /// Minimum number of instances
    pub min_instances: u32,
    /// Maximum number of instances
    pub max_instances: u32,
    /// Instances added per scale-up
    pub scale_up_by: u32,
    /// Instances removed per scale-down
    pub scale_down_by: u32,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 10,
            scale_up_by: 1,
            scale_down_by: 1,
        }
    }
}

/// A registered per-resource, per-metric scaling policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingThreshold {
    pub id: ThresholdId,
    pub resource_id: ResourceId,
    /// The metric to watch (e.g., "cpu.usage")
    pub metric: String,
    pub scale_up: ThresholdCondition,
    pub scale_down: ThresholdCondition,
    pub policy: ScalingPolicy,
    /// Inactive thresholds are kept but never evaluated
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScalingThreshold {
    /// The condition driving the given direction
    pub fn condition(&self, direction: ScaleDirection) -> &ThresholdCondition {
        match direction {
            ScaleDirection::Up => &self.scale_up,
            ScaleDirection::Down => &self.scale_down,
        }
    }
}

/// Payload for registering a new threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdDefinition {
    pub resource_id: ResourceId,
    pub metric: String,
    pub scale_up: ThresholdCondition,
    pub scale_down: ThresholdCondition,
    #[serde(default)]
    pub policy: ScalingPolicy,
}

/// Partial update of a registered threshold
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThresholdUpdate {
    pub scale_up: Option<ThresholdCondition>,
    pub scale_down: Option<ThresholdCondition>,
    pub policy: Option<ScalingPolicy>,
    pub is_active: Option<bool>,
}

/// Which way a threshold was violated
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScaleDirection {
    /// Over-utilized, add capacity
    #[serde(rename = "scale_up")]
    Up,
    /// Under-utilized, remove capacity
    #[serde(rename = "scale_down")]
    Down,
}

/// Transient sustained-trigger timers for one threshold.
///
/// At most one of the two start times is set at any moment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdState {
    pub scale_up_started_at: Option<Timestamp>,
    pub scale_down_started_at: Option<Timestamp>,
    /// Set once the running episode has triggered, cleared with the timers
    pub fired: bool,
}

/// Outcome of evaluating one threshold against the latest sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdEvaluation {
    pub threshold_id: ThresholdId,
    pub resource_id: ResourceId,
    pub metric: String,
    pub current_value: MetricValue,
    /// Direction of the condition currently holding, if any
    pub direction: Option<ScaleDirection>,
    /// True only on the sample where a sustained condition first reaches its duration
    pub is_triggered: bool,
    /// Continuous violation time so far
    pub duration_secs: u64,
    /// How representative the current value is of recent history (0.1 to 1.0)
    pub confidence: f64,
    pub evaluated_at: Timestamp,
}

/// Alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    /// Severity for a relative deviation `|current - threshold| / threshold`
    pub fn from_deviation(deviation: f64) -> Self {
        if deviation > 0.5 {
            Self::Critical
        } else if deviation > 0.3 {
            Self::High
        } else if deviation > 0.1 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// One step more severe, saturating at critical
    pub fn raised(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High | Self::Critical => Self::Critical,
        }
    }
}

/// Alert lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
}

impl AlertStatus {
    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Acknowledged)
                | (Self::Active, Self::Resolved)
                | (Self::Active, Self::Suppressed)
                | (Self::Acknowledged, Self::Resolved)
                | (Self::Acknowledged, Self::Suppressed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Suppressed)
    }
}

/// The threshold condition that raised an alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertCondition {
    pub metric: String,
    pub operator: ComparisonOperator,
    pub threshold_value: MetricValue,
    pub current_value: MetricValue,
    pub sustained_secs: u64,
}

/// Raised when a threshold stays violated for its full duration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapacityAlert {
    pub id: AlertId,
    pub threshold_id: ThresholdId,
    pub resource_id: ResourceId,
    #[serde(rename = "type")]
    pub alert_type: ScaleDirection,
    pub severity: AlertSeverity,
    pub condition: AlertCondition,
    pub message: String,
    pub status: AlertStatus,
    /// Monotonic, starts at 0
    pub escalation_level: u32,
    pub confidence: f64,
    pub triggered_at: Timestamp,
    pub acknowledged_at: Option<Timestamp>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<Timestamp>,
}

/// Something an escalation step does when it fires
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    /// Send the alert to every active notification channel
    Notify,
    /// Bump the alert severity one step
    RaiseSeverity,
}

/// One link of an alert's escalation chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscalationRule {
    /// Ordering key of the chain
    pub level: u32,
    /// Wait after the previous step (or alert creation) before firing
    pub delay_secs: u64,
    pub actions: Vec<EscalationAction>,
}

/// What a scaling decision asks the actuator to do
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    NoAction,
}

/// Kind of work a plan step performs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StepKind {
    ValidatePrerequisites,
    Scale { from: u32, to: u32 },
    VerifyCapacity { expected: u32 },
    RestoreCapacity { to: u32 },
}

/// A single step of an execution or rollback plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionStep {
    pub order: u32,
    pub name: String,
    pub kind: StepKind,
    pub estimated_duration_secs: u64,
    /// Named checks the caller must satisfy; this library only encodes them
    pub validation_checks: Vec<String>,
}

/// A capacity change derived from an alert, with its forward and inverse plans
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingDecision {
    pub id: String,
    pub resource_id: ResourceId,
    pub threshold_id: ThresholdId,
    pub alert_id: AlertId,
    pub current_capacity: u32,
    pub target_capacity: u32,
    pub action: ScalingAction,
    pub confidence: f64,
    /// False when the confidence gate (or a no-op) says not to touch the actuator
    pub should_execute: bool,
    pub skip_reason: Option<String>,
    /// Human-readable explanation
    pub reason: String,
    pub execution_plan: Vec<ExecutionStep>,
    pub rollback_plan: Vec<ExecutionStep>,
    pub decided_at: Timestamp,
}

/// A resource+metric pair swept by the periodic trend analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TrendTarget {
    pub resource_id: ResourceId,
    pub metric: String,
}

/// Settings for [`crate::decision::ScalingDecisionEngine`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Decisions below this confidence are computed but not executed
    pub confidence_gate: f64,
    /// Number of recent samples used for trend and stability scoring
    pub recent_window: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            confidence_gate: 0.7,
            recent_window: 10,
        }
    }
}

/// Settings for [`crate::analysis::TrendAnalyzer`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analyses with fewer points fail with `InsufficientData`
    pub min_data_points: usize,
    /// Minimum strength for a seasonal pattern to be reported
    pub seasonality_threshold: f64,
    /// Minimum significance for a change point to be reported
    pub change_point_sensitivity: f64,
    /// Number of forecast steps
    pub forecast_horizon: usize,
    /// Slopes with a smaller magnitude count as stable
    pub stable_slope_threshold: f64,
    /// Residual z-score beyond which a point is reported as an anomaly
    pub anomaly_z_threshold: f64,
    pub enable_seasonality: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_data_points: 24,
            seasonality_threshold: 0.1,
            change_point_sensitivity: 2.0,
            forecast_horizon: 168,
            stable_slope_threshold: 0.01,
            anomaly_z_threshold: 3.0,
            enable_seasonality: true,
        }
    }
}

/// Main configuration for the watchtower engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchtowerConfig {
    /// How often to pull metrics and evaluate thresholds (seconds)
    pub evaluation_interval_secs: u64,
    /// Cooldown used when a threshold condition does not set its own
    pub alert_cooldown_secs: u64,
    /// Upper bound on simultaneously active alerts
    pub max_concurrent_alerts: usize,
    /// Resources processed concurrently per evaluation chunk
    pub evaluation_batch_size: usize,
    /// Samples retained per resource for look-back windows
    pub history_size: usize,
    /// How often to run the scheduled trend sweep (seconds)
    pub analysis_interval_secs: u64,
    /// Resource+metric pairs analysed on each sweep
    pub analysis_targets: Vec<TrendTarget>,
    /// Escalation chain applied to every new alert
    pub escalation_rules: Vec<EscalationRule>,
    pub decision: DecisionConfig,
    pub analysis: AnalysisConfig,
    /// Whether to log scaling decisions
    pub enable_logging: bool,
}

impl Default for WatchtowerConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_secs: 60,
            alert_cooldown_secs: 300,
            max_concurrent_alerts: 100,
            evaluation_batch_size: 10,
            history_size: 100,
            analysis_interval_secs: 3600,
            analysis_targets: Vec::new(),
            escalation_rules: Vec::new(),
            decision: DecisionConfig::default(),
            analysis: AnalysisConfig::default(),
            enable_logging: true,
        }
    }
}

/// Builder pattern for easy configuration creation
impl WatchtowerConfig {
    pub fn builder() -> WatchtowerConfigBuilder {
        WatchtowerConfigBuilder::new()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> WatchtowerResult<()> {
        if self.evaluation_interval_secs == 0 {
            return Err(WatchtowerError::config("evaluation_interval_secs must be positive"));
        }
        if self.analysis_interval_secs == 0 {
            return Err(WatchtowerError::config("analysis_interval_secs must be positive"));
        }
        if self.evaluation_batch_size == 0 {
            return Err(WatchtowerError::config("evaluation_batch_size must be positive"));
        }
        if !(0.0..=1.0).contains(&self.decision.confidence_gate) {
            return Err(WatchtowerError::config(format!(
                "confidence_gate must be within [0, 1], got {}",
                self.decision.confidence_gate
            )));
        }
        if self.analysis.min_data_points == 0 {
            return Err(WatchtowerError::config("min_data_points must be positive"));
        }
        Ok(())
    }

    /// Parse a configuration from TOML text
    #[cfg(feature = "config-toml")]
    pub fn from_toml_str(text: &str) -> WatchtowerResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    #[cfg(feature = "config-toml")]
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> WatchtowerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Builder for creating watchtower configurations easily
#[derive(Debug, Default)]
pub struct WatchtowerConfigBuilder {
    config: WatchtowerConfig,
}

impl WatchtowerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluation_interval(mut self, seconds: u64) -> Self {
        self.config.evaluation_interval_secs = seconds;
        self
    }

    pub fn alert_cooldown(mut self, seconds: u64) -> Self {
        self.config.alert_cooldown_secs = seconds;
        self
    }

    pub fn max_concurrent_alerts(mut self, max: usize) -> Self {
        self.config.max_concurrent_alerts = max;
        self
    }

    pub fn evaluation_batch_size(mut self, size: usize) -> Self {
        self.config.evaluation_batch_size = size;
        self
    }

    pub fn history_size(mut self, samples: usize) -> Self {
        self.config.history_size = samples;
        self
    }

    pub fn analysis_interval(mut self, seconds: u64) -> Self {
        self.config.analysis_interval_secs = seconds;
        self
    }

    pub fn add_analysis_target(mut self, resource_id: &str, metric: &str) -> Self {
        self.config.analysis_targets.push(TrendTarget {
            resource_id: resource_id.to_string(),
            metric: metric.to_string(),
        });
        self
    }

    pub fn add_escalation_rule(mut self, rule: EscalationRule) -> Self {
        self.config.escalation_rules.push(rule);
        self
    }

    pub fn confidence_gate(mut self, gate: f64) -> Self {
        self.config.decision.confidence_gate = gate;
        self
    }

    pub fn min_data_points(mut self, points: usize) -> Self {
        self.config.analysis.min_data_points = points;
        self
    }

    pub fn seasonality_threshold(mut self, threshold: f64) -> Self {
        self.config.analysis.seasonality_threshold = threshold;
        self
    }

    pub fn change_point_sensitivity(mut self, sensitivity: f64) -> Self {
        self.config.analysis.change_point_sensitivity = sensitivity;
        self
    }

    pub fn forecast_horizon(mut self, steps: usize) -> Self {
        self.config.analysis.forecast_horizon = steps;
        self
    }

    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    pub fn build(self) -> WatchtowerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_compare_as_named() {
        assert!(ComparisonOperator::GreaterThan.holds(90.0, 80.0));
        assert!(!ComparisonOperator::GreaterThan.holds(80.0, 80.0));
        assert!(ComparisonOperator::GreaterOrEqual.holds(80.0, 80.0));
        assert!(ComparisonOperator::LessThan.holds(10.0, 20.0));
        assert!(ComparisonOperator::LessOrEqual.holds(20.0, 20.0));
        assert!(ComparisonOperator::Equal.holds(0.1 + 0.2, 0.3));
        assert!(ComparisonOperator::NotEqual.holds(1.0, 2.0));
    }

    #[test]
    fn operators_serialize_as_symbols() {
        let json = serde_json::to_string(&ComparisonOperator::GreaterOrEqual).unwrap();
        assert_eq!(json, "\">=\"");
        let parsed: ComparisonOperator = serde_json::from_str("\"!=\"").unwrap();
        assert_eq!(parsed, ComparisonOperator::NotEqual);
    }

    #[test]
    fn negative_durations_do_not_deserialize() {
        let json = r#"{"value": 80.0, "operator": ">", "duration_secs": -5, "cooldown_secs": 0}"#;
        assert!(serde_json::from_str::<ThresholdCondition>(json).is_err());
    }

    #[test]
    fn severity_bands() {
        assert_eq!(AlertSeverity::from_deviation(0.125), AlertSeverity::Medium);
        assert_eq!(AlertSeverity::from_deviation(0.1), AlertSeverity::Low);
        assert_eq!(AlertSeverity::from_deviation(0.31), AlertSeverity::High);
        assert_eq!(AlertSeverity::from_deviation(0.75), AlertSeverity::Critical);
        assert_eq!(AlertSeverity::Critical.raised(), AlertSeverity::Critical);
        assert!(AlertSeverity::High > AlertSeverity::Medium);
    }

    #[test]
    fn alert_lifecycle_transitions() {
        assert!(AlertStatus::Active.can_transition_to(AlertStatus::Acknowledged));
        assert!(AlertStatus::Acknowledged.can_transition_to(AlertStatus::Resolved));
        assert!(!AlertStatus::Resolved.can_transition_to(AlertStatus::Active));
        assert!(!AlertStatus::Acknowledged.can_transition_to(AlertStatus::Acknowledged));
        assert!(AlertStatus::Suppressed.is_terminal());
    }

    #[test]
    fn config_builder_and_validation() {
        let config = WatchtowerConfig::builder()
            .evaluation_interval(15)
            .alert_cooldown(120)
            .add_analysis_target("web", "cpu.usage")
            .confidence_gate(0.5)
            .build();
        assert_eq!(config.evaluation_interval_secs, 15);
        assert_eq!(config.alert_cooldown_secs, 120);
        assert_eq!(config.analysis_targets.len(), 1);
        assert!(config.validate().is_ok());

        let broken = WatchtowerConfig::builder().confidence_gate(1.5).build();
        assert!(matches!(broken.validate(), Err(WatchtowerError::Config { .. })));
        let broken = WatchtowerConfig::builder().evaluation_batch_size(0).build();
        assert!(broken.validate().is_err());
    }
}
