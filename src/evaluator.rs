// src/evaluator.rs

use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::stats;
use crate::types::{
    MetricValue, ResourceId, ResourceMetrics, ScaleDirection, ScalingThreshold, ThresholdEvaluation,
    ThresholdId, ThresholdState, Timestamp,
};

/// Samples preceding the current one that feed the confidence score
pub const CONFIDENCE_WINDOW: usize = 10;

/// Confidence never drops below this
const MIN_CONFIDENCE: f64 = 0.1;

/// Confidence when the history is constant and the current value departs from it
const CONSTANT_HISTORY_OUTLIER_CONFIDENCE: f64 = 0.1;

/// Evaluates thresholds against incoming samples and tracks sustained violations.
///
/// Time is measured with sample timestamps, so replaying the same samples
/// always yields the same evaluations.
#[derive(Debug)]
pub struct ThresholdEvaluator {
    states: HashMap<ThresholdId, ThresholdState>,
    history: HashMap<ResourceId, VecDeque<ResourceMetrics>>,
    history_size: usize,
}

impl ThresholdEvaluator {
    pub fn new(history_size: usize) -> Self {
        Self {
            states: HashMap::new(),
            history: HashMap::new(),
            history_size: history_size.max(1),
        }
    }

    /// Record a batch and evaluate every active threshold whose resource is in it.
    ///
    /// Thresholds whose metric is missing from the latest sample are skipped.
    pub fn evaluate(
        &mut self,
        thresholds: &[ScalingThreshold],
        batch: &[ResourceMetrics],
    ) -> Vec<ThresholdEvaluation> {
        let latest = self.record(batch);

        let mut evaluations = Vec::new();
        for threshold in thresholds.iter().filter(|t| t.is_active) {
            let Some(sample) = latest.get(&threshold.resource_id) else {
                continue;
            };
            let Some(value) = sample.value(&threshold.metric) else {
                continue;
            };

            let preceding = self.preceding_values(&threshold.resource_id, &threshold.metric);
            let confidence = confidence(value, &preceding);
            let state = self.states.entry(threshold.id.clone()).or_default();
            let (direction, is_triggered, duration_secs) = advance(state, threshold, value, sample.timestamp);

            if is_triggered {
                debug!(
                    "Threshold {} triggered: {} = {:.2} for {}s",
                    threshold.id, threshold.metric, value, duration_secs
                );
            }

            evaluations.push(ThresholdEvaluation {
                threshold_id: threshold.id.clone(),
                resource_id: threshold.resource_id.clone(),
                metric: threshold.metric.clone(),
                current_value: value,
                direction,
                is_triggered,
                duration_secs,
                confidence,
                evaluated_at: sample.timestamp,
            });
        }

        evaluations
    }

    /// Drop the timers of a threshold that is no longer evaluated
    pub fn forget_threshold(&mut self, threshold_id: &str) {
        self.states.remove(threshold_id);
    }

    pub fn state(&self, threshold_id: &str) -> Option<&ThresholdState> {
        self.states.get(threshold_id)
    }

    /// Retained samples of a resource, oldest first
    pub fn history(&self, resource_id: &str) -> Vec<ResourceMetrics> {
        self.history
            .get(resource_id)
            .map(|samples| samples.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The last `count` readings of one metric, oldest first
    pub fn recent_values(&self, resource_id: &str, metric: &str, count: usize) -> Vec<MetricValue> {
        let mut values: Vec<MetricValue> = self
            .history
            .get(resource_id)
            .map(|samples| samples.iter().rev().filter_map(|s| s.value(metric)).take(count).collect())
            .unwrap_or_default();
        values.reverse();
        values
    }

    pub fn tracked_resources(&self) -> usize {
        self.history.len()
    }

    /// Append the batch to history and return the latest sample per resource
    fn record(&mut self, batch: &[ResourceMetrics]) -> HashMap<ResourceId, ResourceMetrics> {
        let mut ordered: Vec<&ResourceMetrics> = batch.iter().collect();
        ordered.sort_by_key(|m| m.timestamp);

        let mut latest = HashMap::new();
        for sample in ordered {
            let samples = self.history.entry(sample.resource_id.clone()).or_default();
            samples.push_back(sample.clone());
            while samples.len() > self.history_size {
                samples.pop_front();
            }
            latest.insert(sample.resource_id.clone(), sample.clone());
        }
        latest
    }

    /// Up to [`CONFIDENCE_WINDOW`] readings preceding the newest one
    fn preceding_values(&self, resource_id: &str, metric: &str) -> Vec<MetricValue> {
        let mut values = self.recent_values(resource_id, metric, CONFIDENCE_WINDOW + 1);
        values.pop();
        values
    }
}

/// Move the sustained-trigger state machine forward by one sample.
///
/// Returns the holding direction, whether this sample triggers, and the
/// continuous violation time so far.
fn advance(
    state: &mut ThresholdState,
    threshold: &ScalingThreshold,
    value: MetricValue,
    now: Timestamp,
) -> (Option<ScaleDirection>, bool, u64) {
    let up = threshold.scale_up.operator.holds(value, threshold.scale_up.value);
    let down = threshold.scale_down.operator.holds(value, threshold.scale_down.value);

    let direction = if up {
        ScaleDirection::Up
    } else if down {
        ScaleDirection::Down
    } else {
        *state = ThresholdState::default();
        return (None, false, 0);
    };

    let (started, other) = match direction {
        ScaleDirection::Up => (&mut state.scale_up_started_at, &mut state.scale_down_started_at),
        ScaleDirection::Down => (&mut state.scale_down_started_at, &mut state.scale_up_started_at),
    };
    if other.take().is_some() || started.is_none() {
        state.fired = false;
    }
    let started_at = *started.get_or_insert(now);

    let duration = now.saturating_sub(started_at);
    let required = threshold.condition(direction).duration_secs;
    let triggered = !state.fired && duration >= required;
    if triggered {
        state.fired = true;
    }
    (Some(direction), triggered, duration)
}

/// How typical `current` is of the preceding values: `clamp(1 - |z| / 3, 0.1, 1.0)`.
///
/// Empty history gives full confidence. Constant history gives full
/// confidence for an identical value and the minimum otherwise.
pub fn confidence(current: MetricValue, preceding: &[MetricValue]) -> f64 {
    if preceding.is_empty() {
        return 1.0;
    }
    let mean = stats::mean(preceding);
    let std_dev = stats::std_dev(preceding);
    if std_dev == 0.0 {
        return if (current - mean).abs() < f64::EPSILON {
            1.0
        } else {
            CONSTANT_HISTORY_OUTLIER_CONFIDENCE
        };
    }
    let z = (current - mean) / std_dev;
    (1.0 - z.abs() / 3.0).clamp(MIN_CONFIDENCE, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies;
    use crate::types::ScalingPolicy;
    use crate::utils::metrics_at;

    fn threshold(duration_secs: u64) -> ScalingThreshold {
        let def = policies::cpu_threshold("web", 80.0, 20.0, duration_secs);
        ScalingThreshold {
            id: "t-1".to_string(),
            resource_id: def.resource_id,
            metric: def.metric,
            scale_up: def.scale_up,
            scale_down: def.scale_down,
            policy: ScalingPolicy::default(),
            is_active: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn cpu(ts: u64, value: f64) -> ResourceMetrics {
        metrics_at("web", "deployment", ts, vec![("cpu.usage", value)])
    }

    fn run(evaluator: &mut ThresholdEvaluator, t: &ScalingThreshold, samples: &[(u64, f64)]) -> Vec<ThresholdEvaluation> {
        samples
            .iter()
            .flat_map(|&(ts, v)| evaluator.evaluate(std::slice::from_ref(t), &[cpu(ts, v)]))
            .collect()
    }

    #[test]
    fn sustained_condition_triggers_once() {
        let t = threshold(300);
        let mut evaluator = ThresholdEvaluator::new(100);
        let samples: Vec<(u64, f64)> = (0..=10).map(|i| (i * 60, 90.0)).collect();
        let evaluations = run(&mut evaluator, &t, &samples);

        let triggered: Vec<u64> = evaluations
            .iter()
            .filter(|e| e.is_triggered)
            .map(|e| e.evaluated_at)
            .collect();
        assert_eq!(triggered, vec![300]);
        assert!(evaluations.iter().all(|e| e.direction == Some(ScaleDirection::Up)));
        assert_eq!(evaluations[4].duration_secs, 240);
        assert_eq!(evaluations[10].duration_secs, 600);
    }

    #[test]
    fn single_clean_sample_resets_the_timer() {
        let t = threshold(300);
        let mut evaluator = ThresholdEvaluator::new(100);
        let mut samples: Vec<(u64, f64)> = (0..5).map(|i| (i * 60, 90.0)).collect();
        samples.push((270, 50.0));
        samples.extend((0..=5).map(|i| (300 + i * 60, 90.0)));
        let evaluations = run(&mut evaluator, &t, &samples);

        let reset = &evaluations[5];
        assert_eq!(reset.direction, None);
        assert_eq!(reset.duration_secs, 0);
        assert_eq!(evaluations[6].duration_secs, 0);

        let triggered: Vec<u64> = evaluations
            .iter()
            .filter(|e| e.is_triggered)
            .map(|e| e.evaluated_at)
            .collect();
        assert_eq!(triggered, vec![600]);
    }

    #[test]
    fn zero_duration_triggers_on_first_sample() {
        let t = threshold(0);
        let mut evaluator = ThresholdEvaluator::new(100);
        let evaluations = run(&mut evaluator, &t, &[(10, 95.0), (20, 95.0)]);
        assert!(evaluations[0].is_triggered);
        assert!(!evaluations[1].is_triggered);
    }

    #[test]
    fn switching_direction_starts_a_new_episode() {
        let t = threshold(60);
        let mut evaluator = ThresholdEvaluator::new(100);
        let evaluations = run(&mut evaluator, &t, &[(0, 90.0), (60, 90.0), (120, 10.0), (180, 10.0)]);
        assert!(evaluations[1].is_triggered);
        assert_eq!(evaluations[2].direction, Some(ScaleDirection::Down));
        assert!(!evaluations[2].is_triggered);
        assert!(evaluations[3].is_triggered);
        let state = evaluator.state("t-1").unwrap();
        assert_eq!(state.scale_up_started_at, None);
        assert_eq!(state.scale_down_started_at, Some(120));
    }

    #[test]
    fn scale_up_wins_when_both_conditions_hold() {
        let mut t = threshold(60);
        t.scale_up.value = 50.0;
        t.scale_down.value = 70.0;
        let mut evaluator = ThresholdEvaluator::new(100);

        // 30 only satisfies scale-down; 60 satisfies both
        let evaluations = run(&mut evaluator, &t, &[(0, 30.0), (60, 60.0), (120, 60.0)]);
        assert_eq!(evaluations[0].direction, Some(ScaleDirection::Down));
        assert_eq!(evaluations[1].direction, Some(ScaleDirection::Up));
        assert_eq!(evaluations[1].duration_secs, 0);
        assert!(!evaluations[1].is_triggered);
        assert_eq!(evaluations[2].direction, Some(ScaleDirection::Up));
        assert!(evaluations[2].is_triggered);

        let state = evaluator.state("t-1").unwrap();
        assert_eq!(state.scale_up_started_at, Some(60));
        assert_eq!(state.scale_down_started_at, None);
    }

    #[test]
    fn skips_inactive_and_missing_metrics() {
        let mut inactive = threshold(0);
        inactive.is_active = false;
        let mut evaluator = ThresholdEvaluator::new(100);
        assert!(evaluator.evaluate(&[inactive], &[cpu(0, 99.0)]).is_empty());

        let memory_only = metrics_at("web", "deployment", 5, vec![("memory.usage", 50.0)]);
        assert!(evaluator.evaluate(&[threshold(0)], &[memory_only]).is_empty());

        let other = metrics_at("db", "database", 5, vec![("cpu.usage", 99.0)]);
        assert!(evaluator.evaluate(&[threshold(0)], &[other]).is_empty());
    }

    #[test]
    fn latest_sample_in_batch_is_current() {
        let t = threshold(0);
        let mut evaluator = ThresholdEvaluator::new(100);
        let evaluations = evaluator.evaluate(&[t], &[cpu(120, 50.0), cpu(60, 95.0)]);
        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].current_value, 50.0);
        assert_eq!(evaluations[0].evaluated_at, 120);
    }

    #[test]
    fn history_is_bounded() {
        let mut evaluator = ThresholdEvaluator::new(3);
        for ts in 0..5 {
            evaluator.evaluate(&[], &[cpu(ts, ts as f64)]);
        }
        let history = evaluator.history("web");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].timestamp, 2);
        assert_eq!(evaluator.recent_values("web", "cpu.usage", 2), vec![3.0, 4.0]);
    }

    #[test]
    fn confidence_edges() {
        assert_eq!(confidence(42.0, &[]), 1.0);
        assert_eq!(confidence(50.0, &[50.0; 5]), 1.0);
        assert_eq!(confidence(51.0, &[50.0; 5]), 0.1);
        assert_eq!(confidence(1000.0, &[10.0, 20.0, 30.0]), 0.1);
    }

    #[test]
    fn confidence_falls_with_distance_from_mean() {
        let history = [40.0, 45.0, 50.0, 55.0, 60.0];
        let mut previous = f64::INFINITY;
        for offset in 0..20 {
            let c = confidence(50.0 + offset as f64 * 2.0, &history);
            assert!(c <= previous);
            assert!((0.1..=1.0).contains(&c));
            previous = c;
        }
    }

    #[test]
    fn confidence_uses_preceding_samples_only() {
        let t = threshold(600);
        let mut evaluator = ThresholdEvaluator::new(100);
        let evaluations = run(&mut evaluator, &t, &[(0, 50.0), (60, 50.0), (120, 50.0)]);
        assert_eq!(evaluations[0].confidence, 1.0);
        assert_eq!(evaluations[2].confidence, 1.0);
    }
}
