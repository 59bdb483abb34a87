//! Trend analysis: ties decomposition, seasonality, change points and forecasting together

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analysis::change_point::{ChangePoint, ChangePointDetector};
use crate::analysis::decomposition::{TimeSeriesDecomposer, TrendComponents};
use crate::analysis::forecast::{Forecast, ForecastEngine};
use crate::analysis::seasonality::{SeasonalPattern, SeasonalityDetector};
use crate::error::{WatchtowerError, WatchtowerResult};
use crate::series::TimeSeries;
use crate::stats::{self, SummaryStatistics};
use crate::types::{AnalysisConfig, ResourceId, Timestamp};
use crate::utils::{current_timestamp, new_id};

/// Slope magnitude beyond which a scaling recommendation is made
const SCALING_SLOPE: f64 = 0.1;

/// Seasonal strength beyond which schedule-based scaling is suggested
const STRONG_SEASONALITY: f64 = 0.3;

/// Change points in this trailing share of the series count as recent
const RECENT_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Compact seasonality summary carried by every trend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityDescriptor {
    pub detected: bool,
    pub period: Option<usize>,
    pub strength: f64,
}

/// A point whose residual sits far outside the residual distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub index: usize,
    pub timestamp: Timestamp,
    pub value: f64,
    /// Trend plus seasonal component at this index
    pub expected: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ScaleUp,
    ScaleDown,
    Optimize,
    Investigate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecommendation {
    pub kind: RecommendationKind,
    pub priority: RecommendationPriority,
    pub description: String,
}

/// Snapshot produced by one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityTrend {
    pub id: String,
    pub resource_id: ResourceId,
    pub metric: String,
    pub analyzed_at: Timestamp,
    pub data_points: usize,
    pub direction: TrendDirection,
    /// Least-squares slope per sample
    pub slope: f64,
    /// Pearson correlation between sample index and value
    pub correlation: f64,
    pub seasonality: SeasonalityDescriptor,
    pub seasonal_pattern: Option<SeasonalPattern>,
    pub statistics: SummaryStatistics,
    pub components: TrendComponents,
    pub change_points: Vec<ChangePoint>,
    pub forecast: Forecast,
    pub anomalies: Vec<Anomaly>,
    /// Highest priority first
    pub recommendations: Vec<TrendRecommendation>,
}

/// Runs the full analysis pipeline over a metric window
#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    config: AnalysisConfig,
    decomposer: TimeSeriesDecomposer,
    seasonality: SeasonalityDetector,
    change_points: ChangePointDetector,
    forecaster: ForecastEngine,
}

impl TrendAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            decomposer: TimeSeriesDecomposer::new(),
            seasonality: SeasonalityDetector::new(config.seasonality_threshold),
            change_points: ChangePointDetector::new(config.change_point_sensitivity),
            forecaster: ForecastEngine::new(config.forecast_horizon),
            config,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse one series under a fresh trend id
    pub fn analyze(&self, series: &TimeSeries) -> WatchtowerResult<CapacityTrend> {
        self.analyze_with_id(new_id(), series)
    }

    /// Analyse one series; fails below `min_data_points`
    pub fn analyze_with_id(&self, trend_id: String, series: &TimeSeries) -> WatchtowerResult<CapacityTrend> {
        if series.len() < self.config.min_data_points {
            return Err(WatchtowerError::insufficient_data(self.config.min_data_points, series.len()));
        }

        let values = series.values();
        let fit = stats::linear_regression(&values);
        let direction = if fit.slope.abs() < self.config.stable_slope_threshold {
            TrendDirection::Stable
        } else if fit.slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        let statistics = SummaryStatistics::from_values(&values);
        let components = self.decomposer.decompose(series);
        let seasonal_pattern = if self.config.enable_seasonality {
            self.seasonality.detect(series)
        } else {
            None
        };
        let seasonality = match &seasonal_pattern {
            Some(pattern) => SeasonalityDescriptor {
                detected: true,
                period: Some(pattern.period),
                strength: pattern.strength,
            },
            None => SeasonalityDescriptor::default(),
        };
        let change_points = self.change_points.detect(series);
        let forecast = self.forecaster.generate(series, seasonal_pattern.as_ref());
        let anomalies = self.find_anomalies(series, &components);
        let recommendations = recommend(fit.slope, &seasonality, &change_points, &anomalies, series.len());

        debug!(
            "Trend for {}/{}: {:?} slope {:.4}, {} change points, {} anomalies",
            series.resource_id,
            series.metric,
            direction,
            fit.slope,
            change_points.len(),
            anomalies.len()
        );

        Ok(CapacityTrend {
            id: trend_id,
            resource_id: series.resource_id.clone(),
            metric: series.metric.clone(),
            analyzed_at: current_timestamp(),
            data_points: series.len(),
            direction,
            slope: fit.slope,
            correlation: fit.correlation,
            seasonality,
            seasonal_pattern,
            statistics,
            components,
            change_points,
            forecast,
            anomalies,
            recommendations,
        })
    }

    /// Analyse many series; failures are logged and left out of the result
    pub fn analyze_batch(&self, series: &[TimeSeries]) -> Vec<CapacityTrend> {
        series
            .iter()
            .filter_map(|s| match self.analyze(s) {
                Ok(trend) => Some(trend),
                Err(e) => {
                    warn!("Trend analysis for {}/{} failed: {}", s.resource_id, s.metric, e);
                    None
                }
            })
            .collect()
    }

    fn find_anomalies(&self, series: &TimeSeries, components: &TrendComponents) -> Vec<Anomaly> {
        let residual_mean = stats::mean(&components.residual);
        let residual_std = stats::std_dev(&components.residual);
        if residual_std == 0.0 {
            return Vec::new();
        }

        components
            .residual
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                let z_score = (r - residual_mean) / residual_std;
                if z_score.abs() <= self.config.anomaly_z_threshold {
                    return None;
                }
                let point = series.points[i];
                Some(Anomaly {
                    index: i,
                    timestamp: point.timestamp,
                    value: point.value,
                    expected: components.trend[i] + components.seasonal[i],
                    z_score,
                })
            })
            .collect()
    }
}

fn recommend(
    slope: f64,
    seasonality: &SeasonalityDescriptor,
    change_points: &[ChangePoint],
    anomalies: &[Anomaly],
    len: usize,
) -> Vec<TrendRecommendation> {
    let mut recommendations = Vec::new();

    if slope > SCALING_SLOPE {
        recommendations.push(TrendRecommendation {
            kind: RecommendationKind::ScaleUp,
            priority: RecommendationPriority::High,
            description: format!("Usage is growing by {:.3} per sample; plan additional capacity", slope),
        });
    } else if slope < -SCALING_SLOPE {
        recommendations.push(TrendRecommendation {
            kind: RecommendationKind::ScaleDown,
            priority: RecommendationPriority::Medium,
            description: format!("Usage is shrinking by {:.3} per sample; capacity can be reduced", slope.abs()),
        });
    }

    if seasonality.detected && seasonality.strength > STRONG_SEASONALITY {
        let period = seasonality.period.unwrap_or_default();
        recommendations.push(TrendRecommendation {
            kind: RecommendationKind::Optimize,
            priority: RecommendationPriority::Medium,
            description: format!(
                "Strong {}-sample seasonality (strength {:.2}); schedule capacity ahead of peaks",
                period, seasonality.strength
            ),
        });
    }

    let recent_start = len - ((len as f64 * RECENT_FRACTION).ceil() as usize).min(len);
    let recent = change_points.iter().filter(|cp| cp.index >= recent_start).count();
    if recent > 0 {
        recommendations.push(TrendRecommendation {
            kind: RecommendationKind::Investigate,
            priority: RecommendationPriority::High,
            description: format!("{} recent change point(s) in usage; investigate the cause", recent),
        });
    }

    if !anomalies.is_empty() {
        recommendations.push(TrendRecommendation {
            kind: RecommendationKind::Investigate,
            priority: RecommendationPriority::Low,
            description: format!("{} anomalous sample(s) outside the expected range", anomalies.len()),
        });
    }

    // Stable sort keeps rule order within one priority
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}
