//! Linear-trend forecasting with optional seasonal shaping

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::analysis::seasonality::SeasonalPattern;
use crate::series::TimeSeries;
use crate::stats;

/// Forecast steps that count as short term
pub const SHORT_TERM_STEPS: usize = 24;

/// Below this many points the forecast carries maximal uncertainty
const MIN_HISTORY_POINTS: usize = 5;

/// Patterns weaker than this leave the linear forecast untouched
const SEASONAL_ADJUSTMENT_STRENGTH: f64 = 0.3;

/// Amplitude of the multiplicative seasonal factor
const SEASONAL_FACTOR_AMPLITUDE: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Forecast {
    /// Steps 1 to 24
    pub short_term: Vec<f64>,
    /// Steps 25 and beyond
    pub long_term: Vec<f64>,
    /// Historical coefficient of variation clamped to [0.1, 1.0]
    pub uncertainty: f64,
}

impl Forecast {
    /// All forecast steps in order
    pub fn values(&self) -> impl Iterator<Item = &f64> {
        self.short_term.iter().chain(self.long_term.iter())
    }
}

#[derive(Debug, Clone)]
pub struct ForecastEngine {
    horizon: usize,
}

impl ForecastEngine {
    pub fn new(horizon: usize) -> Self {
        Self { horizon }
    }

    pub fn generate(&self, series: &TimeSeries, seasonality: Option<&SeasonalPattern>) -> Forecast {
        self.generate_values(&series.values(), seasonality)
    }

    pub fn generate_values(&self, values: &[f64], seasonality: Option<&SeasonalPattern>) -> Forecast {
        let uncertainty = uncertainty(values);
        let Some(&last) = values.last() else {
            return Forecast {
                uncertainty,
                ..Forecast::default()
            };
        };

        let slope = stats::linear_regression(values).slope;
        let seasonal = seasonality.filter(|p| p.strength > SEASONAL_ADJUSTMENT_STRENGTH && p.period > 0);
        let n = values.len();

        let mut points: Vec<f64> = (1..=self.horizon)
            .map(|step| {
                let base = last + slope * step as f64;
                match seasonal {
                    Some(pattern) => {
                        let phase = (n - 1 + step) % pattern.period;
                        let angle = 2.0 * PI * phase as f64 / pattern.period as f64;
                        base * (1.0 + SEASONAL_FACTOR_AMPLITUDE * angle.sin())
                    }
                    None => base,
                }
            })
            .collect();

        let long_term = if points.len() > SHORT_TERM_STEPS {
            points.split_off(SHORT_TERM_STEPS)
        } else {
            Vec::new()
        };

        Forecast {
            short_term: points,
            long_term,
            uncertainty,
        }
    }
}

fn uncertainty(values: &[f64]) -> f64 {
    if values.len() < MIN_HISTORY_POINTS {
        return 1.0;
    }
    stats::coefficient_of_variation(values)
        .unwrap_or(1.0)
        .clamp(0.1, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extrapolates_linear_trend() {
        let values: Vec<f64> = (0..48).map(|i| 10.0 + 2.0 * i as f64).collect();
        let forecast = ForecastEngine::new(30).generate_values(&values, None);
        assert_eq!(forecast.short_term.len(), 24);
        assert_eq!(forecast.long_term.len(), 6);
        let last = *values.last().unwrap();
        assert!((forecast.short_term[0] - (last + 2.0)).abs() < 1e-9);
        assert!((forecast.long_term[5] - (last + 60.0)).abs() < 1e-9);
    }

    #[test]
    fn short_horizon_has_no_long_term() {
        let forecast = ForecastEngine::new(10).generate_values(&[5.0; 20], None);
        assert_eq!(forecast.short_term, vec![5.0; 10]);
        assert!(forecast.long_term.is_empty());
    }

    #[test]
    fn uncertainty_is_bounded() {
        let few = ForecastEngine::new(5).generate_values(&[1.0, 2.0, 3.0, 4.0], None);
        assert_eq!(few.uncertainty, 1.0);

        let steady = ForecastEngine::new(5).generate_values(&[100.0; 30], None);
        assert_eq!(steady.uncertainty, 0.1);

        let wild: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 1.0 } else { 500.0 }).collect();
        let noisy = ForecastEngine::new(5).generate_values(&wild, None);
        assert!(noisy.uncertainty <= 1.0 && noisy.uncertainty >= 0.1);

        let empty = ForecastEngine::new(5).generate_values(&[], None);
        assert_eq!(empty.uncertainty, 1.0);
        assert!(empty.short_term.is_empty());
    }

    #[test]
    fn strong_seasonality_shapes_forecast() {
        let values = vec![50.0; 48];
        let pattern = SeasonalPattern {
            period: 24,
            strength: 0.5,
            confidence: 0.8,
            peaks: vec![],
            troughs: vec![],
            seasonal_values: vec![],
        };
        let shaped = ForecastEngine::new(24).generate_values(&values, Some(&pattern));
        // Step 6 lands on phase (47 + 6) % 24 = 5, step 18 on phase 17
        assert!(shaped.short_term[5] > 50.0);
        assert!(shaped.short_term[17] < 50.0);
        assert!(shaped.values().all(|v| (v - 50.0).abs() <= 5.0 + 1e-9));

        let weak = SeasonalPattern { strength: 0.2, ..pattern };
        let flat = ForecastEngine::new(24).generate_values(&values, Some(&weak));
        assert!(flat.values().all(|v| *v == 50.0));
    }
}
