//! Historical metric analysis: decomposition, seasonality, change points and forecasts

pub mod change_point;
pub mod decomposition;
pub mod forecast;
pub mod seasonality;
pub mod trend;

pub use change_point::{ChangePoint, ChangePointDetector, ChangeType};
pub use decomposition::{TimeSeriesDecomposer, TrendComponents};
pub use forecast::{Forecast, ForecastEngine};
pub use seasonality::{SeasonalPattern, SeasonalityDetector};
pub use trend::{
    Anomaly, CapacityTrend, RecommendationKind, RecommendationPriority, SeasonalityDescriptor,
    TrendAnalyzer, TrendDirection, TrendRecommendation,
};
