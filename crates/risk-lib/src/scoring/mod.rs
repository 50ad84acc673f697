//! Risk scoring and trend analysis

mod risk;
mod trend;

pub use risk::{battery_threshold_risk, threshold_risk, RiskBreakdown, RiskScorer};
pub use trend::{classify, linear_regression_slope, TrendAnalyzer, MIN_TREND_SAMPLES};
