//! Trend and volatility analysis over a metric window
//!
//! Trends are least-squares slopes over the sample index, normalized by the
//! series mean and squashed into [-1, 1]. Volatility is the coefficient of
//! variation clamped into [0, 1].

use crate::models::{MetricKind, MetricTrend, MetricWindow, TrendDirection, TrendSummary};

/// Minimum number of samples for any trend statistic
pub const MIN_TREND_SAMPLES: usize = 2;

/// Gain applied to the normalized slope before squashing
const SLOPE_GAIN: f64 = 10.0;

/// Stateless slope/volatility analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Normalized trend of a metric in [-1, 1]; 0 with fewer than two samples
    pub fn trend(&self, window: &MetricWindow, kind: MetricKind) -> f64 {
        if window.len() < MIN_TREND_SAMPLES {
            return 0.0;
        }
        series_trend(&window.values(kind))
    }

    /// Coefficient of variation of a metric in [0, 1]
    pub fn volatility(&self, window: &MetricWindow, kind: MetricKind) -> f64 {
        if window.len() < MIN_TREND_SAMPLES {
            return 0.0;
        }
        series_volatility(&window.values(kind))
    }

    /// Per-metric trend summary; `None` when the window is too short
    pub fn analyze(&self, window: &MetricWindow) -> Option<TrendSummary> {
        if window.len() < MIN_TREND_SAMPLES {
            return None;
        }

        let metric = |kind| {
            let values = window.values(kind);
            MetricTrend {
                trend: series_trend(&values),
                volatility: series_volatility(&values),
                mean: mean(&values).unwrap_or(0.0),
            }
        };
        let cpu = metric(MetricKind::Cpu);
        let ram = metric(MetricKind::Ram);
        let temperature = metric(MetricKind::Temperature);

        let overall_trend = (cpu.trend + ram.trend + temperature.trend) / 3.0;

        Some(TrendSummary {
            direction: classify(overall_trend),
            overall_trend,
            cpu,
            ram,
            temperature,
        })
    }
}

/// Classify an overall trend value
pub fn classify(overall_trend: f64) -> TrendDirection {
    if overall_trend > 0.3 {
        TrendDirection::Increasing
    } else if overall_trend < -0.3 {
        TrendDirection::Decreasing
    } else if overall_trend.abs() < 0.1 {
        TrendDirection::Stable
    } else {
        TrendDirection::Volatile
    }
}

fn series_trend(values: &[f64]) -> f64 {
    if values.len() < MIN_TREND_SAMPLES {
        return 0.0;
    }
    let avg = match mean(values) {
        Some(m) if m > 0.0 => m,
        _ => return 0.0,
    };
    let normalized = linear_regression_slope(values) / avg;
    (normalized * SLOPE_GAIN).tanh().clamp(-1.0, 1.0)
}

fn series_volatility(values: &[f64]) -> f64 {
    if values.len() < MIN_TREND_SAMPLES {
        return 0.0;
    }
    let avg = match mean(values) {
        Some(m) if m > 0.0 => m,
        _ => return 0.0,
    };
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    (variance.sqrt() / avg).clamp(0.0, 1.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Calculate linear regression slope of values against their index
pub fn linear_regression_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let sum_x: f64 = (0..values.len()).map(|i| i as f64).sum();
    let sum_y: f64 = values.iter().sum();
    let sum_xy: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let sum_x2: f64 = (0..values.len()).map(|i| (i as f64).powi(2)).sum();
    let denom = n * sum_x2 - sum_x.powi(2);
    if denom.abs() < f64::EPSILON {
        return 0.0;
    }
    (n * sum_xy - sum_x * sum_y) / denom
}
