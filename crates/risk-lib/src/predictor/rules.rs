//! Rule-based failure prediction
//!
//! Always available. Combines the risk scorer and the trend analyzer into a
//! complete report. Pure: the same sample, window and configuration always
//! produce the same report.

use super::advice::{build_alerts, build_recommendations};
use super::RiskPredictor;
use crate::config::ScoringConfig;
use crate::models::{
    FailurePrediction, MetricSample, MetricWindow, Provenance, RiskLevel, RiskReport,
    TimeToFailure, TrendDirection, TrendSummary,
};
use crate::scoring::{RiskScorer, TrendAnalyzer};
use std::sync::Arc;

/// Rule-based predictor bound to one configuration snapshot
#[derive(Debug, Clone)]
pub struct RuleBasedPredictor {
    config: Arc<ScoringConfig>,
    analyzer: TrendAnalyzer,
}

impl RuleBasedPredictor {
    pub fn new(config: Arc<ScoringConfig>) -> Self {
        Self {
            config,
            analyzer: TrendAnalyzer::new(),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Produce a full report for a sample and optional history window
    pub fn predict(&self, sample: &MetricSample, window: Option<&MetricWindow>) -> RiskReport {
        let sample = sample.clone().sanitized();
        let scorer = RiskScorer::new(&self.config);
        let breakdown = scorer.score(&sample, window);

        let trend_analysis = window.and_then(|w| self.analyzer.analyze(w));
        let direction = trend_analysis.as_ref().map(|t| t.direction);

        let failure_probability = failure_probability(breakdown.total, direction);
        let risk_level = RiskLevel::from_score(breakdown.total);
        let (prediction, time_to_failure) = failure_timing(failure_probability, direction);

        let alerts = build_alerts(&sample, window, &self.config.thresholds);
        let recommendations =
            build_recommendations(risk_level, &breakdown.factors, trend_analysis.as_ref());

        RiskReport {
            device_id: sample.device_id.clone(),
            generated_at: sample.timestamp,
            total_risk: breakdown.total,
            risk_level,
            failure_probability,
            prediction,
            time_to_failure,
            alerts,
            recommendations,
            trend_analysis,
            risk_factors: breakdown.factors,
            provenance: Provenance::RuleBased,
            model: None,
        }
    }

    /// Trend summary for a window, if it is long enough
    pub fn trend(&self, window: &MetricWindow) -> Option<TrendSummary> {
        self.analyzer.analyze(window)
    }
}

impl RiskPredictor for RuleBasedPredictor {
    fn predict(&self, sample: &MetricSample, window: Option<&MetricWindow>) -> RiskReport {
        RuleBasedPredictor::predict(self, sample, window)
    }

    fn name(&self) -> &'static str {
        "rule_based"
    }
}

/// Failure probability in [0, 100] from the total risk and window trend
pub fn failure_probability(total_risk: f64, trend: Option<TrendDirection>) -> f64 {
    let base = if total_risk >= 80.0 {
        60.0 + (total_risk - 80.0) * 1.75
    } else if total_risk >= 50.0 {
        30.0 + (total_risk - 50.0) * 1.33
    } else {
        total_risk * 0.6
    };

    let adjustment = match trend {
        Some(TrendDirection::Increasing) => 15.0,
        Some(TrendDirection::Decreasing) => -8.0,
        Some(TrendDirection::Volatile) => 5.0,
        Some(TrendDirection::Stable) | None => 0.0,
    };

    (base + adjustment).clamp(0.0, 100.0)
}

/// Prediction bucket and time-to-failure label for a failure probability
pub fn failure_timing(
    failure_probability: f64,
    trend: Option<TrendDirection>,
) -> (FailurePrediction, TimeToFailure) {
    if failure_probability > 70.0 {
        if trend == Some(TrendDirection::Increasing) {
            (FailurePrediction::FailureImminent, TimeToFailure::OneToTwoDays)
        } else {
            (FailurePrediction::FailureImminent, TimeToFailure::TwoToFourDays)
        }
    } else if failure_probability > 40.0 {
        (FailurePrediction::FailureLikely, TimeToFailure::ThreeToSevenDays)
    } else if failure_probability > 20.0 {
        (FailurePrediction::FailurePossible, TimeToFailure::OneToTwoWeeks)
    } else {
        (FailurePrediction::Normal, TimeToFailure::NotExpected)
    }
}
