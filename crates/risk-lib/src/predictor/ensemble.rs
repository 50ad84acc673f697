//! Ensemble of the trained model and the rule-based predictor
//!
//! With a model installed the report's total risk is
//! `ml_weight * model_risk + (1 - ml_weight) * rule_risk`, the failure
//! probability is the model's P(critical), and level and timing are
//! recomputed from those. Alerts, recommendations and trend come from the
//! rule-based report. Without a usable model the rule-based report is
//! returned as is.

use super::model::{ModelPrediction, ModelPredictor};
use super::rules::{failure_timing, RuleBasedPredictor};
use super::RiskPredictor;
use crate::config::ConfigHandle;
use crate::models::{
    MetricSample, MetricWindow, ModelSummary, Provenance, RiskLevel, RiskReport,
};
use crate::observability::{EngineMetrics, StructuredLogger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct EnsemblePredictor {
    config: ConfigHandle,
    model: Arc<ModelPredictor>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    /// Set while reports are served by the rule-based path alone
    falling_back: Arc<AtomicBool>,
}

impl EnsemblePredictor {
    pub fn new(config: ConfigHandle, model: Arc<ModelPredictor>, logger: StructuredLogger) -> Self {
        Self {
            config,
            model,
            metrics: EngineMetrics::new(),
            logger,
            falling_back: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True when the last report came from the rule-based path alone
    pub fn is_falling_back(&self) -> bool {
        self.falling_back.load(Ordering::Relaxed)
    }

    pub fn model(&self) -> &Arc<ModelPredictor> {
        &self.model
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn predict(&self, sample: &MetricSample, window: Option<&MetricWindow>) -> RiskReport {
        let config = self.config.snapshot();
        let ml_weight = config.ensemble.ml_weight;
        let rule_report = RuleBasedPredictor::new(config).predict(sample, window);

        match self.model.try_predict(sample) {
            Ok(ml) => {
                self.falling_back.store(false, Ordering::Relaxed);
                blend(rule_report, &ml, ml_weight)
            }
            Err(e) => {
                // one event per switch to rules; individual requests only at debug
                if !self.falling_back.swap(true, Ordering::Relaxed) {
                    self.logger.log_model_fallback(&sample.device_id, &e.to_string());
                } else {
                    debug!(device_id = %sample.device_id, reason = %e, "Ensemble falling back to rules");
                }
                self.metrics.inc_model_fallbacks();
                rule_report
            }
        }
    }
}

impl RiskPredictor for EnsemblePredictor {
    fn predict(&self, sample: &MetricSample, window: Option<&MetricWindow>) -> RiskReport {
        EnsemblePredictor::predict(self, sample, window)
    }

    fn name(&self) -> &'static str {
        "ensemble"
    }
}

fn blend(rule_report: RiskReport, ml: &ModelPrediction, ml_weight: f64) -> RiskReport {
    let total_risk =
        (ml.risk_score * ml_weight + rule_report.total_risk * (1.0 - ml_weight)).clamp(0.0, 100.0);
    let failure_probability = ml.failure_probability.clamp(0.0, 100.0);
    let direction = rule_report.trend_analysis.as_ref().map(|t| t.direction);
    let (prediction, time_to_failure) = failure_timing(failure_probability, direction);

    RiskReport {
        total_risk,
        risk_level: RiskLevel::from_score(total_risk),
        failure_probability,
        prediction,
        time_to_failure,
        provenance: Provenance::Ensemble,
        model: Some(ModelSummary {
            version: ml.model_version.clone(),
            accuracy: ml.accuracy,
            rmse: ml.rmse,
            predicted_status: ml.predicted_status,
            status_probabilities: ml.status_probabilities,
        }),
        ..rule_report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::models::{ClassProbabilities, FailurePrediction, HealthClass, TimeToFailure};
    use crate::training::{fit_model, synthesize, DataOrigin, TrainerConfig};

    fn sample() -> MetricSample {
        MetricSample::new("device-1", 1_700_000_000)
            .with_usage(95.0, 50.0, 50.0)
            .with_temperature(40.0)
            .with_battery(80.0)
    }

    fn ml(risk_score: f64, failure_probability: f64) -> ModelPrediction {
        ModelPrediction {
            predicted_status: HealthClass::Critical,
            risk_score,
            failure_probability,
            status_probabilities: ClassProbabilities {
                healthy: 5.0,
                warning: 5.0,
                critical: 90.0,
            },
            provenance: Provenance::Ml,
            model_version: "v0001".to_string(),
            accuracy: 0.9,
            rmse: 4.0,
        }
    }

    #[test]
    fn test_falls_back_to_rules_without_model() {
        let ensemble = EnsemblePredictor::new(
            ConfigHandle::default(),
            Arc::new(ModelPredictor::new_without_model()),
            StructuredLogger::new("test"),
        );
        let rules = RuleBasedPredictor::new(Arc::new(ScoringConfig::default()));

        let report = ensemble.predict(&sample(), None);
        assert_eq!(report, rules.predict(&sample(), None));
        assert_eq!(report.provenance, Provenance::RuleBased);
        assert!(report.model.is_none());
    }

    #[test]
    fn test_blend_weights_model_and_rules() {
        let rules = RuleBasedPredictor::new(Arc::new(ScoringConfig::default()));
        let rule_report = rules.predict(&sample(), None);
        let rule_total = rule_report.total_risk;

        let report = blend(rule_report.clone(), &ml(90.0, 90.0), 0.7);

        assert!((report.total_risk - (0.7 * 90.0 + 0.3 * rule_total)).abs() < 1e-9);
        assert_eq!(report.failure_probability, 90.0);
        assert_eq!(report.prediction, FailurePrediction::FailureImminent);
        assert_eq!(report.time_to_failure, TimeToFailure::TwoToFourDays);
        assert_eq!(report.risk_level, RiskLevel::from_score(report.total_risk));
        assert_eq!(report.alerts, rule_report.alerts);
        assert_eq!(report.recommendations, rule_report.recommendations);
        assert_eq!(report.provenance, Provenance::Ensemble);
        assert_eq!(report.model.as_ref().unwrap().version, "v0001");
    }

    #[test]
    fn test_zero_weight_keeps_rule_risk() {
        let rules = RuleBasedPredictor::new(Arc::new(ScoringConfig::default()));
        let rule_report = rules.predict(&sample(), None);
        let report = blend(rule_report.clone(), &ml(10.0, 5.0), 0.0);

        assert!((report.total_risk - rule_report.total_risk).abs() < 1e-9);
        assert_eq!(report.prediction, FailurePrediction::Normal);
    }

    #[test]
    fn test_ensemble_with_trained_model() {
        let model = fit_model(
            &synthesize(150, 42, 0.1),
            DataOrigin::Synthetic,
            &TrainerConfig::fast(),
        )
        .unwrap();
        let ensemble = EnsemblePredictor::new(
            ConfigHandle::default(),
            Arc::new(ModelPredictor::with_model(model)),
            StructuredLogger::new("test"),
        );

        let report = ensemble.predict(&sample(), None);
        assert_eq!(report.provenance, Provenance::Ensemble);
        assert!((0.0..=100.0).contains(&report.total_risk));
        assert!((0.0..=100.0).contains(&report.failure_probability));
        assert!(report.model.is_some());
    }

    #[test]
    fn test_fallback_state_follows_model() {
        let model = Arc::new(ModelPredictor::new_without_model());
        let ensemble = EnsemblePredictor::new(
            ConfigHandle::default(),
            Arc::clone(&model),
            StructuredLogger::new("test"),
        );
        assert!(!ensemble.is_falling_back());

        ensemble.predict(&sample(), None);
        assert!(ensemble.is_falling_back());

        let trained = fit_model(
            &synthesize(150, 7, 0.1),
            DataOrigin::Synthetic,
            &TrainerConfig::fast(),
        )
        .unwrap();
        model.install(Arc::new(trained));
        assert_eq!(ensemble.predict(&sample(), None).provenance, Provenance::Ensemble);
        assert!(!ensemble.is_falling_back());

        model.clear();
        assert_eq!(ensemble.predict(&sample(), None).provenance, Provenance::RuleBased);
        assert!(ensemble.is_falling_back());
    }
}
