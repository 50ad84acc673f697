//! Failure prediction
//!
//! Three predictors produce a [`RiskReport`]:
//! - [`RuleBasedPredictor`]: thresholds, weights and trends, always available
//! - [`ModelPredictor`]: the trained classifier/regressor pair, when installed
//! - [`EnsemblePredictor`]: blends the two, falling back to rules alone

mod advice;
mod ensemble;
mod model;
mod rules;

pub use advice::{build_alerts, build_recommendations};
pub use ensemble::EnsemblePredictor;
pub use model::{ModelPrediction, ModelPredictor};
pub use rules::{failure_probability, failure_timing, RuleBasedPredictor};

use crate::models::{MetricSample, MetricWindow, RiskReport};

/// Anything that turns a sample (plus optional history) into a report
pub trait RiskPredictor: Send + Sync {
    fn predict(&self, sample: &MetricSample, window: Option<&MetricWindow>) -> RiskReport;

    fn name(&self) -> &'static str;
}
