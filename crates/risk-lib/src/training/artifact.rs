//! Trained model bundle and its metadata

use super::classifier::SoftmaxClassifier;
use super::dataset::ClassCounts;
use super::regressor::GradientBoostedRegressor;
use super::scaler::StandardScaler;
use crate::error::Result;
use crate::models::{ClassProbabilities, HealthClass, NUM_FEATURES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bumped whenever the blob layout changes
pub const FORMAT_VERSION: u32 = 1;

/// Where the training rows came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataOrigin {
    Historical,
    Synthetic,
}

impl std::fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataOrigin::Historical => write!(f, "historical"),
            DataOrigin::Synthetic => write!(f, "synthetic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained: bool,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    /// Classifier accuracy on the held-out split, in [0, 1]
    pub accuracy: f64,
    /// Regressor RMSE on the held-out split, in risk points
    pub rmse: f64,
    /// Assigned by the store on save
    #[serde(default)]
    pub version: String,
    pub format_version: u32,
    pub data_origin: DataOrigin,
    pub class_counts: ClassCounts,
    /// SHA-256 of each blob, keyed by file name
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

/// Output of the fitted model for one feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOutput {
    pub predicted_status: HealthClass,
    pub risk_score: f64,
    /// P(critical) in percent
    pub failure_probability: f64,
    pub probabilities: ClassProbabilities,
}

/// Scaler, classifier and regressor fitted together
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub scaler: StandardScaler,
    pub classifier: SoftmaxClassifier,
    pub regressor: GradientBoostedRegressor,
    pub metadata: ModelMetadata,
}

impl TrainedModel {
    /// Structural check of all three components
    pub fn validate(&self) -> Result<()> {
        self.scaler.validate()?;
        self.classifier.validate()?;
        self.regressor.validate()
    }

    pub fn predict(&self, features: &[f64; NUM_FEATURES]) -> ModelOutput {
        let scaled = self.scaler.transform(features);
        let probs = self.classifier.predict_proba(&scaled);
        let predicted_status = self.classifier.predict(&scaled);
        let risk_score = self.regressor.predict(&scaled).clamp(0.0, 100.0);

        ModelOutput {
            predicted_status,
            risk_score,
            failure_probability: probs[HealthClass::Critical.index()] * 100.0,
            probabilities: ClassProbabilities::from_fractions(&probs),
        }
    }
}
