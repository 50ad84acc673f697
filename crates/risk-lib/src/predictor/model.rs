//! Trained-model predictor with hot swap
//!
//! Holds at most one [`TrainedModel`]. Training installs a new one with
//! [`ModelPredictor::install`]; readers that already cloned the previous
//! `Arc` finish on it, so a swap never mixes the old scaler with the new
//! classifier.

use crate::error::{EngineError, Result};
use crate::models::{ClassProbabilities, HealthClass, MetricSample, Provenance};
use crate::training::{ModelMetadata, ModelStore, TrainedModel};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Output of the model path for one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    pub predicted_status: HealthClass,
    /// Regressor output clamped into [0, 100]
    pub risk_score: f64,
    /// P(critical) in percent
    pub failure_probability: f64,
    pub status_probabilities: ClassProbabilities,
    pub provenance: Provenance,
    pub model_version: String,
    pub accuracy: f64,
    pub rmse: f64,
}

#[derive(Debug, Default)]
pub struct ModelPredictor {
    model: RwLock<Option<Arc<TrainedModel>>>,
}

impl ModelPredictor {
    /// Predictor with no model; every prediction reports unavailable
    pub fn new_without_model() -> Self {
        Self::default()
    }

    pub fn with_model(model: TrainedModel) -> Self {
        Self {
            model: RwLock::new(Some(Arc::new(model))),
        }
    }

    /// Install the store's current model, if it has one.
    ///
    /// An unreadable or corrupted artifact is logged and leaves the
    /// predictor empty.
    pub fn load_from(store: &ModelStore) -> Self {
        match store.load() {
            Ok(Some(model)) => {
                info!(version = %model.metadata.version, "Loaded model from store");
                Self::with_model(model)
            }
            Ok(None) => {
                debug!(path = %store.root().display(), "No stored model, using rule-based predictions");
                Self::new_without_model()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load stored model, using rule-based predictions");
                Self::new_without_model()
            }
        }
    }

    pub fn install(&self, model: Arc<TrainedModel>) {
        let version = model.metadata.version.clone();
        match self.model.write() {
            Ok(mut guard) => *guard = Some(model),
            Err(poisoned) => *poisoned.into_inner() = Some(model),
        }
        info!(version = %version, "Model installed");
    }

    pub fn clear(&self) {
        match self.model.write() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    /// The installed model, if any
    pub fn current(&self) -> Option<Arc<TrainedModel>> {
        match self.model.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.current().map(|m| m.metadata.clone())
    }

    /// Predict with the installed model
    pub fn try_predict(&self, sample: &MetricSample) -> Result<ModelPrediction> {
        let model = self
            .current()
            .ok_or_else(|| EngineError::ModelUnavailable("no trained model loaded".to_string()))?;

        let sample = sample.clone().sanitized();
        let output = model.predict(&sample.features());
        if !output.risk_score.is_finite() || !output.failure_probability.is_finite() {
            return Err(EngineError::ModelUnavailable(format!(
                "model {} produced a non-finite output",
                model.metadata.version
            )));
        }

        Ok(ModelPrediction {
            predicted_status: output.predicted_status,
            risk_score: output.risk_score,
            failure_probability: output.failure_probability,
            status_probabilities: output.probabilities,
            provenance: Provenance::Ml,
            model_version: model.metadata.version.clone(),
            accuracy: model.metadata.accuracy,
            rmse: model.metadata.rmse,
        })
    }

    /// Like [`try_predict`](Self::try_predict), `None` when no model is usable
    pub fn predict(&self, sample: &MetricSample) -> Option<ModelPrediction> {
        match self.try_predict(sample) {
            Ok(prediction) => Some(prediction),
            Err(e) => {
                debug!(error = %e, "Model prediction unavailable");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{
        compute_checksum, fit_model, synthesize, DataOrigin, ModelMetadata, TrainerConfig,
    };

    fn trained() -> TrainedModel {
        let data = synthesize(150, 42, 0.1);
        fit_model(&data, DataOrigin::Synthetic, &TrainerConfig::fast()).unwrap()
    }

    fn sample() -> MetricSample {
        MetricSample::new("device-1", 0)
            .with_usage(92.0, 88.0, 60.0)
            .with_temperature(82.0)
    }

    #[test]
    fn test_without_model_is_unavailable() {
        let predictor = ModelPredictor::new_without_model();
        assert!(!predictor.is_loaded());
        assert!(predictor.predict(&sample()).is_none());
        assert!(matches!(
            predictor.try_predict(&sample()),
            Err(EngineError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_prediction_ranges() {
        let predictor = ModelPredictor::with_model(trained());
        let prediction = predictor.predict(&sample()).unwrap();

        assert!((0.0..=100.0).contains(&prediction.risk_score));
        assert!((0.0..=100.0).contains(&prediction.failure_probability));
        let p = prediction.status_probabilities;
        assert!((p.healthy + p.warning + p.critical - 100.0).abs() < 1e-6);
        assert_eq!(prediction.failure_probability, p.critical);
        assert_eq!(prediction.provenance, Provenance::Ml);
    }

    #[test]
    fn test_install_and_clear() {
        let predictor = ModelPredictor::new_without_model();
        let held = {
            predictor.install(Arc::new(trained()));
            predictor.current().unwrap()
        };
        assert!(predictor.is_loaded());

        predictor.clear();
        assert!(!predictor.is_loaded());
        // readers holding the old model keep a usable copy
        assert!(held.predict(&sample().features()).risk_score.is_finite());
    }

    #[test]
    fn test_load_from_rejects_malformed_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ModelStore::new(dir.path(), 5).unwrap();
        store.save(trained()).unwrap();
        assert!(ModelPredictor::load_from(&store).is_loaded());

        // parses as JSON but has no classes; the checksum is updated to match
        let version_dir = dir.path().join("versions/v0001");
        let blob = br#"{"weights":[],"bias":[]}"#;
        std::fs::write(version_dir.join("classifier.json"), blob).unwrap();
        let metadata_path = version_dir.join("metadata.json");
        let mut metadata: ModelMetadata =
            serde_json::from_slice(&std::fs::read(&metadata_path).unwrap()).unwrap();
        metadata
            .checksums
            .insert("classifier.json".to_string(), compute_checksum(blob));
        std::fs::write(&metadata_path, serde_json::to_vec(&metadata).unwrap()).unwrap();

        let predictor = ModelPredictor::load_from(&store);
        assert!(!predictor.is_loaded());
        assert!(predictor.predict(&sample()).is_none());
    }
}
