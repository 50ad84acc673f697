//! Model training orchestration
//!
//! One training run at a time: rows are fetched from the source (or
//! synthesized), the fit runs on the blocking pool, the result is persisted
//! and only then swapped into the live predictor. Any failure leaves the
//! store and the installed model as they were.

use super::artifact::{DataOrigin, ModelMetadata, TrainedModel, FORMAT_VERSION};
use super::classifier::{ClassifierParams, SoftmaxClassifier};
use super::dataset::Dataset;
use super::regressor::{GradientBoostedRegressor, RegressorParams};
use super::scaler::StandardScaler;
use super::store::ModelStore;
use super::synthetic::synthesize;
use crate::error::{EngineError, Result};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::predictor::ModelPredictor;
use crate::source::MetricsSource;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub synthetic_samples: usize,
    /// Most recent historical rows fetched per run
    pub history_limit: usize,
    /// Fewer historical rows than this counts as no history
    pub min_history_rows: usize,
    pub test_fraction: f64,
    /// Datasets at or below this size are not split
    pub split_threshold: usize,
    pub seed: u64,
    pub label_noise: f64,
    pub classifier: ClassifierParams,
    pub regressor: RegressorParams,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            synthetic_samples: 1000,
            history_limit: 10_000,
            min_history_rows: 10,
            test_fraction: 0.2,
            split_threshold: 20,
            seed: 42,
            label_noise: 0.1,
            classifier: ClassifierParams::default(),
            regressor: RegressorParams::default(),
        }
    }
}

impl TrainerConfig {
    /// Smaller synthetic set and fewer boosting rounds
    pub fn fast() -> Self {
        Self {
            synthetic_samples: 200,
            classifier: ClassifierParams {
                epochs: 200,
                ..ClassifierParams::default()
            },
            regressor: RegressorParams {
                n_estimators: 20,
                max_depth: 3,
                ..RegressorParams::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(EngineError::InvalidConfig(format!(
                "test_fraction must be within [0, 1) (got {})",
                self.test_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.label_noise) {
            return Err(EngineError::InvalidConfig(format!(
                "label_noise must be within [0, 1] (got {})",
                self.label_noise
            )));
        }
        if self.min_history_rows == 0 {
            return Err(EngineError::InvalidConfig(
                "min_history_rows must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainRequest {
    /// Fall back to synthetic data when history is insufficient
    pub use_synthetic: bool,
    /// Try historical rows from the source first
    pub use_db: bool,
}

impl Default for TrainRequest {
    fn default() -> Self {
        Self {
            use_synthetic: true,
            use_db: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModelMetadata>,
}

/// Fit scaler, classifier and regressor on one dataset.
///
/// The scaler sees only the training split; accuracy and RMSE are measured
/// on the held-out split.
pub fn fit_model(dataset: &Dataset, origin: DataOrigin, config: &TrainerConfig) -> Result<TrainedModel> {
    if dataset.is_empty() {
        return Err(EngineError::InsufficientData {
            available: 0,
            required: config.min_history_rows,
        });
    }

    let (train, test) = dataset.split(config.test_fraction, config.split_threshold, config.seed);
    let scaler = StandardScaler::fit(train.features());
    let x_train = scaler.transform_all(train.features());
    let x_test = scaler.transform_all(test.features());

    let classifier = SoftmaxClassifier::fit(&x_train, train.labels(), &config.classifier)?;
    let accuracy = classifier.accuracy(&x_test, test.labels());

    let regressor = GradientBoostedRegressor::fit(&x_train, train.targets(), &config.regressor)?;
    let rmse = regressor.rmse(&x_test, test.targets());

    if !accuracy.is_finite() || !rmse.is_finite() {
        return Err(EngineError::Training(format!(
            "non-finite evaluation (accuracy={}, rmse={})",
            accuracy, rmse
        )));
    }

    debug!(
        train = train.len(),
        test = test.len(),
        accuracy = accuracy,
        rmse = rmse,
        "Model fitted"
    );

    Ok(TrainedModel {
        scaler,
        classifier,
        regressor,
        metadata: ModelMetadata {
            trained: true,
            trained_at: Utc::now(),
            training_samples: dataset.len(),
            accuracy,
            rmse,
            version: String::new(),
            format_version: FORMAT_VERSION,
            data_origin: origin,
            class_counts: dataset.class_counts(),
            checksums: Default::default(),
        },
    })
}

pub struct ModelTrainer {
    config: TrainerConfig,
    source: Arc<dyn MetricsSource>,
    store: Arc<ModelStore>,
    predictor: Arc<ModelPredictor>,
    write_lock: Mutex<()>,
    metrics: EngineMetrics,
    logger: StructuredLogger,
}

impl ModelTrainer {
    pub fn new(
        config: TrainerConfig,
        source: Arc<dyn MetricsSource>,
        store: Arc<ModelStore>,
        predictor: Arc<ModelPredictor>,
        logger: StructuredLogger,
    ) -> Result<Self> {
        config.validate()?;
        let trainer = Self {
            config,
            source,
            store,
            predictor,
            write_lock: Mutex::new(()),
            metrics: EngineMetrics::new(),
            logger,
        };
        trainer.metrics.set_model(trainer.predictor.metadata().as_ref());
        Ok(trainer)
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// Train, persist and install a new model
    pub async fn train(&self, request: TrainRequest) -> Result<ModelMetadata> {
        let _guard = self.write_lock.lock().await;
        let started = Instant::now();
        self.logger
            .log_training_started(request.use_synthetic, request.use_db);

        let result = self.run(request).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(metadata) => {
                self.metrics.record_training("success", elapsed);
                self.metrics.set_model(Some(metadata));
                self.logger.log_training_completed(metadata, elapsed);
            }
            Err(e) if e.is_insufficient_data() => {
                self.metrics.record_training("insufficient_data", elapsed);
                self.logger.log_training_failed(&e.to_string(), true);
            }
            Err(e) => {
                self.metrics.record_training("failed", elapsed);
                self.logger.log_training_failed(&e.to_string(), false);
            }
        }
        result
    }

    /// Retrain from history, optionally falling back to synthetic data
    pub async fn retrain(&self, use_synthetic: bool) -> Result<ModelMetadata> {
        self.train(TrainRequest {
            use_synthetic,
            use_db: true,
        })
        .await
    }

    /// Current model state; no side effects
    pub fn status(&self) -> ModelStatus {
        let metadata = self.predictor.metadata();
        ModelStatus {
            loaded: metadata.is_some(),
            metadata,
        }
    }

    /// Re-point the store at the previous version and install it
    pub async fn rollback(&self) -> Result<Option<ModelMetadata>> {
        let _guard = self.write_lock.lock().await;
        let store = Arc::clone(&self.store);
        let restored = tokio::task::spawn_blocking(move || -> Result<Option<TrainedModel>> {
            match store.rollback()? {
                Some(version) => store.load_version(&version).map(Some),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| EngineError::Persistence(format!("rollback task failed: {}", e)))??;

        let Some(model) = restored else {
            return Ok(None);
        };
        let metadata = model.metadata.clone();
        self.predictor.install(Arc::new(model));
        self.metrics.set_model(Some(&metadata));
        self.logger.log_model_loaded(&metadata);
        Ok(Some(metadata))
    }

    async fn run(&self, request: TrainRequest) -> Result<ModelMetadata> {
        let (dataset, origin) = self.collect(request).await?;
        info!(rows = dataset.len(), origin = %origin, "Training dataset ready");

        let config = self.config.clone();
        let fitted = tokio::task::spawn_blocking(move || fit_model(&dataset, origin, &config))
            .await
            .map_err(|e| EngineError::Training(format!("training task failed: {}", e)))??;

        let store = Arc::clone(&self.store);
        let saved = tokio::task::spawn_blocking(move || store.save(fitted))
            .await
            .map_err(|e| EngineError::Persistence(format!("save task failed: {}", e)))??;

        let metadata = saved.metadata.clone();
        self.predictor.install(Arc::new(saved));
        Ok(metadata)
    }

    async fn collect(&self, request: TrainRequest) -> Result<(Dataset, DataOrigin)> {
        let mut available = 0;

        if request.use_db {
            match self.source.fetch_training_rows(self.config.history_limit).await {
                Ok(rows) => {
                    available = rows.len();
                    if rows.len() >= self.config.min_history_rows {
                        return Ok((Dataset::from_rows(&rows), DataOrigin::Historical));
                    }
                    debug!(
                        rows = rows.len(),
                        required = self.config.min_history_rows,
                        "Not enough historical rows"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Failed to fetch historical rows, treating as empty");
                }
            }
        }

        if request.use_synthetic {
            let dataset = synthesize(
                self.config.synthetic_samples,
                self.config.seed,
                self.config.label_noise,
            );
            return Ok((dataset, DataOrigin::Synthetic));
        }

        Err(EngineError::InsufficientData {
            available,
            required: self.config.min_history_rows,
        })
    }
}
