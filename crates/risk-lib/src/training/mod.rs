//! Model training and persistence
//!
//! - [`StandardScaler`], [`SoftmaxClassifier`], [`GradientBoostedRegressor`]: the fitted pieces
//! - [`synthesize`]: cold-start data
//! - [`ModelStore`]: versioned artifacts with checksums and rollback
//! - [`ModelTrainer`]: one-at-a-time training with hot swap

mod artifact;
mod classifier;
mod dataset;
mod regressor;
mod scaler;
mod store;
mod synthetic;
mod trainer;

pub use artifact::{DataOrigin, ModelMetadata, ModelOutput, TrainedModel, FORMAT_VERSION};
pub use classifier::{ClassifierParams, SoftmaxClassifier};
pub use dataset::{ClassCounts, Dataset};
pub use regressor::{GradientBoostedRegressor, RegressionTree, RegressorParams};
pub use scaler::StandardScaler;
pub use store::{compute_checksum, ModelStore};
pub use synthetic::{synthesize, synthetic_risk};
pub use trainer::{fit_model, ModelStatus, ModelTrainer, TrainRequest, TrainerConfig};
