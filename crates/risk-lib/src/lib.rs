//! Device risk scoring and failure prediction
//!
//! This crate provides the core functionality for:
//! - Rule-based risk scoring with trend analysis
//! - Training, persisting and serving a statistical failure model
//! - Blending both into one report per device sample
//! - Alert deduplication, health checks and observability

pub mod alerts;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod predictor;
pub mod scoring;
pub mod source;
pub mod training;

pub use alerts::AlertDeduplicator;
pub use config::{ConfigHandle, ScoringConfig};
pub use error::{EngineError, Result};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use monitor::{Assessment, DeviceMonitor};
pub use observability::{EngineMetrics, StructuredLogger};
pub use predictor::{EnsemblePredictor, ModelPredictor, RiskPredictor, RuleBasedPredictor};
pub use source::{MemorySource, MetricsSource};
pub use training::{ModelMetadata, ModelStatus, ModelStore, ModelTrainer, TrainRequest, TrainerConfig};
