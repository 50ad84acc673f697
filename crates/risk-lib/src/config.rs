//! Scoring configuration: thresholds, weights, ensemble blend
//!
//! The configuration is process-wide and read-mostly. Readers take an
//! immutable snapshot through [`ConfigHandle::snapshot`]; a reconfiguration
//! validates the new values and swaps the whole snapshot at once.

use crate::error::{EngineError, Result};
use crate::models::MetricKind;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::info;

/// Tolerance when checking that weights sum to one
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Warning/critical pair for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    pub warning: f64,
    pub critical: f64,
}

impl MetricThreshold {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }
}

/// Per-metric thresholds.
///
/// CPU, RAM, disk and temperature are risky above their thresholds;
/// battery is risky below them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub cpu: MetricThreshold,
    pub ram: MetricThreshold,
    pub temperature: MetricThreshold,
    pub disk: MetricThreshold,
    pub battery: MetricThreshold,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            cpu: MetricThreshold::new(70.0, 85.0),
            ram: MetricThreshold::new(75.0, 90.0),
            temperature: MetricThreshold::new(70.0, 80.0),
            disk: MetricThreshold::new(85.0, 95.0),
            battery: MetricThreshold::new(25.0, 15.0),
        }
    }
}

impl ThresholdConfig {
    pub fn for_metric(&self, kind: MetricKind) -> MetricThreshold {
        match kind {
            MetricKind::Cpu => self.cpu,
            MetricKind::Ram => self.ram,
            MetricKind::Temperature => self.temperature,
            MetricKind::Disk => self.disk,
            MetricKind::Battery => self.battery,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for kind in [MetricKind::Cpu, MetricKind::Ram, MetricKind::Temperature, MetricKind::Disk] {
            let t = self.for_metric(kind);
            if !(t.warning > 0.0 && t.warning < t.critical) {
                return Err(EngineError::InvalidConfig(format!(
                    "{} thresholds must satisfy 0 < warning < critical (got {} / {})",
                    kind, t.warning, t.critical
                )));
            }
        }
        let b = self.battery;
        if !(b.critical >= 0.0 && b.critical < b.warning && b.warning <= 100.0) {
            return Err(EngineError::InvalidConfig(format!(
                "battery thresholds must satisfy 0 <= critical < warning <= 100 (got {} / {})",
                b.warning, b.critical
            )));
        }
        Ok(())
    }
}

/// Per-metric weights of the combined score; must sum to 1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub cpu: f64,
    pub ram: f64,
    pub temperature: f64,
    pub disk: f64,
    pub battery: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            cpu: 0.25,
            ram: 0.20,
            temperature: 0.30,
            disk: 0.15,
            battery: 0.10,
        }
    }
}

impl WeightConfig {
    pub fn for_metric(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Cpu => self.cpu,
            MetricKind::Ram => self.ram,
            MetricKind::Temperature => self.temperature,
            MetricKind::Disk => self.disk,
            MetricKind::Battery => self.battery,
        }
    }

    pub fn sum(&self) -> f64 {
        self.cpu + self.ram + self.temperature + self.disk + self.battery
    }

    pub fn validate(&self) -> Result<()> {
        if MetricKind::ALL.iter().any(|k| self.for_metric(*k) < 0.0) {
            return Err(EngineError::InvalidConfig("weights must be non-negative".to_string()));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::InvalidConfig(format!(
                "weights must sum to 1.0 (got {:.6})",
                sum
            )));
        }
        Ok(())
    }
}

/// Blend between model and rule-based risk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Share of the model's risk score in the combined score
    pub ml_weight: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self { ml_weight: 0.7 }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.ml_weight) {
            return Err(EngineError::InvalidConfig(format!(
                "ml_weight must be within [0, 1] (got {})",
                self.ml_weight
            )));
        }
        Ok(())
    }
}

/// Everything the scoring path reads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub thresholds: ThresholdConfig,
    pub weights: WeightConfig,
    pub ensemble: EnsembleConfig,
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;
        self.weights.validate()?;
        self.ensemble.validate()
    }
}

/// Shared, swappable scoring configuration
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<ScoringConfig>>>,
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(ScoringConfig::default()))),
        }
    }
}

impl ConfigHandle {
    /// Wrap a validated configuration
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    /// Immutable view of the current configuration
    pub fn snapshot(&self) -> Arc<ScoringConfig> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the configuration; invalid input leaves the current one in place
    pub fn reconfigure(&self, config: ScoringConfig) -> Result<()> {
        config.validate()?;
        let mut guard = self
            .current
            .write()
            .map_err(|e| EngineError::InvalidConfig(format!("Lock poisoned: {}", e)))?;
        *guard = Arc::new(config);
        info!("Scoring configuration updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.weights.sum() - 1.0).abs() < 1e-9);
        assert_eq!(config.ensemble.ml_weight, 0.7);
    }

    #[test]
    fn test_reject_weights_not_summing_to_one() {
        let mut config = ScoringConfig::default();
        config.weights.cpu = 0.5;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_reject_inverted_thresholds() {
        let mut config = ScoringConfig::default();
        config.thresholds.cpu = MetricThreshold::new(90.0, 80.0);
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.thresholds.battery = MetricThreshold::new(10.0, 20.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reconfigure_swaps_snapshot() {
        let handle = ConfigHandle::default();
        let before = handle.snapshot();

        let mut updated = ScoringConfig::default();
        updated.ensemble.ml_weight = 0.5;
        handle.reconfigure(updated).unwrap();

        assert_eq!(before.ensemble.ml_weight, 0.7);
        assert_eq!(handle.snapshot().ensemble.ml_weight, 0.5);
    }

    #[test]
    fn test_invalid_reconfigure_keeps_current() {
        let handle = ConfigHandle::default();
        let mut broken = ScoringConfig::default();
        broken.weights.battery = 0.9;

        assert!(handle.reconfigure(broken).is_err());
        assert_eq!(*handle.snapshot(), ScoringConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ScoringConfig =
            serde_json::from_str(r#"{"ensemble": {"ml_weight": 0.6}}"#).unwrap();
        assert_eq!(config.ensemble.ml_weight, 0.6);
        assert_eq!(config.thresholds, ThresholdConfig::default());
    }
}
