//! Labelled feature rows and the train/test split

use super::synthetic::synthetic_risk;
use crate::models::{HealthClass, TrainingRow, NUM_FEATURES};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Number of rows per health class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
}

/// Feature rows with their class label and regression target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    features: Vec<[f64; NUM_FEATURES]>,
    labels: Vec<HealthClass>,
    targets: Vec<f64>,
}

impl Dataset {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            features: Vec::with_capacity(capacity),
            labels: Vec::with_capacity(capacity),
            targets: Vec::with_capacity(capacity),
        }
    }

    /// Historical rows: the label is the stored device status, the target
    /// is the synthetic risk formula applied to the row
    pub fn from_rows(rows: &[TrainingRow]) -> Self {
        let mut dataset = Self::with_capacity(rows.len());
        for row in rows.iter().cloned().map(TrainingRow::sanitized) {
            let risk = synthetic_risk(row.cpu, row.ram, row.disk, row.temperature, row.battery);
            dataset.push(row.features(), row.label(), risk);
        }
        dataset
    }

    pub fn push(&mut self, features: [f64; NUM_FEATURES], label: HealthClass, target: f64) {
        self.features.push(features);
        self.labels.push(label);
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[[f64; NUM_FEATURES]] {
        &self.features
    }

    pub fn labels(&self) -> &[HealthClass] {
        &self.labels
    }

    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn class_counts(&self) -> ClassCounts {
        let mut counts = ClassCounts::default();
        for label in &self.labels {
            match label {
                HealthClass::Healthy => counts.healthy += 1,
                HealthClass::Warning => counts.warning += 1,
                HealthClass::Critical => counts.critical += 1,
            }
        }
        counts
    }

    fn select(&self, indices: &[usize]) -> Self {
        let mut out = Self::with_capacity(indices.len());
        for &i in indices {
            out.push(self.features[i], self.labels[i], self.targets[i]);
        }
        out
    }

    /// Split into (train, test).
    ///
    /// Above `threshold` rows, a seeded shuffle puts `ceil(len * test_fraction)`
    /// rows in the test set. At or below it both halves are the full dataset.
    pub fn split(&self, test_fraction: f64, threshold: usize, seed: u64) -> (Self, Self) {
        if self.len() <= threshold {
            return (self.clone(), self.clone());
        }
        let mut indices: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let test_len = ((self.len() as f64 * test_fraction).ceil() as usize).clamp(1, self.len() - 1);
        let (test, train) = indices.split_at(test_len);
        (self.select(train), self.select(test))
    }
}
