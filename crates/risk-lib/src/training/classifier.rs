//! Multinomial logistic regression over the three health classes

use crate::error::{EngineError, Result};
use crate::models::{HealthClass, NUM_FEATURES};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            epochs: 500,
            learning_rate: 0.5,
            l2: 1e-4,
        }
    }
}

/// Softmax classifier trained by full-batch gradient descent.
///
/// Weights start at zero and every epoch visits samples in order, so the
/// fit is fully deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxClassifier {
    weights: Vec<[f64; NUM_FEATURES]>,
    bias: Vec<f64>,
}

impl SoftmaxClassifier {
    pub fn fit(
        rows: &[[f64; NUM_FEATURES]],
        labels: &[HealthClass],
        params: &ClassifierParams,
    ) -> Result<Self> {
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(EngineError::Training(format!(
                "classifier needs matching non-empty inputs (rows={}, labels={})",
                rows.len(),
                labels.len()
            )));
        }

        let classes = HealthClass::COUNT;
        let n = rows.len() as f64;
        let mut model = Self {
            weights: vec![[0.0; NUM_FEATURES]; classes],
            bias: vec![0.0; classes],
        };

        for _ in 0..params.epochs {
            let mut grad_w = vec![[0.0; NUM_FEATURES]; classes];
            let mut grad_b = vec![0.0; classes];

            for (row, label) in rows.iter().zip(labels) {
                let probs = model.predict_proba(row);
                for k in 0..classes {
                    let target = if label.index() == k { 1.0 } else { 0.0 };
                    let diff = probs[k] - target;
                    for (g, x) in grad_w[k].iter_mut().zip(row) {
                        *g += diff * x;
                    }
                    grad_b[k] += diff;
                }
            }

            for k in 0..classes {
                for j in 0..NUM_FEATURES {
                    let grad = grad_w[k][j] / n + params.l2 * model.weights[k][j];
                    model.weights[k][j] -= params.learning_rate * grad;
                }
                model.bias[k] -= params.learning_rate * grad_b[k] / n;
            }
        }

        if model.weights.iter().flatten().chain(&model.bias).any(|w| !w.is_finite()) {
            return Err(EngineError::Training("classifier diverged".to_string()));
        }
        Ok(model)
    }

    /// Check a deserialized classifier before it is used for scoring
    pub fn validate(&self) -> Result<()> {
        if self.weights.len() != HealthClass::COUNT || self.bias.len() != HealthClass::COUNT {
            return Err(EngineError::Persistence(format!(
                "classifier must have {} classes (weights={}, bias={})",
                HealthClass::COUNT,
                self.weights.len(),
                self.bias.len()
            )));
        }
        if self.weights.iter().flatten().chain(&self.bias).any(|w| !w.is_finite()) {
            return Err(EngineError::Persistence(
                "classifier has non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }

    /// Class probabilities indexed by [`HealthClass::index`]
    pub fn predict_proba(&self, row: &[f64; NUM_FEATURES]) -> [f64; HealthClass::COUNT] {
        let mut logits = [0.0; HealthClass::COUNT];
        for (k, logit) in logits.iter_mut().enumerate() {
            *logit = self.bias[k]
                + self.weights[k]
                    .iter()
                    .zip(row)
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
        }
        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut probs = [0.0; HealthClass::COUNT];
        let mut total = 0.0;
        for (p, l) in probs.iter_mut().zip(logits) {
            *p = (l - max).exp();
            total += *p;
        }
        probs.iter_mut().for_each(|p| *p /= total);
        probs
    }

    pub fn predict(&self, row: &[f64; NUM_FEATURES]) -> HealthClass {
        let probs = self.predict_proba(row);
        let best = probs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(0);
        HealthClass::from_index(best)
    }

    /// Fraction of rows classified correctly
    pub fn accuracy(&self, rows: &[[f64; NUM_FEATURES]], labels: &[HealthClass]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let correct = rows
            .iter()
            .zip(labels)
            .filter(|(row, label)| self.predict(row) == **label)
            .count();
        correct as f64 / rows.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<[f64; NUM_FEATURES]>, Vec<HealthClass>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let jitter = (i % 5) as f64 * 0.05;
            rows.push([-2.0 + jitter, 0.0, 0.0, 0.0, 0.0]);
            labels.push(HealthClass::Healthy);
            rows.push([0.0 + jitter, 0.0, 0.0, 0.0, 0.0]);
            labels.push(HealthClass::Warning);
            rows.push([2.0 + jitter, 0.0, 0.0, 0.0, 0.0]);
            labels.push(HealthClass::Critical);
        }
        (rows, labels)
    }

    #[test]
    fn test_learns_separable_classes() {
        let (rows, labels) = separable();
        let model = SoftmaxClassifier::fit(&rows, &labels, &ClassifierParams::default()).unwrap();

        assert!(model.accuracy(&rows, &labels) > 0.95);
        assert_eq!(model.predict(&[2.5, 0.0, 0.0, 0.0, 0.0]), HealthClass::Critical);
        assert_eq!(model.predict(&[-2.5, 0.0, 0.0, 0.0, 0.0]), HealthClass::Healthy);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (rows, labels) = separable();
        let model = SoftmaxClassifier::fit(&rows, &labels, &ClassifierParams::default()).unwrap();
        let probs = model.predict_proba(&[0.3, 1.0, -1.0, 0.5, 0.0]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(SoftmaxClassifier::fit(&[], &[], &ClassifierParams::default()).is_err());
    }
}
