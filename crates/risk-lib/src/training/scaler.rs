//! Per-feature standardization

use crate::error::{EngineError, Result};
use crate::models::NUM_FEATURES;
use serde::{Deserialize, Serialize};

/// Zero-mean, unit-variance feature scaler fitted on the training split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; NUM_FEATURES],
    pub scale: [f64; NUM_FEATURES],
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self {
            mean: [0.0; NUM_FEATURES],
            scale: [1.0; NUM_FEATURES],
        }
    }
}

impl StandardScaler {
    /// Fit mean and population standard deviation; constant features keep scale 1
    pub fn fit(rows: &[[f64; NUM_FEATURES]]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let n = rows.len() as f64;
        let mut mean = [0.0; NUM_FEATURES];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = [0.0; NUM_FEATURES];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                scale[i] += (v - mean[i]).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std = (*s / n).sqrt();
            *s = if std > f64::EPSILON { std } else { 1.0 };
        }

        Self { mean, scale }
    }

    pub fn validate(&self) -> Result<()> {
        let bad_mean = self.mean.iter().any(|m| !m.is_finite());
        let bad_scale = self.scale.iter().any(|s| !s.is_finite() || *s <= 0.0);
        if bad_mean || bad_scale {
            return Err(EngineError::Persistence(
                "scaler has non-finite mean or non-positive scale".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transform(&self, row: &[f64; NUM_FEATURES]) -> [f64; NUM_FEATURES] {
        let mut out = [0.0; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            out[i] = (row[i] - self.mean[i]) / self.scale[i];
        }
        out
    }

    pub fn transform_all(&self, rows: &[[f64; NUM_FEATURES]]) -> Vec<[f64; NUM_FEATURES]> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_centers_and_scales() {
        let rows = vec![
            [0.0, 10.0, 5.0, 1.0, 100.0],
            [2.0, 20.0, 5.0, 3.0, 100.0],
            [4.0, 30.0, 5.0, 5.0, 100.0],
        ];
        let scaler = StandardScaler::fit(&rows);
        assert_eq!(scaler.mean, [2.0, 20.0, 5.0, 3.0, 100.0]);

        let transformed = scaler.transform_all(&rows);
        let column_mean: f64 = transformed.iter().map(|r| r[1]).sum::<f64>() / 3.0;
        assert!(column_mean.abs() < 1e-12);
        // constant columns are only centered
        assert_eq!(scaler.scale[2], 1.0);
        assert_eq!(transformed[0][4], 0.0);
    }
}
