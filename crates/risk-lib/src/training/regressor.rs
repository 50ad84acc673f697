//! Least-squares gradient boosting over CART regression trees

use crate::error::{EngineError, Result};
use crate::models::NUM_FEATURES;
use serde::{Deserialize, Serialize};

/// Minimum squared-error reduction for a split to be kept
const MIN_SPLIT_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressorParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
}

impl Default for RegressorParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 5,
            learning_rate: 0.1,
            min_samples_leaf: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Binary regression tree stored as a flat node array; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    pub fn fit(
        rows: &[[f64; NUM_FEATURES]],
        targets: &[f64],
        max_depth: usize,
        min_samples_leaf: usize,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let indices: Vec<usize> = (0..rows.len()).collect();
        tree.grow(rows, targets, indices, 0, max_depth, min_samples_leaf.max(1));
        tree
    }

    fn grow(
        &mut self,
        rows: &[[f64; NUM_FEATURES]],
        targets: &[f64],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
        min_leaf: usize,
    ) -> usize {
        let node = self.nodes.len();
        let value = if indices.is_empty() {
            0.0
        } else {
            indices.iter().map(|&i| targets[i]).sum::<f64>() / indices.len() as f64
        };
        self.nodes.push(TreeNode::Leaf { value });

        if depth >= max_depth || indices.len() < 2 * min_leaf {
            return node;
        }

        let Some(split) = best_split(rows, targets, &indices, min_leaf) else {
            return node;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| rows[i][split.feature] <= split.threshold);

        let left = self.grow(rows, targets, left_idx, depth + 1, max_depth, min_leaf);
        let right = self.grow(rows, targets, right_idx, depth + 1, max_depth, min_leaf);
        self.nodes[node] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }

    pub fn predict(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Every split must point at later, existing nodes, so prediction
    /// always terminates
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(EngineError::Persistence("regression tree has no nodes".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { value } if !value.is_finite() => {
                    return Err(EngineError::Persistence(format!(
                        "tree node {} has a non-finite value",
                        idx
                    )));
                }
                TreeNode::Leaf { .. } => {}
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let in_range = |child: usize| child > idx && child < self.nodes.len();
                    if *feature >= NUM_FEATURES
                        || threshold.is_nan()
                        || !in_range(*left)
                        || !in_range(*right)
                    {
                        return Err(EngineError::Persistence(format!(
                            "tree node {} is malformed (feature={}, left={}, right={}, nodes={})",
                            idx,
                            feature,
                            left,
                            right,
                            self.nodes.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Split maximising sum²/n over both children, which is equivalent to
/// minimising the children's squared error
fn best_split(
    rows: &[[f64; NUM_FEATURES]],
    targets: &[f64],
    indices: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let total: f64 = indices.iter().map(|&i| targets[i]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<SplitCandidate> = None;

    for feature in 0..NUM_FEATURES {
        let mut sorted = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            rows[a][feature]
                .partial_cmp(&rows[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        for pos in 1..n {
            left_sum += targets[sorted[pos - 1]];
            if pos < min_leaf || n - pos < min_leaf {
                continue;
            }
            let lo = rows[sorted[pos - 1]][feature];
            let hi = rows[sorted[pos]][feature];
            if lo >= hi {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / pos as f64 + right_sum * right_sum / (n - pos) as f64;
            if score - parent_score <= MIN_SPLIT_GAIN {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (lo + hi) / 2.0,
                    score,
                });
            }
        }
    }

    best
}

/// Boosted ensemble of regression trees predicting a 0-100 risk score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedRegressor {
    pub fn fit(rows: &[[f64; NUM_FEATURES]], targets: &[f64], params: &RegressorParams) -> Result<Self> {
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(EngineError::Training(format!(
                "regressor needs matching non-empty inputs (rows={}, targets={})",
                rows.len(),
                targets.len()
            )));
        }

        let init = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut predictions = vec![init; rows.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&predictions)
                .map(|(y, p)| y - p)
                .collect();
            let tree = RegressionTree::fit(rows, &residuals, params.max_depth, params.min_samples_leaf);
            for (p, row) in predictions.iter_mut().zip(rows) {
                *p += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn predict(&self, row: &[f64; NUM_FEATURES]) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    /// Root mean squared error over a labelled set
    pub fn rmse(&self, rows: &[[f64; NUM_FEATURES]], targets: &[f64]) -> f64 {
        if rows.is_empty() {
            return 0.0;
        }
        let sse: f64 = rows
            .iter()
            .zip(targets)
            .map(|(row, y)| (self.predict(row) - y).powi(2))
            .sum();
        (sse / rows.len() as f64).sqrt()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.init.is_finite() || !self.learning_rate.is_finite() {
            return Err(EngineError::Persistence(
                "regressor has non-finite parameters".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| EngineError::Persistence(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<[f64; NUM_FEATURES]>, Vec<f64>) {
        let rows: Vec<[f64; NUM_FEATURES]> =
            (0..40).map(|i| [i as f64, 0.0, 0.0, 0.0, 0.0]).collect();
        let targets = rows.iter().map(|r| if r[0] < 20.0 { 10.0 } else { 90.0 }).collect();
        (rows, targets)
    }

    #[test]
    fn test_tree_finds_step() {
        let (rows, targets) = step_data();
        let tree = RegressionTree::fit(&rows, &targets, 1, 1);

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict(&[5.0, 0.0, 0.0, 0.0, 0.0]), 10.0);
        assert_eq!(tree.predict(&[35.0, 0.0, 0.0, 0.0, 0.0]), 90.0);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let rows: Vec<[f64; NUM_FEATURES]> = (0..10).map(|i| [i as f64; NUM_FEATURES]).collect();
        let tree = RegressionTree::fit(&rows, &[7.0; 10], 5, 2);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[100.0; NUM_FEATURES]), 7.0);
    }

    #[test]
    fn test_boosting_reduces_error() {
        let (rows, targets) = step_data();
        let few = GradientBoostedRegressor::fit(
            &rows,
            &targets,
            &RegressorParams { n_estimators: 1, ..Default::default() },
        )
        .unwrap();
        let many = GradientBoostedRegressor::fit(&rows, &targets, &RegressorParams::default()).unwrap();

        assert_eq!(many.tree_count(), 100);
        assert!(many.rmse(&rows, &targets) < few.rmse(&rows, &targets));
        assert!(many.rmse(&rows, &targets) < 1.0);
    }

    #[test]
    fn test_serialized_model_predicts_identically() {
        let (rows, targets) = step_data();
        let model = GradientBoostedRegressor::fit(&rows, &targets, &RegressorParams::default()).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let restored: GradientBoostedRegressor = serde_json::from_str(&json).unwrap();

        for row in &rows {
            assert_eq!(model.predict(row).to_bits(), restored.predict(row).to_bits());
        }
    }
}
