//! Decision tree regressor (CART, squared-error criterion)

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, SelectorError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Decision tree node; children are indices into the tree's node list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
        n_samples: usize,
        impurity: f64,
    },
}

/// Running sums of a target subset; variance is E[y²] - E[y]²
#[derive(Debug, Clone, Copy, Default)]
struct TargetStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
}

impl TargetStats {
    fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
    }

    fn minus(&self, other: &TargetStats) -> TargetStats {
        TargetStats {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0)
    }
}

/// Candidate split found for one feature
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    /// Nodes in pre-order, root first
    nodes: Vec<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Number of features seen during fit
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor {
    /// Create a new regressor tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let mut nodes = Vec::new();
        self.build_tree(x, y, &indices, 0, &mut nodes, &mut importances);
        self.nodes = nodes;

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    /// Grow the subtree for `indices` and return the index of its root node
    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<TreeNode>,
        importances: &mut [f64],
    ) -> usize {
        let n_samples = indices.len();
        let mut stats = TargetStats::default();
        for &i in indices {
            stats.push(y[i]);
        }

        let node_idx = nodes.len();
        nodes.push(TreeNode::Leaf { value: stats.mean(), n_samples });

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || stats.variance() <= 1e-12;
        if should_stop {
            return node_idx;
        }

        let Some(split) = self.find_best_split(x, y, indices, &stats) else {
            return node_idx;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

        if left_indices.len() < self.min_samples_leaf || right_indices.len() < self.min_samples_leaf {
            return node_idx;
        }

        importances[split.feature_idx] += n_samples as f64 * split.gain;

        let left = self.build_tree(x, y, &left_indices, depth + 1, nodes, importances);
        let right = self.build_tree(x, y, &right_indices, depth + 1, nodes, importances);

        nodes[node_idx] = TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
            impurity: stats.variance(),
        };
        node_idx
    }

    /// Sort each feature once and sweep prefix sums, so a node costs O(n log n) per feature
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent: &TargetStats,
    ) -> Option<SplitCandidate> {
        let parent_impurity = parent.variance();
        let n = indices.len() as f64;

        let feature_results: Vec<Option<SplitCandidate>> = (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| {
                let mut sorted = indices.to_vec();
                sorted.sort_by(|&a, &b| {
                    x[[a, feature_idx]]
                        .partial_cmp(&x[[b, feature_idx]])
                        .unwrap_or(Ordering::Equal)
                });

                let mut left = TargetStats::default();
                let mut best: Option<SplitCandidate> = None;

                for pos in 0..sorted.len() - 1 {
                    let idx = sorted[pos];
                    left.push(y[idx]);

                    let value = x[[idx, feature_idx]];
                    let next_value = x[[sorted[pos + 1], feature_idx]];
                    if next_value <= value {
                        continue;
                    }

                    let right = parent.minus(&left);
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * left.variance()
                        + right.count as f64 * right.variance())
                        / n;
                    let gain = parent_impurity - weighted;

                    if gain > best.map_or(0.0, |b| b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (value + next_value) / 2.0,
                            gain,
                        });
                    }
                }

                best
            })
            .collect();

        // First feature wins on equal gain
        feature_results
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<SplitCandidate>, cand| match acc {
                Some(best) if best.gain >= cand.gain => Some(best),
                _ => Some(cand),
            })
    }

    /// Walk from the root to a leaf. None if the node links are broken,
    /// which only happens for a hand-edited artifact.
    fn predict_row(&self, sample: &ArrayView1<f64>) -> Option<f64> {
        let mut idx = 0;
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx)? {
                TreeNode::Leaf { value, .. } => return Some(*value),
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    let value = *sample.get(*feature_idx)?;
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
        None
    }

    /// Make predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
            return Err(SelectorError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        x.rows()
            .into_iter()
            .map(|row| {
                self.predict_row(&row)
                    .ok_or_else(|| SelectorError::ComputationError("Corrupt tree structure".to_string()))
            })
            .collect()
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a single leaf has depth 1)
    pub fn get_depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 1usize)];
        while let Some((idx, depth)) = stack.pop() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { .. }) => max_depth = max_depth.max(depth),
                Some(TreeNode::Split { left, right, .. }) => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
                None => {}
            }
        }
        max_depth
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, TreeNode::Leaf { .. }))
            .count()
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        DecisionTreeRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        DecisionTreeRegressor::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    fn model_type(&self) -> &str {
        super::catalog::ModelKind::DecisionTree.as_str()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
