//! Second-order boosted trees for squared error
//!
//! With squared error every sample has gradient `pred - y` and hessian 1, so a
//! node's hessian sum is its sample count. Leaves take the regularized Newton
//! step `-G / (H + λ)` (soft-thresholded by α) and a split is kept only when
//! its structure-score gain exceeds γ.

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, SelectorError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum hessian sum (sample count) per child
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights
    pub reg_lambda: f64,
    /// L1 penalty on leaf weights
    pub reg_alpha: f64,
    /// Minimum gain to keep a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf { weight: f64 },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

/// One boosting round; nodes are stored flat with the root at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoostedTree {
    nodes: Vec<Node>,
}

impl BoostedTree {
    fn predict(&self, sample: &ArrayView1<f64>) -> Option<f64> {
        let mut idx = 0;
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx)? {
                Node::Leaf { weight } => return Some(*weight),
                Node::Split { feature, threshold, left, right } => {
                    idx = if *sample.get(*feature)? <= *threshold { *left } else { *right };
                }
            }
        }
        None
    }

    fn split_features(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().filter_map(|node| match node {
            Node::Split { feature, .. } => Some(*feature),
            Node::Leaf { .. } => None,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitChoice {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Regularized Newton step for a leaf
fn leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    let shrunk = g_sum.signum() * (g_sum.abs() - alpha).max(0.0);
    -shrunk / (h_sum + lambda)
}

/// Grows one tree against fixed gradients
struct TreeGrower<'a> {
    x: &'a Array2<f64>,
    grad: &'a Array1<f64>,
    features: &'a [usize],
    config: &'a XGBoostConfig,
}

impl TreeGrower<'_> {
    fn grow(&self, rows: &[usize]) -> BoostedTree {
        let mut nodes = Vec::new();
        self.grow_node(rows, 0, &mut nodes);
        BoostedTree { nodes }
    }

    fn grow_node(&self, rows: &[usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
        let g_sum: f64 = rows.iter().map(|&i| self.grad[i]).sum();
        let h_sum = rows.len() as f64;

        let node_idx = nodes.len();
        nodes.push(Node::Leaf {
            weight: leaf_weight(g_sum, h_sum, self.config.reg_lambda, self.config.reg_alpha),
        });

        if depth >= self.config.max_depth || rows.len() < 2 || h_sum < self.config.min_child_weight {
            return node_idx;
        }

        let choice = self
            .features
            .par_iter()
            .filter_map(|&feature| self.best_threshold(rows, feature, g_sum))
            .max_by(|a, b| a.gain.partial_cmp(&b.gain).unwrap_or(Ordering::Equal));

        let Some(choice) = choice.filter(|c| c.gain > self.config.gamma) else {
            return node_idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&i| self.x[[i, choice.feature]] <= choice.threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return node_idx;
        }

        let left = self.grow_node(&left_rows, depth + 1, nodes);
        let right = self.grow_node(&right_rows, depth + 1, nodes);
        nodes[node_idx] = Node::Split {
            feature: choice.feature,
            threshold: choice.threshold,
            left,
            right,
        };
        node_idx
    }

    /// Scan every boundary between distinct sorted values of `feature`
    fn best_threshold(&self, rows: &[usize], feature: usize, g_total: f64) -> Option<SplitChoice> {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|&a, &b| {
            self.x[[a, feature]]
                .partial_cmp(&self.x[[b, feature]])
                .unwrap_or(Ordering::Equal)
        });

        let lambda = self.config.reg_lambda;
        let score = |g: f64, h: f64| g * g / (h + lambda);
        let h_total = sorted.len() as f64;
        let parent = score(g_total, h_total);

        let mut g_left = 0.0;
        let mut best: Option<SplitChoice> = None;

        for (pos, pair) in sorted.windows(2).enumerate() {
            g_left += self.grad[pair[0]];
            let (lo, hi) = (self.x[[pair[0], feature]], self.x[[pair[1], feature]]);
            if hi - lo < 1e-12 {
                continue;
            }

            let h_left = (pos + 1) as f64;
            let h_right = h_total - h_left;
            if h_left < self.config.min_child_weight || h_right < self.config.min_child_weight {
                continue;
            }

            let gain = 0.5 * (score(g_left, h_left) + score(g_total - g_left, h_right) - parent);
            if best.map_or(true, |b| gain > b.gain) {
                best = Some(SplitChoice {
                    feature,
                    threshold: (lo + hi) / 2.0,
                    gain,
                });
            }
        }

        best
    }
}

/// Sorted random subset of `0..n` holding `ratio` of the elements
fn sample_sorted(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n);
    let mut picked = rand::seq::index::sample(rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}

/// XGBoost Regressor (squared error loss)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostRegressor {
    config: XGBoostConfig,
    trees: Vec<BoostedTree>,
    base_score: f64,
    n_features: usize,
}

impl Default for XGBoostRegressor {
    fn default() -> Self {
        Self::new(XGBoostConfig::default())
    }
}

impl XGBoostRegressor {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        let (n_samples, n_features) = x.dim();
        self.n_features = n_features;
        self.trees.clear();
        self.base_score = y.mean().unwrap_or(0.0);

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        let mut margin = Array1::from_elem(n_samples, self.base_score);

        for _ in 0..self.config.n_estimators {
            let grad: Array1<f64> = &margin - y;
            let rows = sample_sorted(&mut rng, n_samples, self.config.subsample);
            let features = sample_sorted(&mut rng, n_features, self.config.colsample_bytree);

            let tree = TreeGrower {
                x,
                grad: &grad,
                features: &features,
                config: &self.config,
            }
            .grow(&rows);

            for (m, row) in margin.iter_mut().zip(x.rows()) {
                *m += self.config.learning_rate * tree.predict(&row).unwrap_or(0.0);
            }
            self.trees.push(tree);
        }

        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(SelectorError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        x.rows()
            .into_iter()
            .map(|row| {
                self.trees.iter().try_fold(self.base_score, |acc, tree| -> Result<f64> {
                    let step = tree.predict(&row).ok_or_else(|| {
                        SelectorError::ComputationError("Corrupt tree structure".to_string())
                    })?;
                    Ok(acc + self.config.learning_rate * step)
                })
            })
            .collect()
    }

    /// Share of splits made on each feature
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 {
            return None;
        }

        let mut counts = Array1::<f64>::zeros(self.n_features);
        for feature in self.trees.iter().flat_map(|tree| tree.split_features()) {
            if feature < self.n_features {
                counts[feature] += 1.0;
            }
        }
        let total = counts.sum();
        if total > 0.0 {
            counts /= total;
        }
        Some(counts)
    }
}

impl Regressor for XGBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        XGBoostRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        XGBoostRegressor::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    fn model_type(&self) -> &str {
        super::catalog::ModelKind::XGBoost.as_str()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::r2_score;

    fn regression_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((50, 2), (0..100).map(|i| i as f64 * 0.1).collect()).unwrap();
        let y: Array1<f64> = x.rows().into_iter().map(|r| r[0] * 2.0 + r[1] * 0.5 + 1.0).collect();
        (x, y)
    }

    #[test]
    fn test_xgboost_regressor() {
        let (x, y) = regression_data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 50,
            max_depth: 4,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.9, "XGBoost regressor R² = {}", r2);
    }

    #[test]
    fn test_xgboost_regularization() {
        let (x, y) = regression_data();
        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 30,
            reg_lambda: 10.0,
            reg_alpha: 1.0,
            gamma: 1.0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();
        let preds = model.predict(&x).unwrap();
        assert_eq!(preds.len(), 50);

        let importances = model.feature_importances().unwrap();
        assert!((importances.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_deep_trees_round_trip_through_json() {
        let n = 120;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        let y: Array1<f64> = (0..n).map(|i| 3f64.powi(i as i32)).collect();

        let mut model = XGBoostRegressor::new(XGBoostConfig {
            n_estimators: 2,
            max_depth: 100,
            reg_lambda: 0.0,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        let restored: XGBoostRegressor = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_leaf_weight_soft_threshold() {
        assert_eq!(leaf_weight(0.5, 2.0, 1.0, 1.0), 0.0);
        assert!((leaf_weight(-4.0, 2.0, 1.0, 0.0) - 4.0 / 3.0).abs() < 1e-12);
        assert!((leaf_weight(3.0, 1.0, 1.0, 1.0) + 1.0).abs() < 1e-12);
    }
}
