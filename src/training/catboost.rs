//! CatBoost-style gradient boosting
//!
//! Key features:
//! - Symmetric (oblivious) decision trees: all nodes at same depth use the same split
//! - Ordered row permutation fixed once per fit
//! - L2-regularized leaf values

use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, SelectorError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Upper bound on candidate thresholds scanned per feature
const MAX_CANDIDATE_THRESHOLDS: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub reg_lambda: f64,
    pub subsample: f64,
    pub random_state: Option<u64>,
}

impl Default for CatBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            reg_lambda: 3.0,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// Symmetric (oblivious) tree: each level uses the same split feature + threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymmetricTree {
    splits: Vec<(usize, f64)>,
    leaf_values: Vec<f64>,
}

impl SymmetricTree {
    fn predict(&self, sample: &ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        for &(feature, threshold) in &self.splits {
            idx = idx * 2 + usize::from(sample[feature] > threshold);
        }
        self.leaf_values.get(idx).copied().unwrap_or(0.0)
    }
}

fn build_symmetric_tree(
    x: &Array2<f64>,
    gradients: &[f64],
    indices: &[usize],
    max_depth: usize,
    reg_lambda: f64,
) -> SymmetricTree {
    let mut splits = Vec::with_capacity(max_depth);
    let mut buckets: Vec<Vec<usize>> = vec![indices.to_vec()];

    for _depth in 0..max_depth {
        // One split shared by every bucket on this level
        let best = (0..x.ncols())
            .into_par_iter()
            .filter_map(|feat| {
                let mut all_vals: Vec<f64> = buckets
                    .iter()
                    .flat_map(|b| b.iter().map(|&i| x[[i, feat]]))
                    .collect();
                all_vals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
                all_vals.dedup();

                if all_vals.len() < 2 {
                    return None;
                }

                let mut best_gain = f64::NEG_INFINITY;
                let mut best_thr = 0.0;

                let step = (all_vals.len() / MAX_CANDIDATE_THRESHOLDS).max(1);
                for i in (0..all_vals.len() - 1).step_by(step) {
                    let thr = (all_vals[i] + all_vals[i + 1]) / 2.0;
                    let mut total_gain = 0.0;

                    // Squared loss: hessian is 1 per sample
                    for bucket in &buckets {
                        let (lg, lh, rg, rh) = bucket.iter().fold(
                            (0.0, 0.0, 0.0, 0.0),
                            |(lg, lh, rg, rh), &idx| {
                                if x[[idx, feat]] <= thr {
                                    (lg + gradients[idx], lh + 1.0, rg, rh)
                                } else {
                                    (lg, lh, rg + gradients[idx], rh + 1.0)
                                }
                            },
                        );
                        let parent_g = lg + rg;
                        let parent_h = lh + rh;
                        let parent_score = parent_g * parent_g / (parent_h + reg_lambda);
                        let left_score = lg * lg / (lh + reg_lambda);
                        let right_score = rg * rg / (rh + reg_lambda);
                        total_gain += left_score + right_score - parent_score;
                    }

                    if total_gain > best_gain {
                        best_gain = total_gain;
                        best_thr = thr;
                    }
                }

                if best_gain > 0.0 {
                    Some((feat, best_thr, best_gain))
                } else {
                    None
                }
            })
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal));

        match best {
            Some((feat, thr, _)) => {
                splits.push((feat, thr));
                let mut new_buckets = Vec::with_capacity(buckets.len() * 2);
                for bucket in &buckets {
                    let (left, right): (Vec<usize>, Vec<usize>) =
                        bucket.iter().partition(|&&i| x[[i, feat]] <= thr);
                    new_buckets.push(left);
                    new_buckets.push(right);
                }
                buckets = new_buckets;
            }
            None => break,
        }
    }

    let leaf_values: Vec<f64> = buckets
        .iter()
        .map(|bucket| {
            if bucket.is_empty() {
                return 0.0;
            }
            let g: f64 = bucket.iter().map(|&i| gradients[i]).sum();
            -g / (bucket.len() as f64 + reg_lambda)
        })
        .collect();

    SymmetricTree { splits, leaf_values }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatBoostRegressor {
    pub config: CatBoostConfig,
    trees: Vec<SymmetricTree>,
    base_prediction: f64,
    n_features: usize,
}

impl Default for CatBoostRegressor {
    fn default() -> Self {
        Self::new(CatBoostConfig::default())
    }
}

impl CatBoostRegressor {
    pub fn new(config: CatBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_prediction: 0.0,
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        let n = x.nrows();
        self.n_features = x.ncols();
        self.trees.clear();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));
        self.base_prediction = y.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n, self.base_prediction);

        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(&mut rng);

        for _ in 0..self.config.n_estimators {
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(y.iter())
                .map(|(&p, &yi)| p - yi)
                .collect();

            let indices: Vec<usize> = if self.config.subsample < 1.0 {
                let k = ((n as f64 * self.config.subsample).ceil() as usize).max(1);
                let mut sub = perm.clone();
                sub.shuffle(&mut rng);
                sub.truncate(k);
                sub
            } else {
                perm.clone()
            };

            let tree = build_symmetric_tree(
                x,
                &gradients,
                &indices,
                self.config.max_depth,
                self.config.reg_lambda,
            );

            for (pred, row) in predictions.iter_mut().zip(x.rows()) {
                *pred += self.config.learning_rate * tree.predict(&row);
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

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.base_prediction
                    + self
                        .trees
                        .iter()
                        .map(|t| self.config.learning_rate * t.predict(&row))
                        .sum::<f64>()
            })
            .collect())
    }
}

impl Regressor for CatBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        CatBoostRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        CatBoostRegressor::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    fn model_type(&self) -> &str {
        super::catalog::ModelKind::CatBoost.as_str()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
