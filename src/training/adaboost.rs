//! AdaBoost regressor (AdaBoost.R2)
//!
//! Each round grows a shallow tree on a weighted bootstrap of the training set,
//! re-weights samples by their normalized (linear) loss and stores the tree
//! with a confidence weight. Predictions are the weighted median over trees.

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, SelectorError};
use ndarray::{Array1, Array2, Axis};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// AdaBoost Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostRegressor {
    pub n_estimators: usize,
    pub learning_rate: f64,
    /// Depth of each weak learner
    pub max_depth: usize,
    pub random_state: Option<u64>,
    estimators: Vec<DecisionTreeRegressor>,
    estimator_weights: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostRegressor {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostRegressor {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            learning_rate,
            max_depth: 3,
            random_state: None,
            estimators: Vec::new(),
            estimator_weights: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.estimators.clear();
        self.estimator_weights.clear();

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.unwrap_or(42));
        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        for _round in 0..self.n_estimators {
            let sampler = WeightedIndex::new(weights.iter())
                .map_err(|e| SelectorError::ComputationError(format!("Invalid sample weights: {}", e)))?;
            let rows: Vec<usize> = (0..n_samples).map(|_| sampler.sample(&mut rng)).collect();

            let x_boot = x.select(Axis(0), &rows);
            let y_boot: Array1<f64> = rows.iter().map(|&i| y[i]).collect();

            let mut tree = DecisionTreeRegressor::new().with_max_depth(self.max_depth);
            tree.fit(&x_boot, &y_boot)?;

            let predictions = tree.predict(x)?;
            let mut loss: Array1<f64> = (&predictions - y).mapv(f64::abs);
            let max_loss = loss.fold(0.0f64, |m, &v| m.max(v));
            if max_loss > 0.0 {
                loss /= max_loss;
            }

            let estimator_error = weights.dot(&loss);

            // Perfect fit: keep it and stop early
            if estimator_error <= 0.0 {
                self.estimators.push(tree);
                self.estimator_weights.push(1.0);
                break;
            }

            // Worse than chance: discard unless it is the only learner
            if estimator_error >= 0.5 {
                if self.estimators.is_empty() {
                    self.estimators.push(tree);
                    self.estimator_weights.push(1.0);
                }
                break;
            }

            let beta = estimator_error / (1.0 - estimator_error);
            let alpha = self.learning_rate * (1.0 / beta).ln();

            for (w, l) in weights.iter_mut().zip(loss.iter()) {
                *w *= beta.powf((1.0 - l) * self.learning_rate);
            }
            let w_sum = weights.sum();
            if w_sum <= 0.0 {
                break;
            }
            weights /= w_sum;

            self.estimators.push(tree);
            self.estimator_weights.push(alpha);
        }

        Ok(self)
    }

    /// Weighted median of the learners' predictions
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.estimators.is_empty() {
            return Err(SelectorError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let all_predictions: Vec<Array1<f64>> = self
            .estimators
            .iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<_>>()?;

        let total_weight: f64 = self.estimator_weights.iter().sum();

        let predictions = (0..x.nrows())
            .map(|i| {
                let mut votes: Vec<(f64, f64)> = all_predictions
                    .iter()
                    .zip(self.estimator_weights.iter())
                    .map(|(p, &w)| (p[i], w))
                    .collect();
                votes.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

                let half = 0.5 * total_weight;
                let mut cumulative = 0.0;
                for &(value, weight) in &votes {
                    cumulative += weight;
                    if cumulative >= half {
                        return value;
                    }
                }
                votes.last().map_or(0.0, |v| v.0)
            })
            .collect();

        Ok(predictions)
    }

    /// Number of learners kept after boosting
    pub fn n_learners(&self) -> usize {
        self.estimators.len()
    }
}

impl Regressor for AdaBoostRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        AdaBoostRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        AdaBoostRegressor::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        !self.estimators.is_empty()
    }

    fn model_type(&self) -> &str {
        super::catalog::ModelKind::AdaBoost.as_str()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::r2_score;
    use ndarray::array;

    #[test]
    fn test_adaboost_regressor() {
        let x = Array2::from_shape_vec((40, 1), (0..40).map(|i| i as f64).collect()).unwrap();
        let y: Array1<f64> = x.column(0).mapv(|v| (v / 4.0).sin() * 3.0 + v * 0.1);

        let mut model = AdaBoostRegressor::default().with_random_state(1);
        model.fit(&x, &y).unwrap();

        assert!(model.n_learners() >= 1);
        let r2 = r2_score(&y, &model.predict(&x).unwrap()).unwrap();
        assert!(r2 > 0.6, "AdaBoost R² = {}", r2);
    }

    #[test]
    fn test_perfect_learner_stops_early() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![5.0, 5.0, 5.0, 5.0];

        let mut model = AdaBoostRegressor::new(10, 1.0);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.n_learners(), 1);
        assert_eq!(model.predict(&x).unwrap(), y);
    }
}
