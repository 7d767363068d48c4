//! Least-squares boosting over shallow CART trees
//!
//! The ensemble starts from the target mean. Every stage grows a tree on the
//! residuals of the rows drawn for that stage, and its output is added to the
//! running prediction scaled by the learning rate.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, SelectorError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    pub n_estimators: usize,
    /// Shrinkage applied to every stage
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Share of rows drawn without replacement for each stage
    pub subsample: f64,
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    stages: Vec<DecisionTreeRegressor>,
    baseline: f64,
    importances: Vec<f64>,
    n_features: usize,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            stages: Vec::new(),
            baseline: 0.0,
            importances: Vec::new(),
            n_features: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_fit_input(x, y)?;

        let (n_samples, n_features) = x.dim();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(42));

        self.baseline = y.mean().unwrap_or(0.0);
        let mut fitted = Array1::from_elem(n_samples, self.baseline);
        let mut importance_sum = Array1::<f64>::zeros(n_features);
        let mut stages = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            let rows = self.draw_rows(n_samples, &mut rng);
            let residuals = (y - &fitted).select(Axis(0), &rows);
            let stage = self.fit_stage(&x.select(Axis(0), &rows), &residuals)?;

            fitted.scaled_add(self.config.learning_rate, &stage.predict(x)?);
            if let Some(stage_importance) = stage.feature_importances() {
                importance_sum += stage_importance;
            }
            stages.push(stage);
        }

        let total = importance_sum.sum();
        if total > 0.0 {
            importance_sum /= total;
        }

        self.stages = stages;
        self.importances = importance_sum.to_vec();
        self.n_features = n_features;
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(SelectorError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        self.stages
            .iter()
            .try_fold(Array1::from_elem(x.nrows(), self.baseline), |mut acc, stage| -> Result<Array1<f64>> {
                acc.scaled_add(self.config.learning_rate, &stage.predict(x)?);
                Ok(acc)
            })
    }

    /// Normalized impurity decrease summed over stages
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    fn fit_stage(&self, x: &Array2<f64>, residuals: &Array1<f64>) -> Result<DecisionTreeRegressor> {
        let mut tree = DecisionTreeRegressor::new()
            .with_max_depth(self.config.max_depth)
            .with_min_samples_leaf(self.config.min_samples_leaf);
        tree.fit(x, residuals)?;
        Ok(tree)
    }

    fn draw_rows(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        if self.config.subsample >= 1.0 {
            return (0..n).collect();
        }
        let k = (((n as f64) * self.config.subsample).ceil() as usize).clamp(1, n);
        let mut rows = rand::seq::index::sample(rng, n, k).into_vec();
        rows.sort_unstable();
        rows
    }
}

impl Regressor for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostingRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostingRegressor::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    fn model_type(&self) -> &str {
        super::catalog::ModelKind::GradientBoosting.as_str()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
