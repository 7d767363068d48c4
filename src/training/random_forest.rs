//! Random Forest regressor

use super::decision_tree::DecisionTreeRegressor;
use super::models::{check_fit_input, check_predict_input, Regressor};
use crate::error::{Result, SelectorError};
use ndarray::{Array1, Array2, Axis};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// One bagged tree and the columns it was grown on
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestMember {
    tree: DecisionTreeRegressor,
    columns: Vec<usize>,
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    /// Individual trees
    members: Vec<ForestMember>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Maximum features per tree
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random state
    pub random_state: Option<u64>,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForestRegressor {
    /// Create a new regressor forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            members: Vec::new(),
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: None,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        let n = match self.max_features {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        n.clamp(1, n_features)
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_fit_input(x, y)?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        self.n_features = n_features;
        let max_features = self.compute_max_features(n_features);
        let base_seed = self.random_state.unwrap_or(42);

        let members: Result<Vec<ForestMember>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<ForestMember> {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));

                let rows: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut columns: Vec<usize> = if max_features < n_features {
                    index::sample(&mut rng, n_features, max_features).into_vec()
                } else {
                    (0..n_features).collect()
                };
                columns.sort_unstable();

                let x_boot = x.select(Axis(0), &rows).select(Axis(1), &columns);
                let y_boot: Array1<f64> = rows.iter().map(|&i| y[i]).collect();

                let mut tree = DecisionTreeRegressor::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree.fit(&x_boot, &y_boot)?;

                Ok(ForestMember { tree, columns })
            })
            .collect();

        self.members = members?;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = vec![0.0; self.n_features];

        for member in &self.members {
            if let Some(imp) = member.tree.feature_importances() {
                for (&col, &val) in member.columns.iter().zip(imp.iter()) {
                    total_importances[col] += val;
                }
            }
        }

        let total: f64 = total_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut total_importances {
                *imp /= total;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total_importances));
    }

    /// Make predictions (mean over trees)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.members.is_empty() {
            return Err(SelectorError::ModelNotFitted);
        }
        check_predict_input(x, self.n_features)?;

        let all_predictions: Result<Vec<Array1<f64>>> = self
            .members
            .par_iter()
            .map(|member| member.tree.predict(&x.select(Axis(1), &member.columns)))
            .collect();
        let all_predictions = all_predictions?;

        let mut mean = Array1::zeros(x.nrows());
        for preds in &all_predictions {
            mean += preds;
        }
        Ok(mean / all_predictions.len() as f64)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.members.len()
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForestRegressor::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForestRegressor::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        !self.members.is_empty()
    }

    fn model_type(&self) -> &str {
        super::catalog::ModelKind::RandomForest.as_str()
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}
