//! Ordered catalog of candidate regressors

use serde::{Deserialize, Serialize};

use super::adaboost::AdaBoostRegressor;
use super::catboost::{CatBoostConfig, CatBoostRegressor};
use super::decision_tree::DecisionTreeRegressor;
use super::gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
use super::knn::KNNRegressor;
use super::linear_models::LinearRegression;
use super::models::Regressor;
use super::random_forest::RandomForestRegressor;
use super::xgboost::{XGBoostConfig, XGBoostRegressor};
use crate::error::{Result, SelectorError};

/// Built-in regressor families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Random Forest
    RandomForest,
    /// Ordinary least squares
    LinearRegression,
    /// Decision Tree
    DecisionTree,
    /// Gradient Boosted Trees
    GradientBoosting,
    /// AdaBoost.R2
    AdaBoost,
    /// XGBoost
    XGBoost,
    /// CatBoost (symmetric trees)
    CatBoost,
    /// K-Nearest Neighbors
    KNearestNeighbors,
}

impl ModelKind {
    /// All kinds in default catalog order
    pub const ALL: [ModelKind; 8] = [
        ModelKind::RandomForest,
        ModelKind::LinearRegression,
        ModelKind::DecisionTree,
        ModelKind::GradientBoosting,
        ModelKind::AdaBoost,
        ModelKind::XGBoost,
        ModelKind::CatBoost,
        ModelKind::KNearestNeighbors,
    ];

    /// Type tag stored in persisted artifacts
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::DecisionTree => "decision_tree",
            ModelKind::GradientBoosting => "gradient_boosting",
            ModelKind::AdaBoost => "adaboost",
            ModelKind::XGBoost => "xgboost",
            ModelKind::CatBoost => "catboost",
            ModelKind::KNearestNeighbors => "knn",
        }
    }

    /// Name used for the entry in the default catalog
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::DecisionTree => "Decision Tree",
            ModelKind::GradientBoosting => "Gradient Boosting",
            ModelKind::AdaBoost => "AdaBoost Regressor",
            ModelKind::XGBoost => "XGBoost Regressor",
            ModelKind::CatBoost => "CatBoost Regressor",
            ModelKind::KNearestNeighbors => "K-Nearest Neighbors",
        }
    }

    pub fn from_type_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == tag)
    }

    /// Build an unfitted regressor of this kind with its default configuration
    pub fn build(&self, random_state: Option<u64>) -> Box<dyn Regressor> {
        match self {
            ModelKind::RandomForest => {
                let mut forest = RandomForestRegressor::default();
                forest.random_state = random_state;
                Box::new(forest)
            }
            ModelKind::LinearRegression => Box::new(LinearRegression::new()),
            ModelKind::DecisionTree => Box::new(DecisionTreeRegressor::new()),
            ModelKind::GradientBoosting => Box::new(GradientBoostingRegressor::new(GradientBoostingConfig {
                random_state,
                ..Default::default()
            })),
            ModelKind::AdaBoost => {
                let mut ada = AdaBoostRegressor::default();
                ada.random_state = random_state;
                Box::new(ada)
            }
            ModelKind::XGBoost => Box::new(XGBoostRegressor::new(XGBoostConfig {
                random_state,
                ..Default::default()
            })),
            ModelKind::CatBoost => Box::new(CatBoostRegressor::new(CatBoostConfig {
                random_state,
                ..Default::default()
            })),
            ModelKind::KNearestNeighbors => Box::new(KNNRegressor::default()),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A named candidate in the catalog
pub struct CatalogEntry {
    pub name: String,
    pub model: Box<dyn Regressor>,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("model_type", &self.model.model_type())
            .field("fitted", &self.model.is_fitted())
            .finish()
    }
}

/// Ordered collection of named regressors.
///
/// Declaration order is iteration order, and names are unique.
#[derive(Debug, Default)]
pub struct ModelCatalog {
    entries: Vec<CatalogEntry>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The eight built-in regressors in their fixed order
    pub fn default_regressors(random_state: Option<u64>) -> Self {
        let entries = ModelKind::ALL
            .iter()
            .map(|kind| CatalogEntry {
                name: kind.display_name().to_string(),
                model: kind.build(random_state),
            })
            .collect();
        Self { entries }
    }

    /// Builder-style insertion
    pub fn with_model(mut self, name: impl Into<String>, model: Box<dyn Regressor>) -> Result<Self> {
        self.push(name, model)?;
        Ok(self)
    }

    /// Append a model; duplicate names are rejected
    pub fn push(&mut self, name: impl Into<String>, model: Box<dyn Regressor>) -> Result<()> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(SelectorError::ValidationError(format!(
                "Duplicate model name in catalog: {}",
                name
            )));
        }
        self.entries.push(CatalogEntry { name, model });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CatalogEntry> {
        self.entries.iter_mut()
    }

    pub fn as_mut_slice(&mut self) -> &mut [CatalogEntry] {
        &mut self.entries
    }

    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    /// Index of the entry with the given name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }
}

impl<'a> IntoIterator for &'a ModelCatalog {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
