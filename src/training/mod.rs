//! Regression models and the candidate catalog
//!
//! Provides the regressors the selector chooses between:
//! - Random Forest and Decision Tree
//! - Gradient boosting, AdaBoost, XGBoost, CatBoost
//! - Ordinary least squares
//! - K-Nearest Neighbors

mod models;
pub mod adaboost;
pub mod catalog;
pub mod catboost;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod xgboost;

pub use models::{r2_score, ModelMetrics, Regressor};
pub use adaboost::AdaBoostRegressor;
pub use catalog::{CatalogEntry, ModelCatalog, ModelKind};
pub use catboost::{CatBoostConfig, CatBoostRegressor};
pub use decision_tree::DecisionTreeRegressor;
pub use gradient_boosting::{GradientBoostingConfig, GradientBoostingRegressor};
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor};
pub use linear_models::LinearRegression;
pub use random_forest::{MaxFeatures, RandomForestRegressor};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};
