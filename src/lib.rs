//! Kolosal Selector - best-regressor selection over a train/test split
//!
//! Fits a fixed catalog of regression models, keeps the one with the highest
//! held-out score, persists it and reports its R².
//!
//! # Modules
//!
//! - [`training`] - Regressors, regression metrics and the model catalog
//! - [`selection`] - Input splitting, evaluation and the [`ModelTrainer`]
//! - [`export`] - JSON model artifacts
//! - [`error`] - Error taxonomy
//!
//! # Example
//!
//! ```no_run
//! use kolosal_selector::prelude::*;
//! use ndarray::Array2;
//!
//! # fn main() -> std::result::Result<(), ModelTrainingError> {
//! let train = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { 3.0 * i as f64 });
//! let test = Array2::from_shape_fn((10, 2), |(i, j)| if j == 0 { i as f64 } else { 3.0 * i as f64 });
//!
//! let trainer = ModelTrainer::new(ModelTrainerConfig::default());
//! let r2 = trainer.select_and_persist(&train, &test)?;
//! println!("held-out R²: {r2:.4}");
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Models
pub mod training;

// Selection pipeline
pub mod selection;

// Persistence
pub mod export;

pub use error::{ModelTrainingError, Result, SelectorError, Stage};
pub use selection::{ModelTrainer, ModelTrainerConfig};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ModelTrainingError, Result, SelectorError, Stage};

    // Training
    pub use crate::training::{r2_score, ModelCatalog, ModelKind, ModelMetrics, Regressor};

    // Selection
    pub use crate::selection::{
        select_best, DatasetSplit, Evaluator, HoldoutEvaluator, ModelTrainer, ModelTrainerConfig,
        ScoreReport, SelectionOutcome,
    };

    // Export
    pub use crate::export::{load_model, JsonModelStore, ModelArtifact, ModelStore};
}
