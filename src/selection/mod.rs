//! Model selection
//!
//! Splits the input arrays, scores every catalog model, keeps the best one
//! if it clears the quality floor and persists it.

mod config;
mod data;
mod evaluator;
mod trainer;

pub use config::{ModelTrainerConfig, DEFAULT_MODEL_PATH, DEFAULT_QUALITY_FLOOR};
pub use data::DatasetSplit;
pub use evaluator::{Evaluator, HoldoutEvaluator, ModelScore, ScoreReport};
pub use trainer::{select_best, ModelTrainer, SelectedCandidate, SelectionOutcome};
