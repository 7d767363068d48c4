//! The model selector

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use super::config::ModelTrainerConfig;
use super::data::DatasetSplit;
use super::evaluator::{Evaluator, HoldoutEvaluator, ScoreReport};
use crate::error::{ModelTrainingError, Result, SelectorError, Stage, StageContext};
use crate::export::{JsonModelStore, ModelArtifact, ModelStore};
use crate::training::{ModelCatalog, ModelMetrics};

/// The catalog entry chosen by [`select_best`]
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedCandidate {
    /// Position in the catalog
    pub index: usize,
    pub name: String,
    pub score: f64,
}

/// Pick the best scored catalog entry.
///
/// The report must hold exactly one score per catalog name. NaN scores never
/// win, and among equal scores the earliest catalog entry is chosen.
pub fn select_best(catalog: &ModelCatalog, report: &ScoreReport) -> Result<SelectedCandidate> {
    if catalog.is_empty() {
        return Err(SelectorError::ValidationError(
            "Model catalog is empty".to_string(),
        ));
    }

    for name in report.names() {
        if catalog.position(name).is_none() {
            return Err(SelectorError::EvaluatorError {
                model: name.to_string(),
                reason: "score reported for a model that is not in the catalog".to_string(),
            });
        }
    }
    if report.len() != catalog.len() {
        return Err(SelectorError::EvaluatorError {
            model: report.names().join(", "),
            reason: format!("expected {} scores, got {}", catalog.len(), report.len()),
        });
    }

    let mut best: Option<SelectedCandidate> = None;
    for (index, entry) in catalog.iter().enumerate() {
        let score = report.get(&entry.name).ok_or_else(|| SelectorError::EvaluatorError {
            model: entry.name.clone(),
            reason: "no score reported".to_string(),
        })?;
        if score.is_nan() {
            continue;
        }
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(SelectedCandidate {
                index,
                name: entry.name.clone(),
                score,
            });
        }
    }

    best.ok_or_else(|| SelectorError::EvaluatorError {
        model: catalog.names().join(", "),
        reason: "no model produced a comparable score".to_string(),
    })
}

/// Result of a successful selection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionOutcome {
    /// Catalog name of the persisted model
    pub best_model: String,
    /// Evaluator score the model was selected with
    pub best_score: f64,
    /// Held-out R² of the persisted model
    pub r2: f64,
    pub metrics: ModelMetrics,
    pub report: ScoreReport,
    pub artifact_path: PathBuf,
}

/// Selects the best regressor for a train/test split and persists it
pub struct ModelTrainer<E = HoldoutEvaluator, S = JsonModelStore> {
    config: ModelTrainerConfig,
    evaluator: E,
    store: S,
}

impl ModelTrainer<HoldoutEvaluator, JsonModelStore> {
    /// Trainer with the holdout evaluator and the JSON store
    pub fn new(config: ModelTrainerConfig) -> Self {
        let evaluator = HoldoutEvaluator::new(config.parallel_evaluation);
        Self {
            config,
            evaluator,
            store: JsonModelStore::new(),
        }
    }
}

impl Default for ModelTrainer<HoldoutEvaluator, JsonModelStore> {
    fn default() -> Self {
        Self::new(ModelTrainerConfig::default())
    }
}

impl<E: Evaluator, S: ModelStore> ModelTrainer<E, S> {
    pub fn with_components(config: ModelTrainerConfig, evaluator: E, store: S) -> Self {
        Self {
            config,
            evaluator,
            store,
        }
    }

    pub fn config(&self) -> &ModelTrainerConfig {
        &self.config
    }

    /// Select, persist and return the held-out R² of the best default model.
    ///
    /// Arrays carry the target in their last column.
    pub fn select_and_persist(
        &self,
        train: &Array2<f64>,
        test: &Array2<f64>,
    ) -> std::result::Result<f64, ModelTrainingError> {
        self.run(train, test).map(|outcome| outcome.r2)
    }

    /// Same as [`select_and_persist`](Self::select_and_persist), returning the full outcome
    pub fn run(
        &self,
        train: &Array2<f64>,
        test: &Array2<f64>,
    ) -> std::result::Result<SelectionOutcome, ModelTrainingError> {
        let catalog = ModelCatalog::default_regressors(self.config.random_state);
        self.run_with_catalog(catalog, train, test)
    }

    /// Run the selection over a caller-supplied catalog
    pub fn run_with_catalog(
        &self,
        mut catalog: ModelCatalog,
        train: &Array2<f64>,
        test: &Array2<f64>,
    ) -> std::result::Result<SelectionOutcome, ModelTrainingError> {
        self.config.validate().stage(Stage::Setup)?;
        if catalog.is_empty() {
            return Err(ModelTrainingError::new(
                Stage::Setup,
                SelectorError::ValidationError("Model catalog is empty".to_string()),
            ));
        }

        info!("Splitting training and test input data");
        let data = DatasetSplit::from_arrays(train, test).stage(Stage::Split)?;

        info!(n_models = catalog.len(), "Evaluating candidate models");
        let report = self.evaluator.evaluate(&mut catalog, &data).stage(Stage::Evaluate)?;

        let best = select_best(&catalog, &report).stage(Stage::Select)?;
        info!(model = %best.name, score = best.score, "Best model found");

        if best.score < self.config.quality_floor {
            warn!(
                model = %best.name,
                score = best.score,
                threshold = self.config.quality_floor,
                "No model reached the quality floor"
            );
            return Err(ModelTrainingError::new(
                Stage::Select,
                SelectorError::NoAcceptableModel {
                    best_model: Some(best.name),
                    best_score: best.score,
                    threshold: self.config.quality_floor,
                },
            ));
        }

        let entry = catalog
            .get(best.index)
            .ok_or_else(|| SelectorError::ComputationError(format!("Selected index {} out of range", best.index)))
            .stage(Stage::Select)?;

        let y_pred = entry.model.predict(&data.x_test).stage(Stage::Score)?;
        let metrics = ModelMetrics::compute_regression(&data.y_test, &y_pred).stage(Stage::Score)?;

        let path = &self.config.trained_model_file_path;
        let artifact = ModelArtifact::from_model(&entry.name, entry.model.as_ref(), best.score, metrics.r2)
            .stage(Stage::Persist)?;
        self.store.save(path, &artifact).stage(Stage::Persist)?;

        info!(model = %best.name, r2 = metrics.r2, "Model selection completed");

        Ok(SelectionOutcome {
            best_model: best.name,
            best_score: best.score,
            r2: metrics.r2,
            metrics,
            report,
            artifact_path: path.clone(),
        })
    }
}
