//! Fitting and scoring the catalog

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use super::data::DatasetSplit;
use crate::error::{Result, SelectorError};
use crate::training::{r2_score, CatalogEntry, ModelCatalog};

/// Score of one catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub model_name: String,
    /// Higher is better
    pub score: f64,
    pub training_time_secs: f64,
}

/// Scores of a catalog, in catalog order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    scores: Vec<ModelScore>,
}

impl ScoreReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a score without timing information
    pub fn with_score(mut self, model_name: impl Into<String>, score: f64) -> Self {
        self.push(ModelScore {
            model_name: model_name.into(),
            score,
            training_time_secs: 0.0,
        });
        self
    }

    pub fn push(&mut self, score: ModelScore) {
        self.scores.push(score);
    }

    /// Score recorded for `model_name`
    pub fn get(&self, model_name: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.model_name == model_name)
            .map(|s| s.score)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModelScore> {
        self.scores.iter()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.scores.iter().map(|s| s.model_name.as_str()).collect()
    }
}

impl FromIterator<ModelScore> for ScoreReport {
    fn from_iter<I: IntoIterator<Item = ModelScore>>(iter: I) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

/// Fits every catalog model and scores it.
///
/// Implementations return one score per catalog entry, keyed by the entry
/// name, and leave the models fitted.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, catalog: &mut ModelCatalog, data: &DatasetSplit) -> Result<ScoreReport>;
}

/// Fits on the training partition and scores R² on the test partition
#[derive(Debug, Clone, Copy)]
pub struct HoldoutEvaluator {
    /// Evaluate models concurrently
    pub parallel: bool,
}

impl Default for HoldoutEvaluator {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl HoldoutEvaluator {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    fn evaluate_entry(entry: &mut CatalogEntry, data: &DatasetSplit) -> Result<ModelScore> {
        let start = Instant::now();
        let as_evaluator_error = |e: SelectorError| SelectorError::EvaluatorError {
            model: entry.name.clone(),
            reason: e.to_string(),
        };

        entry
            .model
            .fit(&data.x_train, &data.y_train)
            .map_err(&as_evaluator_error)?;
        let y_pred = entry.model.predict(&data.x_test).map_err(&as_evaluator_error)?;
        let score = r2_score(&data.y_test, &y_pred).map_err(&as_evaluator_error)?;
        let elapsed = start.elapsed().as_secs_f64();

        debug!(model = %entry.name, score, elapsed_secs = elapsed, "Model evaluated");

        Ok(ModelScore {
            model_name: entry.name.clone(),
            score,
            training_time_secs: elapsed,
        })
    }
}

impl Evaluator for HoldoutEvaluator {
    fn evaluate(&self, catalog: &mut ModelCatalog, data: &DatasetSplit) -> Result<ScoreReport> {
        let entries = catalog.as_mut_slice();

        // collect() keeps input order in both branches
        let scores: Vec<ModelScore> = if self.parallel {
            entries
                .par_iter_mut()
                .map(|entry| Self::evaluate_entry(entry, data))
                .collect::<Result<_>>()?
        } else {
            entries
                .iter_mut()
                .map(|entry| Self::evaluate_entry(entry, data))
                .collect::<Result<_>>()?
        };

        Ok(scores.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ModelKind;
    use ndarray::Array2;

    fn linear_split() -> DatasetSplit {
        let train = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { 2.0 * i as f64 + 1.0 });
        let test = Array2::from_shape_fn((10, 2), |(i, j)| {
            let x = i as f64 + 0.5;
            if j == 0 { x } else { 2.0 * x + 1.0 }
        });
        DatasetSplit::from_arrays(&train, &test).unwrap()
    }

    fn small_catalog() -> ModelCatalog {
        ModelCatalog::new()
            .with_model("tree", ModelKind::DecisionTree.build(None))
            .unwrap()
            .with_model("ols", ModelKind::LinearRegression.build(None))
            .unwrap()
    }

    #[test]
    fn test_report_in_catalog_order() {
        let data = linear_split();
        for parallel in [true, false] {
            let mut catalog = small_catalog();
            let report = HoldoutEvaluator::new(parallel).evaluate(&mut catalog, &data).unwrap();

            assert_eq!(report.names(), vec!["tree", "ols"]);
            assert!(report.get("ols").unwrap() > 0.999);
            assert!(catalog.iter().all(|e| e.model.is_fitted()));
        }
    }

    #[test]
    fn test_fit_failure_names_model() {
        let train = Array2::from_shape_fn((3, 2), |(i, _)| i as f64);
        let test = Array2::from_shape_fn((2, 2), |(i, _)| i as f64);
        let data = DatasetSplit::from_arrays(&train, &test).unwrap();

        let mut catalog = ModelCatalog::new()
            .with_model(
                "knn0",
                Box::new(crate::training::KNNRegressor::with_k(0)),
            )
            .unwrap();

        match HoldoutEvaluator::default().evaluate(&mut catalog, &data) {
            Err(SelectorError::EvaluatorError { model, .. }) => assert_eq!(model, "knn0"),
            other => panic!("expected EvaluatorError, got {:?}", other),
        }
    }
}
