//! Integration test: model selection end-to-end

use kolosal_selector::prelude::*;
use ndarray::{Array1, Array2};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Predicts the first feature plus a fixed offset
struct OffsetRegressor {
    offset: f64,
    fitted: bool,
}

impl OffsetRegressor {
    fn boxed(offset: f64) -> Box<dyn Regressor> {
        Box::new(Self { offset, fitted: false })
    }
}

impl Regressor for OffsetRegressor {
    fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.fitted {
            return Err(SelectorError::ModelNotFitted);
        }
        Ok(x.column(0).mapv(|v| v + self.offset))
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn model_type(&self) -> &str {
        "offset"
    }

    fn to_json(&self) -> Result<serde_json::Value> {
        Ok(json!({ "offset": self.offset }))
    }
}

/// Fits every model and reports preset scores
struct FixedScores {
    scores: Vec<(&'static str, f64)>,
    calls: Arc<AtomicUsize>,
}

impl FixedScores {
    fn new(scores: Vec<(&'static str, f64)>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { scores, calls: calls.clone() }, calls)
    }
}

impl Evaluator for FixedScores {
    fn evaluate(&self, catalog: &mut ModelCatalog, data: &DatasetSplit) -> Result<ScoreReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for entry in catalog.iter_mut() {
            entry.model.fit(&data.x_train, &data.y_train)?;
        }
        Ok(self
            .scores
            .iter()
            .fold(ScoreReport::new(), |report, (name, score)| report.with_score(*name, *score)))
    }
}

/// Keeps saved artifacts in memory
#[derive(Clone, Default)]
struct RecordingStore {
    saved: Arc<Mutex<Vec<ModelArtifact>>>,
}

impl ModelStore for RecordingStore {
    fn save(&self, _path: &Path, artifact: &ModelArtifact) -> Result<()> {
        self.saved.lock().unwrap().push(artifact.clone());
        Ok(())
    }
}

fn abc_catalog() -> ModelCatalog {
    ModelCatalog::new()
        .with_model("A", OffsetRegressor::boxed(0.5))
        .unwrap()
        .with_model("B", OffsetRegressor::boxed(3.0))
        .unwrap()
        .with_model("C", OffsetRegressor::boxed(0.0))
        .unwrap()
}

/// Target equals the single feature
fn identity_arrays() -> (Array2<f64>, Array2<f64>) {
    let train = Array2::from_shape_fn((10, 2), |(i, _)| i as f64);
    let test = Array2::from_shape_fn((5, 2), |(i, _)| i as f64 * 2.0);
    (train, test)
}

/// Noisy linear data; test rows lie beyond the training range
fn linear_arrays() -> (Array2<f64>, Array2<f64>) {
    let row = |i: usize| {
        let x1 = i as f64 * 0.5;
        let x2 = ((i * 7) % 11) as f64;
        let noise = ((i * 13) % 5) as f64 * 0.01 - 0.02;
        [x1, x2, 3.0 * x1 - 2.0 * x2 + 5.0 + noise]
    };
    let train = Array2::from_shape_fn((60, 3), |(i, j)| row(i)[j]);
    let test = Array2::from_shape_fn((20, 3), |(i, j)| row(i + 60)[j]);
    (train, test)
}

#[test]
fn test_first_of_tied_best_is_persisted() {
    let (train, test) = identity_arrays();
    let (evaluator, _) = FixedScores::new(vec![("A", 0.9), ("B", 0.5), ("C", 0.9)]);
    let store = RecordingStore::default();
    let trainer = ModelTrainer::with_components(ModelTrainerConfig::default(), evaluator, store.clone());

    let outcome = trainer.run_with_catalog(abc_catalog(), &train, &test);
    assert!(outcome.is_ok(), "Selection should succeed: {:?}", outcome.err());
    let outcome = outcome.unwrap();

    let y_test = test.column(1).to_owned();
    let expected_r2 = r2_score(&y_test, &y_test.mapv(|v| v + 0.5)).unwrap();

    assert_eq!(outcome.best_model, "A");
    assert_eq!(outcome.best_score, 0.9);
    assert!((outcome.r2 - expected_r2).abs() < 1e-12);

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].model_name, "A");
    assert_eq!(saved[0].model, json!({ "offset": 0.5 }));
}

#[test]
fn test_below_floor_persists_nothing() {
    let (train, test) = identity_arrays();
    let (evaluator, _) = FixedScores::new(vec![("A", 0.4), ("B", 0.2)]);
    let store = RecordingStore::default();
    let trainer = ModelTrainer::with_components(ModelTrainerConfig::default(), evaluator, store.clone());

    let catalog = ModelCatalog::new()
        .with_model("A", OffsetRegressor::boxed(0.0))
        .unwrap()
        .with_model("B", OffsetRegressor::boxed(1.0))
        .unwrap();

    let err = trainer.run_with_catalog(catalog, &train, &test).unwrap_err();
    assert_eq!(err.stage, Stage::Select);
    assert!(err.is_no_acceptable_model());
    match err.cause() {
        SelectorError::NoAcceptableModel { best_model, best_score, threshold } => {
            assert_eq!(best_model.as_deref(), Some("A"));
            assert_eq!(*best_score, 0.4);
            assert_eq!(*threshold, 0.6);
        }
        other => panic!("unexpected cause: {:?}", other),
    }
    assert!(store.saved.lock().unwrap().is_empty());
}

#[test]
fn test_single_column_rejected_before_evaluation() {
    let train = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
    let test = Array2::from_shape_fn((5, 1), |(i, _)| i as f64);
    let (evaluator, calls) = FixedScores::new(vec![("A", 0.9)]);
    let trainer = ModelTrainer::with_components(ModelTrainerConfig::default(), evaluator, RecordingStore::default());

    let err = trainer.run_with_catalog(abc_catalog(), &train, &test).unwrap_err();
    assert_eq!(err.stage, Stage::Split);
    assert!(matches!(err.cause(), SelectorError::ShapeError { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_mismatched_widths_fail_at_split() {
    let train = Array2::from_shape_fn((10, 3), |(i, _)| i as f64);
    let test = Array2::from_shape_fn((5, 2), |(i, _)| i as f64);
    let trainer = ModelTrainer::new(ModelTrainerConfig::default());

    let err = trainer.select_and_persist(&train, &test).unwrap_err();
    assert_eq!(err.stage, Stage::Split);
    assert!(matches!(err.cause(), SelectorError::ShapeError { .. }));
}

#[test]
fn test_missing_score_fails_at_select() {
    let (train, test) = identity_arrays();
    let (evaluator, _) = FixedScores::new(vec![("A", 0.9), ("C", 0.8)]);
    let store = RecordingStore::default();
    let trainer = ModelTrainer::with_components(ModelTrainerConfig::default(), evaluator, store.clone());

    let err = trainer.run_with_catalog(abc_catalog(), &train, &test).unwrap_err();
    assert_eq!(err.stage, Stage::Select);
    assert!(matches!(err.cause(), SelectorError::EvaluatorError { .. }));
    assert!(store.saved.lock().unwrap().is_empty());
}

#[test]
fn test_persistence_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"file, not a directory").unwrap();

    let (train, test) = identity_arrays();
    let (evaluator, _) = FixedScores::new(vec![("A", 0.9), ("B", 0.5), ("C", 0.7)]);
    let config = ModelTrainerConfig::default().with_model_path(blocker.join("model.json"));
    let trainer = ModelTrainer::with_components(config, evaluator, JsonModelStore::new());

    let err = trainer.run_with_catalog(abc_catalog(), &train, &test).unwrap_err();
    assert_eq!(err.stage, Stage::Persist);
    assert!(matches!(err.cause(), SelectorError::PersistenceError { .. }));
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_repeated_runs_write_identical_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (train, test) = linear_arrays();
    let catalog = || {
        ModelCatalog::new()
            .with_model("Random Forest", ModelKind::RandomForest.build(Some(7)))
            .unwrap()
            .with_model("Decision Tree", ModelKind::DecisionTree.build(Some(7)))
            .unwrap()
    };

    let mut contents = Vec::new();
    for run in 0..2 {
        let path = dir.path().join(format!("run{}", run)).join("model.json");
        let trainer = ModelTrainer::new(ModelTrainerConfig::new(&path).with_quality_floor(-1.0e6));
        let outcome = trainer.run_with_catalog(catalog(), &train, &test).unwrap();
        assert_eq!(outcome.artifact_path, path);
        contents.push(std::fs::read(&path).unwrap());
    }

    assert_eq!(contents[0], contents[1]);
}

#[test]
fn test_default_catalog_selects_linear_regression() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("artifacts").join("model.json");
    let (train, test) = linear_arrays();

    let trainer = ModelTrainer::new(ModelTrainerConfig::new(&path));
    let outcome = trainer.run(&train, &test);
    assert!(outcome.is_ok(), "Selection should succeed: {:?}", outcome.err());
    let outcome = outcome.unwrap();

    assert_eq!(outcome.best_model, "Linear Regression");
    assert!(outcome.r2 > 0.95, "R² ({}) should be high", outcome.r2);
    assert_eq!(outcome.report.len(), 8);
    assert_eq!(outcome.report.names(), ModelCatalog::default_regressors(None).names());

    let (artifact, model) = load_model(&path).unwrap();
    assert_eq!(artifact.model_name, "Linear Regression");
    assert_eq!(artifact.model_type, "linear_regression");
    assert_eq!(artifact.r2_score, outcome.r2);

    let split = DatasetSplit::from_arrays(&train, &test).unwrap();
    let restored_r2 = r2_score(&split.y_test, &model.predict(&split.x_test).unwrap()).unwrap();
    assert!((restored_r2 - outcome.r2).abs() < 1e-9);
}

#[test]
fn test_select_and_persist_returns_r2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let (train, test) = linear_arrays();

    let trainer = ModelTrainer::new(
        ModelTrainerConfig::new(&path).with_parallel_evaluation(false),
    );
    let r2 = trainer.select_and_persist(&train, &test).unwrap();

    assert!(r2.is_finite() && r2 <= 1.0);
    assert!(path.exists());
}

#[test]
fn test_single_training_row_still_selects() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let train = ndarray::array![[1.0, 2.0]];
    let test = ndarray::array![[1.0, 2.0], [1.0, 2.0]];

    let trainer = ModelTrainer::new(ModelTrainerConfig::new(&path));
    let outcome = trainer.run(&train, &test);
    assert!(outcome.is_ok(), "One training row should be enough: {:?}", outcome.err());

    let outcome = outcome.unwrap();
    assert_eq!(outcome.r2, 1.0);
    assert!(outcome.report.iter().all(|score| score.score == 1.0));
    assert!(path.exists());
}

#[test]
fn test_deep_tree_artifact_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let rows = Array2::from_shape_fn((200, 2), |(i, j)| if j == 0 { i as f64 } else { 4f64.powi(i as i32) });

    let catalog = ModelCatalog::new()
        .with_model("Decision Tree", ModelKind::DecisionTree.build(None))
        .unwrap();
    let trainer = ModelTrainer::new(ModelTrainerConfig::new(&path));
    let outcome = trainer.run_with_catalog(catalog, &rows, &rows).unwrap();

    let loaded = load_model(&path);
    assert!(loaded.is_ok(), "Deep tree should load: {:?}", loaded.err());
    let (artifact, model) = loaded.unwrap();
    assert_eq!(artifact.r2_score, outcome.r2);

    let split = DatasetSplit::from_arrays(&rows, &rows).unwrap();
    assert_eq!(model.predict(&split.x_test).unwrap(), split.y_test);
}
