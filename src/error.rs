//! Error types for the model selector

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for selector operations
pub type Result<T> = std::result::Result<T, SelectorError>;

/// Error raised by a single step of the selection pipeline
#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("No best model found: best score {best_score:.4} is below the quality floor {threshold}")]
    NoAcceptableModel {
        best_model: Option<String>,
        best_score: f64,
        threshold: f64,
    },

    #[error("Failed to persist model to {}: {source}", .path.display())]
    PersistenceError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Evaluation of '{model}' failed: {reason}")]
    EvaluatorError { model: String, reason: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for SelectorError {
    fn from(err: serde_json::Error) -> Self {
        SelectorError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SelectorError {
    fn from(err: ndarray::ShapeError) -> Self {
        SelectorError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

/// Pipeline stage at which a selection run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Configuration validation
    Setup,
    /// Splitting the input arrays into features and target
    Split,
    /// Fitting and scoring the catalog
    Evaluate,
    /// Picking the best model and applying the quality floor
    Select,
    /// Computing the held-out R² of the selected model
    Score,
    /// Writing the model artifact
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Split => "split",
            Stage::Evaluate => "evaluate",
            Stage::Select => "select",
            Stage::Score => "score",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Boundary error of a selection run.
///
/// Every failure inside the pipeline is wrapped exactly once with the stage it
/// happened in. A caller receiving this error can assume no model was persisted.
#[derive(Error, Debug)]
#[error("Model training failed during {stage}: {source}")]
pub struct ModelTrainingError {
    pub stage: Stage,
    #[source]
    pub source: SelectorError,
}

impl ModelTrainingError {
    pub fn new(stage: Stage, source: SelectorError) -> Self {
        Self { stage, source }
    }

    /// The underlying cause
    pub fn cause(&self) -> &SelectorError {
        &self.source
    }

    /// True when the run was rejected by the quality floor
    pub fn is_no_acceptable_model(&self) -> bool {
        matches!(self.source, SelectorError::NoAcceptableModel { .. })
    }
}

/// Attach a pipeline stage to a step result
pub(crate) trait StageContext<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, ModelTrainingError>;
}

impl<T> StageContext<T> for Result<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, ModelTrainingError> {
        self.map_err(|source| ModelTrainingError::new(stage, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = SelectorError::ValidationError("test error".to_string());
        assert_eq!(err.to_string(), "Validation error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SelectorError = io_err.into();
        assert!(matches!(err, SelectorError::IoError(_)));
    }

    #[test]
    fn test_training_error_keeps_cause() {
        let err = ModelTrainingError::new(
            Stage::Select,
            SelectorError::NoAcceptableModel {
                best_model: Some("A".to_string()),
                best_score: 0.4,
                threshold: 0.6,
            },
        );

        assert!(err.is_no_acceptable_model());
        assert!(err.to_string().starts_with("Model training failed during select"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_stage_context() {
        let res: Result<()> = Err(SelectorError::ModelNotFitted);
        let err = res.stage(Stage::Score).unwrap_err();
        assert_eq!(err.stage, Stage::Score);
        assert!(matches!(err.cause(), SelectorError::ModelNotFitted));
    }
}
