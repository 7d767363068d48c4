//! Selector configuration

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{Result, SelectorError};

/// Default location of the persisted model
pub const DEFAULT_MODEL_PATH: &str = "artifacts/model.json";

/// Default minimum score a model needs to be accepted
pub const DEFAULT_QUALITY_FLOOR: f64 = 0.6;

/// Configuration for a selection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTrainerConfig {
    /// Where the selected model is written
    pub trained_model_file_path: PathBuf,

    /// Minimum evaluator score for the best model
    pub quality_floor: f64,

    /// Seed for the stochastic catalog models
    pub random_state: Option<u64>,

    /// Fit catalog models in parallel
    pub parallel_evaluation: bool,
}

impl Default for ModelTrainerConfig {
    fn default() -> Self {
        Self {
            trained_model_file_path: PathBuf::from(DEFAULT_MODEL_PATH),
            quality_floor: DEFAULT_QUALITY_FLOOR,
            random_state: Some(42),
            parallel_evaluation: true,
        }
    }
}

impl ModelTrainerConfig {
    pub fn new(trained_model_file_path: impl Into<PathBuf>) -> Self {
        Self {
            trained_model_file_path: trained_model_file_path.into(),
            ..Default::default()
        }
    }

    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SelectorError::ConfigError(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            SelectorError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.trained_model_file_path = path.into();
        self
    }

    pub fn with_quality_floor(mut self, floor: f64) -> Self {
        self.quality_floor = floor;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_parallel_evaluation(mut self, parallel: bool) -> Self {
        self.parallel_evaluation = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.trained_model_file_path.as_os_str().is_empty() {
            return Err(SelectorError::ConfigError(
                "trained_model_file_path must not be empty".to_string(),
            ));
        }
        if !self.quality_floor.is_finite() {
            return Err(SelectorError::ConfigError(format!(
                "quality_floor must be finite, got {}",
                self.quality_floor
            )));
        }
        Ok(())
    }
}
