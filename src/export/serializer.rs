//! JSON model artifacts

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, SelectorError};
use crate::training::{
    AdaBoostRegressor, CatBoostRegressor, DecisionTreeRegressor, GradientBoostingRegressor,
    KNNRegressor, LinearRegression, ModelKind, RandomForestRegressor, Regressor, XGBoostRegressor,
};

/// Persisted form of a selected model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Artifact layout version
    pub format_version: u32,
    /// Catalog name the model was selected under
    pub model_name: String,
    /// Type tag used to restore the model
    pub model_type: String,
    /// Score the evaluator assigned during selection
    pub selection_score: f64,
    /// Held-out R² reported to the caller
    pub r2_score: f64,
    /// Fitted model state
    pub model: serde_json::Value,
}

impl ModelArtifact {
    /// Current artifact layout version
    pub const FORMAT_VERSION: u32 = 1;

    /// Capture a fitted model
    pub fn from_model(
        model_name: impl Into<String>,
        model: &dyn Regressor,
        selection_score: f64,
        r2_score: f64,
    ) -> Result<Self> {
        if !model.is_fitted() {
            return Err(SelectorError::ModelNotFitted);
        }

        Ok(Self {
            format_version: Self::FORMAT_VERSION,
            model_name: model_name.into(),
            model_type: model.model_type().to_string(),
            selection_score,
            r2_score,
            model: model.to_json()?,
        })
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read an artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let artifact: Self = serde_json::from_reader(BufReader::new(file))?;

        if artifact.format_version != Self::FORMAT_VERSION {
            return Err(SelectorError::SerializationError(format!(
                "Unsupported artifact version {} in {}",
                artifact.format_version,
                path.display()
            )));
        }

        Ok(artifact)
    }

    /// Rebuild the fitted regressor stored in this artifact
    pub fn restore(&self) -> Result<Box<dyn Regressor>> {
        let kind = ModelKind::from_type_tag(&self.model_type).ok_or_else(|| {
            SelectorError::SerializationError(format!("Unknown model type: {}", self.model_type))
        })?;
        let state = self.model.clone();

        let model: Box<dyn Regressor> = match kind {
            ModelKind::RandomForest => Box::new(serde_json::from_value::<RandomForestRegressor>(state)?),
            ModelKind::LinearRegression => Box::new(serde_json::from_value::<LinearRegression>(state)?),
            ModelKind::DecisionTree => Box::new(serde_json::from_value::<DecisionTreeRegressor>(state)?),
            ModelKind::GradientBoosting => {
                Box::new(serde_json::from_value::<GradientBoostingRegressor>(state)?)
            }
            ModelKind::AdaBoost => Box::new(serde_json::from_value::<AdaBoostRegressor>(state)?),
            ModelKind::XGBoost => Box::new(serde_json::from_value::<XGBoostRegressor>(state)?),
            ModelKind::CatBoost => Box::new(serde_json::from_value::<CatBoostRegressor>(state)?),
            ModelKind::KNearestNeighbors => Box::new(serde_json::from_value::<KNNRegressor>(state)?),
        };

        Ok(model)
    }
}

/// Load an artifact and the fitted regressor it contains
pub fn load_model(path: impl AsRef<Path>) -> Result<(ModelArtifact, Box<dyn Regressor>)> {
    let artifact = ModelArtifact::load(path)?;
    let model = artifact.restore()?;
    Ok((artifact, model))
}

/// Destination for the selected model
pub trait ModelStore: Send + Sync {
    fn save(&self, path: &Path, artifact: &ModelArtifact) -> Result<()>;
}

/// Writes artifacts as pretty-printed JSON.
///
/// The file is written next to its destination and renamed into place, so
/// the destination either holds the previous content or the complete new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelStore;

impl JsonModelStore {
    pub fn new() -> Self {
        Self
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "model".into());
        name.push(".tmp");
        path.with_file_name(name)
    }

    fn write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = Self::temp_path(path);
        let result = (|| -> std::io::Result<()> {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            writer.write_all(bytes)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            drop(writer);
            fs::rename(&tmp, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

impl ModelStore for JsonModelStore {
    fn save(&self, path: &Path, artifact: &ModelArtifact) -> Result<()> {
        let json = artifact.to_json_string()?;
        debug!(path = %path.display(), bytes = json.len(), "Writing model artifact");

        Self::write(path, json.as_bytes()).map_err(|source| SelectorError::PersistenceError {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), model = %artifact.model_name, "Model artifact written");
        Ok(())
    }
}
