//! Regressor trait and regression metrics

use crate::error::{Result, SelectorError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Metrics for evaluating a regressor on held-out data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// R-squared
    pub r2: f64,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_targets(y_true, y_pred)?;

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2: r2_score(y_true, y_pred)?,
            n_samples: y_true.len(),
        })
    }
}

/// Coefficient of determination.
///
/// A constant target has no variance to explain: a perfect prediction scores
/// 1.0 and anything else scores 0.0.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_targets(y_true, y_pred)?;

    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - y_mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }

    Ok(1.0 - ss_res / ss_tot)
}

fn check_targets(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(SelectorError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(SelectorError::ShapeError {
            expected: "at least 1 sample".to_string(),
            actual: "0 samples".to_string(),
        });
    }
    Ok(())
}

/// A model that predicts a continuous target from numeric features
pub trait Regressor: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Whether `fit` has completed successfully
    fn is_fitted(&self) -> bool;

    /// Stable type tag written into persisted artifacts
    fn model_type(&self) -> &str;

    /// Serialize the (fitted) model state
    fn to_json(&self) -> Result<serde_json::Value>;
}

/// Validate the training inputs every regressor shares
pub(crate) fn check_fit_input(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(SelectorError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(SelectorError::ValidationError(format!(
            "Cannot fit on an empty matrix ({} x {})",
            x.nrows(),
            x.ncols()
        )));
    }
    Ok(())
}

/// Validate the feature width seen at prediction time
pub(crate) fn check_predict_input(x: &Array2<f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(SelectorError::ShapeError {
            expected: format!("{} features", n_features),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let metrics = ModelMetrics::compute_regression(&y_true, &y_pred).unwrap();

        assert!((metrics.mse - 0.006).abs() < 1e-9);
        assert!((metrics.rmse - 0.006f64.sqrt()).abs() < 1e-9);
        assert!(metrics.r2 > 0.99);
        assert_eq!(metrics.n_samples, 5);
    }

    #[test]
    fn test_r2_perfect_and_mean() {
        let y = array![1.0, 2.0, 3.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);

        let mean = array![2.0, 2.0, 2.0];
        assert!(r2_score(&y, &mean).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y = array![3.0, 3.0, 3.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![3.0, 3.0, 4.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_r2_length_mismatch() {
        let err = r2_score(&array![1.0, 2.0], &array![1.0]).unwrap_err();
        assert!(matches!(err, SelectorError::ShapeError { .. }));
    }
}
