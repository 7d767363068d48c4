//! Splitting combined arrays into features and target

use ndarray::{s, Array1, Array2};
use tracing::debug;

use crate::error::{Result, SelectorError};

/// Train and test partitions, target separated from features
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

impl DatasetSplit {
    /// Split arrays whose last column is the target.
    ///
    /// Both arrays need at least one row, at least two columns and the
    /// same column count.
    pub fn from_arrays(train: &Array2<f64>, test: &Array2<f64>) -> Result<Self> {
        check_array("train", train)?;
        check_array("test", test)?;
        if train.ncols() != test.ncols() {
            return Err(SelectorError::ShapeError {
                expected: format!("test array with {} columns", train.ncols()),
                actual: format!("{} columns", test.ncols()),
            });
        }

        let (x_train, y_train) = split_target(train);
        let (x_test, y_test) = split_target(test);

        debug!(
            train_rows = x_train.nrows(),
            test_rows = x_test.nrows(),
            n_features = x_train.ncols(),
            "Split input arrays"
        );

        Ok(Self {
            x_train,
            y_train,
            x_test,
            y_test,
        })
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }
}

fn check_array(label: &str, arr: &Array2<f64>) -> Result<()> {
    if arr.nrows() < 1 || arr.ncols() < 2 {
        return Err(SelectorError::ShapeError {
            expected: format!("{} array with at least 1 row and 2 columns", label),
            actual: format!("{} x {}", arr.nrows(), arr.ncols()),
        });
    }
    Ok(())
}

fn split_target(arr: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
    let last = arr.ncols() - 1;
    (arr.slice(s![.., ..last]).to_owned(), arr.column(last).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_split_last_column() {
        let train = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let test = array![[7.0, 8.0, 9.0]];

        let split = DatasetSplit::from_arrays(&train, &test).unwrap();
        assert_eq!(split.x_train, array![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(split.y_train, array![3.0, 6.0]);
        assert_eq!(split.x_test, array![[7.0, 8.0]]);
        assert_eq!(split.y_test, array![9.0]);
        assert_eq!(split.n_features(), 2);
    }

    #[test]
    fn test_single_column_rejected() {
        let train = array![[1.0], [2.0]];
        let test = array![[1.0, 2.0]];
        assert!(matches!(
            DatasetSplit::from_arrays(&train, &test),
            Err(SelectorError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_empty_rejected() {
        let train = Array2::<f64>::zeros((0, 3));
        let test = array![[1.0, 2.0, 3.0]];
        assert!(DatasetSplit::from_arrays(&train, &test).is_err());
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let train = array![[1.0, 2.0, 3.0]];
        let test = array![[1.0, 2.0]];
        assert!(matches!(
            DatasetSplit::from_arrays(&train, &test),
            Err(SelectorError::ShapeError { .. })
        ));
    }
}
