//! Hold-out splits and k-fold cross-validated predictions

use crate::error::{QuickmlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Materialized hold-out split
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_test: Array1<f64>,
}

/// Shuffle row indices with a seeded ChaCha8 stream; the first
/// `ceil(test_size · n)` become the test set.
pub fn shuffle_split(n_samples: usize, test_size: f64, random_state: u64) -> Result<CVSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(QuickmlError::ValidationError(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_samples < 2 || n_test >= n_samples {
        return Err(QuickmlError::ValidationError(format!(
            "cannot split {} samples with test_size {}",
            n_samples, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(random_state);
    indices.shuffle(&mut rng);

    let train_indices = indices.split_off(n_test);
    Ok(CVSplit {
        train_indices,
        test_indices: indices,
        fold_idx: 0,
    })
}

/// Split a feature matrix and target into train and test parts
pub fn train_test_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    test_size: f64,
    random_state: u64,
) -> Result<TrainTestSplit> {
    if x.nrows() != y.len() {
        return Err(QuickmlError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    let split = shuffle_split(x.nrows(), test_size, random_state)?;
    Ok(TrainTestSplit {
        x_train: x.select(Axis(0), &split.train_indices),
        x_test: x.select(Axis(0), &split.test_indices),
        y_train: y.select(Axis(0), &split.train_indices),
        y_test: y.select(Axis(0), &split.test_indices),
    })
}

/// Unshuffled k-fold: contiguous folds, the first `n % k` one sample larger.
pub fn k_fold_split(n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
    if n_splits < 2 {
        return Err(QuickmlError::ValidationError(
            "n_splits must be at least 2".to_string(),
        ));
    }
    if n_samples < n_splits {
        return Err(QuickmlError::ValidationError(format!(
            "n_samples ({}) must be >= n_splits ({})",
            n_samples, n_splits
        )));
    }

    let base = n_samples / n_splits;
    let remainder = n_samples % n_splits;

    let mut splits = Vec::with_capacity(n_splits);
    let mut current = 0;
    for fold_idx in 0..n_splits {
        let fold_size = if fold_idx < remainder { base + 1 } else { base };
        let test_indices: Vec<usize> = (current..current + fold_size).collect();
        let train_indices: Vec<usize> = (0..current)
            .chain(current + fold_size..n_samples)
            .collect();
        splits.push(CVSplit {
            train_indices,
            test_indices,
            fold_idx,
        });
        current += fold_size;
    }

    Ok(splits)
}

/// Out-of-fold predictions: each sample is predicted by a model fitted on
/// the other folds.
///
/// `fit_predict(x_train, y_train, x_test)` fits a fresh model and predicts
/// the held-out rows. The token is checked before every fold.
pub fn cross_val_predict<F>(
    x: &Array2<f64>,
    y: &Array1<f64>,
    n_splits: usize,
    cancel: &CancellationToken,
    fit_predict: F,
) -> Result<Array1<f64>>
where
    F: Fn(&Array2<f64>, &Array1<f64>, &Array2<f64>) -> Result<Array1<f64>>,
{
    let mut predictions = Array1::<f64>::zeros(y.len());
    for split in k_fold_split(x.nrows(), n_splits)? {
        if cancel.is_cancelled() {
            return Err(QuickmlError::Cancelled(format!(
                "cross-validation stopped before fold {}",
                split.fold_idx + 1
            )));
        }
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);

        let fold_pred = fit_predict(&x_train, &y_train, &x_test)?;
        for (&idx, &p) in split.test_indices.iter().zip(fold_pred.iter()) {
            predictions[idx] = p;
        }
    }
    Ok(predictions)
}
