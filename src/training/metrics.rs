//! Evaluation metrics and the metric bundle reported by every trainer

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Fixed-shape metrics record.
///
/// Every field is nullable and serializes as `null` when unset, so all
/// bundles share one schema regardless of the model that produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricBundle {
    pub rmse: Option<f64>,
    pub r2: Option<f64>,
    pub mae: Option<f64>,
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    /// Rows are true labels, columns predicted labels
    pub confusion_matrix: Option<Vec<Vec<u64>>>,
    pub feature_importance: Option<Vec<f64>>,
    pub silhouette_score: Option<f64>,
    /// Blob id of the persisted model
    pub file_id: Option<String>,
    pub filename: Option<String>,
}

impl MetricBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// rmse, r2 and mae
    pub fn regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let scores = regression_scores(y_true, y_pred);
        Self {
            rmse: finite(scores.rmse),
            r2: finite(scores.r2),
            mae: finite(scores.mae),
            ..Self::default()
        }
    }

    /// Overwrite accuracy, macro precision/recall/f1 and the confusion matrix
    pub fn with_classification(mut self, y_true: &[i64], y_pred: &[i64]) -> Self {
        let report = ClassificationReport::compute(y_true, y_pred);
        self.accuracy = finite(report.accuracy);
        self.precision = finite(report.precision);
        self.recall = finite(report.recall);
        self.f1_score = finite(report.f1_score);
        self.confusion_matrix = Some(report.confusion_matrix);
        self
    }

    /// True when the bundle describes a classifier's predictions
    pub fn is_classification(&self) -> bool {
        self.confusion_matrix.is_some()
    }
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

#[derive(Debug, Clone, Copy)]
pub struct RegressionScores {
    pub rmse: f64,
    pub r2: f64,
    pub mae: f64,
}

/// Regression error measures.
///
/// R² of a constant target is 1 for a perfect fit and 0 otherwise.
pub fn regression_scores(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> RegressionScores {
    let n = y_true.len().max(1) as f64;
    let errors: Vec<f64> = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| t - p)
        .collect();

    let ss_res: f64 = errors.iter().map(|e| e * e).sum();
    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    RegressionScores {
        rmse: (ss_res / n).sqrt(),
        r2,
        mae,
    }
}

/// Percentage (0-100) of predictions with `|y - ŷ| / y < threshold`.
///
/// The ratio keeps the sign of `y`, and `y == 0` yields a non-finite ratio.
pub fn relative_accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>, threshold: f64) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let hits = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(&t, &p)| (t - p).abs() / t < threshold)
        .count();
    hits as f64 / y_true.len() as f64 * 100.0
}

/// Accuracy, macro-averaged precision/recall/f1 and confusion matrix
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    /// Sorted union of true and predicted labels
    pub labels: Vec<i64>,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: Vec<Vec<u64>>,
}

impl ClassificationReport {
    /// Per-class scores with no support count as 0.
    pub fn compute(y_true: &[i64], y_pred: &[i64]) -> Self {
        let mut labels: Vec<i64> = y_true.iter().chain(y_pred.iter()).copied().collect();
        labels.sort_unstable();
        labels.dedup();

        let k = labels.len();
        let mut matrix = vec![vec![0u64; k]; k];
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
                matrix[i][j] += 1;
            }
        }

        let n = y_true.len();
        let correct: u64 = (0..k).map(|i| matrix[i][i]).sum();
        let accuracy = if n > 0 { correct as f64 / n as f64 } else { 0.0 };

        let mut precision_sum = 0.0;
        let mut recall_sum = 0.0;
        let mut f1_sum = 0.0;
        for c in 0..k {
            let tp = matrix[c][c] as f64;
            let predicted: f64 = (0..k).map(|r| matrix[r][c] as f64).sum();
            let actual: f64 = matrix[c].iter().map(|&v| v as f64).sum();

            let p = if predicted > 0.0 { tp / predicted } else { 0.0 };
            let r = if actual > 0.0 { tp / actual } else { 0.0 };
            precision_sum += p;
            recall_sum += r;
            f1_sum += if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        }
        let denom = k.max(1) as f64;

        Self {
            labels,
            accuracy,
            precision: precision_sum / denom,
            recall: recall_sum / denom,
            f1_score: f1_sum / denom,
            confusion_matrix: matrix,
        }
    }
}

/// Round float predictions to integer class labels, halves to even
pub fn to_labels(values: &Array1<f64>) -> Vec<i64> {
    values.iter().map(|v| v.round_ties_even() as i64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_to_labels_rounds_half_to_even() {
        let labels = to_labels(&array![0.5, 1.5, 2.5, -0.5, 0.49, 0.51]);
        assert_eq!(labels, vec![0, 2, 2, 0, 0, 1]);
    }

    #[test]
    fn test_classification_report() {
        let y_true = [1, 0, 1, 1, 0, 1, 0, 0];
        let y_pred = [1, 0, 1, 0, 0, 1, 1, 0];

        let report = ClassificationReport::compute(&y_true, &y_pred);
        assert_eq!(report.labels, vec![0, 1]);
        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(report.confusion_matrix, vec![vec![3, 1], vec![1, 3]]);
        assert!((report.precision - 0.75).abs() < 1e-12);
        assert!((report.recall - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_unseen_predicted_label_counts_with_zero_division() {
        // label 2 only predicted: precision 0, recall 0 for that class
        let report = ClassificationReport::compute(&[0, 1], &[0, 2]);
        assert_eq!(report.labels, vec![0, 1, 2]);
        assert!((report.recall - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.confusion_matrix[1][2], 1);
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let bundle = MetricBundle::regression(&y_true, &y_pred);
        assert!(bundle.rmse.unwrap() < 0.1);
        assert!(bundle.r2.unwrap() > 0.9);
        assert!(bundle.accuracy.is_none());
    }

    #[test]
    fn test_constant_target_r2() {
        let y = array![3.0, 3.0, 3.0];
        assert_eq!(regression_scores(&y, &y).r2, 1.0);
        assert_eq!(regression_scores(&y, &array![3.0, 3.0, 4.0]).r2, 0.0);
    }

    #[test]
    fn test_relative_accuracy() {
        let y_true = array![100.0, 100.0, 0.0, 50.0];
        let y_pred = array![101.0, 110.0, 0.0, 50.0];
        assert!((relative_accuracy(&y_true, &y_pred, 0.05) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_unset_fields_serialize_as_null() {
        let json = serde_json::to_value(MetricBundle::new()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 12);
        assert!(obj.values().all(|v| v.is_null()));
    }
}
