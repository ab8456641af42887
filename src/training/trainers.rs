//! Per-algorithm trainers
//!
//! Each trainer fits its estimator on a hold-out split (or 5-fold
//! cross-validated predictions plus a final fit on all rows), scores the
//! predictions into a [`MetricBundle`], and hands the fitted model back.
//! [`train_and_persist`] adds the persistence side effect.

use super::clustering::{silhouette_score, KMeans};
use super::cross_validation::{cross_val_predict, train_test_split};
use super::linear_models::LinearRegression;
use super::metrics::{relative_accuracy, to_labels, ClassificationReport, MetricBundle};
use super::models::{ModelKind, TrainOptions, TrainedModel, TrainingData};
use super::persistence::{ArtifactRef, ModelStore};
use super::random_forest::RandomForest;
use super::svm::{SvmClassifier, SvmConfig, SvmRegressor};
use crate::error::{QuickmlError, Result};
use crate::preprocessing::{distinct_count, TaskKind};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Folds used by cross-validated evaluation
pub const CV_FOLDS: usize = 5;

/// Relative error under which a regression prediction counts as accurate
pub const RELATIVE_ACCURACY_THRESHOLD: f64 = 0.05;

/// A fitted model and the scores of its held-out predictions
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model: TrainedModel,
    pub metrics: MetricBundle,
}

/// Outcome after persistence; the bundle carries `file_id` and `filename`
#[derive(Debug, Clone)]
pub struct TrainingResult {
    pub kind: ModelKind,
    pub model: TrainedModel,
    pub metrics: MetricBundle,
    pub artifact: ArtifactRef,
}

pub trait Trainer: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Fit and evaluate. The token is checked between fits.
    fn train(
        &self,
        data: &TrainingData,
        options: &TrainOptions,
        cancel: &CancellationToken,
    ) -> Result<TrainOutcome>;
}

/// Which SVM estimator to fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvmMode {
    Classifier,
    Regressor,
    /// Classifier for integral targets with at most 10 classes
    #[default]
    Auto,
}

/// Trainer with default settings for a model kind
pub fn trainer_for(kind: ModelKind, svm_mode: SvmMode) -> Box<dyn Trainer> {
    match kind {
        ModelKind::LinearRegression => Box::new(LinearRegressionTrainer),
        ModelKind::RandomForest => Box::new(RandomForestTrainer::default()),
        ModelKind::Svm => Box::new(SvmTrainer::new(svm_mode)),
        ModelKind::KMeans => Box::new(KMeansTrainer::default()),
    }
}

/// Train one model and persist it, embedding the artifact reference in the
/// returned bundle.
pub fn train_and_persist(
    trainer: &dyn Trainer,
    data: &TrainingData,
    options: &TrainOptions,
    store: &ModelStore,
    cancel: &CancellationToken,
) -> Result<TrainingResult> {
    let kind = trainer.kind();
    let start = Instant::now();
    ensure_active(cancel, kind)?;

    let TrainOutcome { model, mut metrics } = trainer.train(data, options, cancel)?;
    ensure_active(cancel, kind)?;

    let artifact = store.save(&model, &metrics)?;
    metrics.file_id = Some(artifact.file_id.clone());
    metrics.filename = Some(artifact.filename.clone());

    info!(
        model = kind.name(),
        samples = data.n_samples(),
        features = data.n_features(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Model trained"
    );

    Ok(TrainingResult {
        kind,
        model,
        metrics,
        artifact,
    })
}

fn ensure_active(cancel: &CancellationToken, kind: ModelKind) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(QuickmlError::Cancelled(format!(
            "training stopped before {} finished",
            kind.name()
        )));
    }
    Ok(())
}

/// Held-out truth and predictions plus the model to keep
struct Evaluation {
    model: TrainedModel,
    y_true: Array1<f64>,
    y_pred: Array1<f64>,
}

fn evaluate<F>(
    data: &TrainingData,
    options: &TrainOptions,
    cancel: &CancellationToken,
    fit: F,
) -> Result<Evaluation>
where
    F: Fn(&Array2<f64>, &Array1<f64>) -> Result<TrainedModel>,
{
    if options.cross_validation {
        let y_pred = cross_val_predict(&data.x, &data.y, CV_FOLDS, cancel, |x_train, y_train, x_test| {
            fit(x_train, y_train)?.predict(x_test)
        })?;
        if cancel.is_cancelled() {
            return Err(QuickmlError::Cancelled("final fit skipped".to_string()));
        }
        let model = fit(&data.x, &data.y)?;
        Ok(Evaluation {
            model,
            y_true: data.y.clone(),
            y_pred,
        })
    } else {
        let split = train_test_split(&data.x, &data.y, options.test_size, options.random_state)?;
        debug!(
            train = split.y_train.len(),
            test = split.y_test.len(),
            "Hold-out split"
        );
        let model = fit(&split.x_train, &split.y_train)?;
        let y_pred = model.predict(&split.x_test)?;
        Ok(Evaluation {
            model,
            y_true: split.y_test,
            y_pred,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Linear Regression
// ═══════════════════════════════════════════════════════════════════════════

/// Ordinary least squares. Adds classification scores on rounded
/// predictions when the target is exactly `{0, 1}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearRegressionTrainer;

fn is_binary_01(y: &Array1<f64>) -> bool {
    let has_zero = y.iter().any(|&v| v == 0.0);
    let has_one = y.iter().any(|&v| v == 1.0);
    has_zero && has_one && y.iter().all(|&v| v == 0.0 || v == 1.0)
}

impl Trainer for LinearRegressionTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::LinearRegression
    }

    fn train(
        &self,
        data: &TrainingData,
        options: &TrainOptions,
        cancel: &CancellationToken,
    ) -> Result<TrainOutcome> {
        let eval = evaluate(data, options, cancel, |x, y| {
            let mut model = LinearRegression::new();
            model.fit(x, y)?;
            Ok(TrainedModel::LinearRegression(model))
        })?;

        let mut metrics = MetricBundle::regression(&eval.y_true, &eval.y_pred);
        if is_binary_01(&data.y) {
            metrics = metrics.with_classification(&to_labels(&eval.y_true), &to_labels(&eval.y_pred));
        }

        Ok(TrainOutcome {
            model: eval.model,
            metrics,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Random Forest
// ═══════════════════════════════════════════════════════════════════════════

/// Random forest regressor; reports relative accuracy and importances
#[derive(Debug, Clone)]
pub struct RandomForestTrainer {
    pub n_estimators: usize,
}

impl Default for RandomForestTrainer {
    fn default() -> Self {
        Self { n_estimators: 100 }
    }
}

impl Trainer for RandomForestTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn train(
        &self,
        data: &TrainingData,
        options: &TrainOptions,
        cancel: &CancellationToken,
    ) -> Result<TrainOutcome> {
        let eval = evaluate(data, options, cancel, |x, y| {
            let mut forest =
                RandomForest::new_regressor(self.n_estimators).with_random_state(options.random_state);
            forest.fit(x, y)?;
            Ok(TrainedModel::RandomForestRegressor(forest))
        })?;

        let mut metrics = MetricBundle::regression(&eval.y_true, &eval.y_pred);
        metrics.accuracy = Some(relative_accuracy(
            &eval.y_true,
            &eval.y_pred,
            RELATIVE_ACCURACY_THRESHOLD,
        ));
        metrics.feature_importance = eval.model.feature_importances().map(|imp| imp.to_vec());

        Ok(TrainOutcome {
            model: eval.model,
            metrics,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  SVM
// ═══════════════════════════════════════════════════════════════════════════

/// RBF support vector classifier or epsilon-SVR
#[derive(Debug, Clone, Default)]
pub struct SvmTrainer {
    pub mode: SvmMode,
    pub config: SvmConfig,
}

impl SvmTrainer {
    pub fn new(mode: SvmMode) -> Self {
        Self {
            mode,
            config: SvmConfig::default(),
        }
    }

    fn resolve_mode(&self, y: &Array1<f64>) -> SvmMode {
        if self.mode != SvmMode::Auto {
            return self.mode;
        }
        match TaskKind::infer_strict(&y.to_vec()) {
            TaskKind::Classification => SvmMode::Classifier,
            TaskKind::Regression => SvmMode::Regressor,
        }
    }
}

impl Trainer for SvmTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::Svm
    }

    fn train(
        &self,
        data: &TrainingData,
        options: &TrainOptions,
        cancel: &CancellationToken,
    ) -> Result<TrainOutcome> {
        let mut config = self.config.clone();
        config.random_state = options.random_state;

        if self.resolve_mode(&data.y) == SvmMode::Classifier {
            let eval = evaluate(data, options, cancel, |x, y| {
                let mut svc = SvmClassifier::new(config.clone());
                svc.fit(x, y)?;
                Ok(TrainedModel::SvmClassifier(svc))
            })?;
            let metrics = MetricBundle::new()
                .with_classification(&to_labels(&eval.y_true), &to_labels(&eval.y_pred));
            Ok(TrainOutcome {
                model: eval.model,
                metrics,
            })
        } else {
            let eval = evaluate(data, options, cancel, |x, y| {
                let mut svr = SvmRegressor::new(config.clone());
                svr.fit(x, y)?;
                Ok(TrainedModel::SvmRegressor(svr))
            })?;
            let mut metrics = MetricBundle::regression(&eval.y_true, &eval.y_pred);
            metrics.accuracy = Some(relative_accuracy(
                &eval.y_true,
                &eval.y_pred,
                RELATIVE_ACCURACY_THRESHOLD,
            ));
            Ok(TrainOutcome {
                model: eval.model,
                metrics,
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  K-Means
// ═══════════════════════════════════════════════════════════════════════════

/// K-means on the features alone.
///
/// When the target has exactly `n_clusters` distinct values, cluster ids are
/// scored against it as class predictions without aligning the labels.
#[derive(Debug, Clone)]
pub struct KMeansTrainer {
    pub n_clusters: usize,
}

impl Default for KMeansTrainer {
    fn default() -> Self {
        Self { n_clusters: 3 }
    }
}

impl Trainer for KMeansTrainer {
    fn kind(&self) -> ModelKind {
        ModelKind::KMeans
    }

    fn train(
        &self,
        data: &TrainingData,
        options: &TrainOptions,
        _cancel: &CancellationToken,
    ) -> Result<TrainOutcome> {
        let mut kmeans = KMeans::new(self.n_clusters).with_random_state(options.random_state);
        kmeans.fit(&data.x)?;
        let labels = kmeans.labels.clone().ok_or(QuickmlError::ModelNotFitted)?;

        let mut metrics = MetricBundle::new();
        metrics.silhouette_score = silhouette_score(&data.x, &labels);

        let target: Vec<f64> = data.y.to_vec();
        if distinct_count(&target) == self.n_clusters {
            let report = ClassificationReport::compute(&to_labels(&data.y), &to_labels(&labels));
            metrics.accuracy = Some(report.accuracy);
            metrics.recall = Some(report.recall);
            metrics.f1_score = Some(report.f1_score);
        }

        Ok(TrainOutcome {
            model: TrainedModel::KMeans(kmeans),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn linear_data(n: usize) -> TrainingData {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { ((i * 7) % 5) as f64 });
        let y = Array1::from_shape_fn(n, |i| 2.0 * i as f64 + ((i * 7) % 5) as f64 + 10.0);
        TrainingData::new(x, y).unwrap()
    }

    fn binary_data(n: usize) -> TrainingData {
        let x = Array2::from_shape_fn((n, 1), |(i, _)| if i % 2 == 0 { -1.0 - (i % 5) as f64 * 0.1 } else { 1.0 + (i % 5) as f64 * 0.1 });
        let y = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        TrainingData::new(x, y).unwrap()
    }

    #[test]
    fn test_linear_regression_split_is_reproducible() {
        let data = linear_data(50);
        let token = CancellationToken::new();
        let opts = TrainOptions::default();

        let a = LinearRegressionTrainer.train(&data, &opts, &token).unwrap();
        let b = LinearRegressionTrainer.train(&data, &opts, &token).unwrap();
        assert_eq!(a.metrics, b.metrics);
        assert!(a.metrics.r2.unwrap() > 0.999);
        assert!(a.metrics.accuracy.is_none());
    }

    #[test]
    fn test_linear_regression_binary_target_adds_classification() {
        let data = binary_data(40);
        let token = CancellationToken::new();
        let out = LinearRegressionTrainer
            .train(&data, &TrainOptions::default(), &token)
            .unwrap();
        assert_eq!(out.metrics.accuracy, Some(1.0));
        assert!(out.metrics.confusion_matrix.is_some());
        assert!(out.metrics.rmse.is_some());
    }

    #[test]
    fn test_cross_validation_mode() {
        let data = linear_data(30);
        let token = CancellationToken::new();
        let opts = TrainOptions::default().with_cross_validation(true);
        let out = LinearRegressionTrainer.train(&data, &opts, &token).unwrap();
        assert!(out.metrics.r2.unwrap() > 0.99);
    }

    #[test]
    fn test_random_forest_metrics() {
        let data = linear_data(60);
        let token = CancellationToken::new();
        let trainer = RandomForestTrainer { n_estimators: 10 };
        let out = trainer.train(&data, &TrainOptions::default(), &token).unwrap();

        let acc = out.metrics.accuracy.unwrap();
        assert!((0.0..=100.0).contains(&acc));
        assert_eq!(out.metrics.feature_importance.as_ref().unwrap().len(), 2);
        assert!(out.metrics.confusion_matrix.is_none());
    }

    #[test]
    fn test_svm_auto_mode() {
        let token = CancellationToken::new();
        let trainer = SvmTrainer::new(SvmMode::Auto);

        let out = trainer.train(&binary_data(40), &TrainOptions::default(), &token).unwrap();
        assert!(matches!(out.model, TrainedModel::SvmClassifier(_)));
        assert!(out.metrics.rmse.is_none());
        assert!(out.metrics.accuracy.unwrap() > 0.8);

        let out = trainer.train(&linear_data(40), &TrainOptions::default(), &token).unwrap();
        assert!(matches!(out.model, TrainedModel::SvmRegressor(_)));
        assert!(out.metrics.rmse.is_some());
    }

    #[test]
    fn test_kmeans_scores_three_class_target() {
        let centers = [0.0, 10.0, 20.0];
        let x = Array2::from_shape_fn((30, 1), |(i, _)| centers[i % 3] + (i / 3) as f64 * 0.05);
        let y = Array1::from_shape_fn(30, |i| (i % 3) as f64);
        let data = TrainingData::new(x, y).unwrap();

        let out = KMeansTrainer::default()
            .train(&data, &TrainOptions::default(), &CancellationToken::new())
            .unwrap();
        assert!(out.metrics.silhouette_score.unwrap() > 0.9);
        assert!(out.metrics.accuracy.is_some());
        assert!(out.metrics.precision.is_none());
    }

    #[test]
    fn test_train_and_persist_embeds_artifact() {
        let store = Arc::new(MemoryStore::new());
        let models = ModelStore::new(store.clone(), store);
        let data = linear_data(20);

        let result = train_and_persist(
            &LinearRegressionTrainer,
            &data,
            &TrainOptions::default(),
            &models,
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(result.metrics.file_id.as_deref(), Some(result.artifact.file_id.as_str()));
        assert!(models.load(&result.artifact.file_id).is_ok());
    }

    #[test]
    fn test_cancelled_before_start() {
        let store = Arc::new(MemoryStore::new());
        let models = ModelStore::new(store.clone(), store);
        let token = CancellationToken::new();
        token.cancel();

        let res = train_and_persist(
            &LinearRegressionTrainer,
            &linear_data(20),
            &TrainOptions::default(),
            &models,
            &token,
        );
        assert!(matches!(res, Err(QuickmlError::Cancelled(_))));
    }
}
