//! Model kinds, training inputs and the serializable fitted-model enum

use super::clustering::KMeans;
use super::linear_models::LinearRegression;
use super::random_forest::RandomForest;
use super::svm::{SvmClassifier, SvmRegressor};
use crate::data::frame_to_matrix;
use crate::error::{QuickmlError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The stock algorithms a dataset can be trained with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    LinearRegression,
    RandomForest,
    Svm,
    #[serde(rename = "k_means")]
    KMeans,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::LinearRegression,
        ModelKind::RandomForest,
        ModelKind::Svm,
        ModelKind::KMeans,
    ];

    /// Identifier used in requests and artifact filenames
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::RandomForest => "random_forest",
            ModelKind::Svm => "svm",
            ModelKind::KMeans => "k_means",
        }
    }

    /// Label reported by best-model selection
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::Svm => "SVM",
            ModelKind::KMeans => "KMeans",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = QuickmlError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s.trim())
            .ok_or_else(|| QuickmlError::ValidationError(format!("Unsupported model type '{}'", s)))
    }
}

/// Feature matrix and target vector for one training run
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub feature_names: Vec<String>,
    pub target_column: String,
}

impl TrainingData {
    pub fn new(x: Array2<f64>, y: Array1<f64>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(QuickmlError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        let feature_names = (0..x.ncols()).map(|i| format!("x{}", i)).collect();
        Ok(Self {
            x,
            y,
            feature_names,
            target_column: "target".to_string(),
        })
    }

    /// Every column except the target becomes a feature. All columns must
    /// be numeric and complete, as they are after preprocessing.
    pub fn from_frame(df: &DataFrame, target_column: &str) -> Result<Self> {
        if df.column(target_column).is_err() {
            return Err(QuickmlError::ValidationError(format!(
                "target column '{}' not found",
                target_column
            )));
        }
        let feature_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| name != target_column)
            .collect();
        if feature_names.is_empty() {
            return Err(QuickmlError::ValidationError(
                "dataset has no feature columns".to_string(),
            ));
        }
        if df.height() == 0 {
            return Err(QuickmlError::ValidationError("dataset is empty".to_string()));
        }

        let x = frame_to_matrix(df, &feature_names)?;
        let y = frame_to_matrix(df, &[target_column.to_string()])?.column(0).to_owned();

        Ok(Self {
            x,
            y,
            feature_names,
            target_column: target_column.to_string(),
        })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }
}

/// Split and cross-validation parameters shared by all trainers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOptions {
    pub test_size: f64,
    pub cross_validation: bool,
    pub random_state: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            cross_validation: false,
            random_state: 42,
        }
    }
}

impl TrainOptions {
    pub fn with_cross_validation(mut self, enabled: bool) -> Self {
        self.cross_validation = enabled;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }
}

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LinearRegression(LinearRegression),
    RandomForestRegressor(RandomForest),
    SvmClassifier(SvmClassifier),
    SvmRegressor(SvmRegressor),
    KMeans(KMeans),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LinearRegression(_) => ModelKind::LinearRegression,
            TrainedModel::RandomForestRegressor(_) => ModelKind::RandomForest,
            TrainedModel::SvmClassifier(_) | TrainedModel::SvmRegressor(_) => ModelKind::Svm,
            TrainedModel::KMeans(_) => ModelKind::KMeans,
        }
    }

    /// Predictions, or cluster ids for k-means
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            TrainedModel::LinearRegression(m) => m.predict(x),
            TrainedModel::RandomForestRegressor(m) => m.predict(x),
            TrainedModel::SvmClassifier(m) => m.predict(x),
            TrainedModel::SvmRegressor(m) => m.predict(x),
            TrainedModel::KMeans(m) => m.predict(x),
        }
    }

    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            TrainedModel::RandomForestRegressor(m) => m.feature_importances().cloned(),
            _ => None,
        }
    }

    /// JSON encoding stored as the model artifact
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
