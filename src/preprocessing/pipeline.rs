//! Data preprocessing pipeline

use super::{
    config::PreprocessingConfig,
    encoder::TopNOneHotEncoder,
    feature_selection::MutualInfoSelector,
    imputer::Imputer,
    outlier::OutlierFilter,
    pca::Pca,
    scaler::RobustScaler,
    target::TaskKind,
};
use crate::data::{categorical_columns, frame_to_documents, frame_to_matrix, ColumnKind, Document};
use crate::error::{QuickmlError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Result of fitting the pipeline on a table
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    /// Transformed feature columns (`pca_1..` when PCA is enabled)
    pub features: DataFrame,
    /// Numeric target, aligned with `features`
    pub target: Series,
    pub task: TaskKind,
    /// Encoded feature names kept by mutual-information selection
    pub selected_features: Vec<String>,
    /// Original labels of a label-encoded categorical target
    pub target_classes: Option<Vec<String>>,
}

impl PreprocessOutput {
    pub fn target_column(&self) -> &str {
        self.target.name().as_str()
    }

    /// Features followed by the target column
    pub fn to_frame(&self) -> Result<DataFrame> {
        let mut frame = self.features.clone();
        frame.with_column(self.target.clone())?;
        Ok(frame)
    }

    /// One document per row, features then target
    pub fn to_documents(&self) -> Result<Vec<Document>> {
        frame_to_documents(&self.to_frame()?)
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn feature_matrix(&self) -> Result<Array2<f64>> {
        frame_to_matrix(&self.features, &self.feature_names())
    }

    pub fn target_vector(&self) -> Result<Array1<f64>> {
        Ok(self.target.f64()?.into_no_null_iter().collect())
    }
}

/// Fixed preprocessing pipeline: impute, optional outlier removal,
/// top-N one-hot encoding, robust scaling, mutual-information selection,
/// optional PCA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    config: PreprocessingConfig,
    target_column: Option<String>,
    numeric_features: Vec<String>,
    categorical_features: Vec<String>,
    imputer: Imputer,
    encoder: TopNOneHotEncoder,
    scaler: RobustScaler,
    encoded_columns: Vec<String>,
    selector: Option<MutualInfoSelector>,
    selected_features: Vec<String>,
    pca: Option<Pca>,
    is_fitted: bool,
    /// Timing: seconds spent in last fit call
    fit_time: Option<f64>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    /// Create a new preprocessor with default configuration
    pub fn new() -> Self {
        Self::with_config(PreprocessingConfig::default())
    }

    pub fn with_config(config: PreprocessingConfig) -> Self {
        Self {
            encoder: TopNOneHotEncoder::new(config.top_n_categories),
            config,
            target_column: None,
            numeric_features: Vec::new(),
            categorical_features: Vec::new(),
            imputer: Imputer::new(),
            scaler: RobustScaler::new(),
            encoded_columns: Vec::new(),
            selector: None,
            selected_features: Vec::new(),
            pca: None,
            is_fitted: false,
            fit_time: None,
        }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Fit every step on `df` and return the transformed table.
    ///
    /// Rows with a missing target are dropped first. A categorical target is
    /// label-encoded by sorted category. Each call refits from scratch.
    pub fn fit_transform(&mut self, df: &DataFrame, target_column: &str) -> Result<PreprocessOutput> {
        let start = Instant::now();

        let target_col = df.column(target_column).map_err(|_| {
            QuickmlError::ValidationError(format!("target column '{}' not found", target_column))
        })?;
        let target_is_numeric = ColumnKind::of(target_col) == ColumnKind::Numeric;

        let df = drop_missing_target(df, target_column)?;
        let (mut y, target_classes) = prepare_target(df.column(target_column)?)?;

        let mut features = df.drop(target_column)?;
        if features.width() == 0 {
            return Err(QuickmlError::ValidationError(
                "dataset has no feature columns besides the target".to_string(),
            ));
        }
        self.categorical_features = categorical_columns(&features);
        self.numeric_features = features
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| !self.categorical_features.contains(name))
            .collect();
        let all_features: Vec<String> = features
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        // 1. impute
        self.imputer = Imputer::new();
        features = self.imputer.fit_transform(&features, &all_features)?;

        // 2. outliers, judged on numeric features and a numeric target
        if self.config.remove_outliers {
            let mut combined = features.clone();
            combined.with_column(y.clone())?;
            let mut columns = self.numeric_features.clone();
            if target_is_numeric {
                columns.push(target_column.to_string());
            }
            let mut filter = OutlierFilter::iqr(self.config.outlier_factor);
            let mask = filter.fit(&combined, &columns)?.mask(&combined)?;
            features = features.filter(&mask)?;
            y = y.filter(&mask)?;
            debug!(rows_kept = features.height(), "Removed outlier rows");
        }
        if features.height() == 0 {
            return Err(QuickmlError::PreprocessingError(
                "no rows left after preprocessing".to_string(),
            ));
        }

        // 3. encode, 4. scale
        self.encoder = TopNOneHotEncoder::new(self.config.top_n_categories);
        features = self
            .encoder
            .fit_transform(&features, &self.categorical_features)?;
        self.scaler = RobustScaler::new();
        features = self.scaler.fit_transform(&features, &self.numeric_features)?;

        self.encoded_columns = features
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let x = frame_to_matrix(&features, &self.encoded_columns)?;
        let y_vec: Array1<f64> = y.f64()?.into_no_null_iter().collect();
        let y_values = y_vec.to_vec();

        // 5. select
        let task = TaskKind::infer(&y_values, self.config.regression_threshold);
        let mut selector = MutualInfoSelector::new(self.config.k_features, task);
        let x = selector.fit_transform(&x, &y_vec)?;
        self.selected_features = selector
            .selected_indices()
            .unwrap_or_default()
            .iter()
            .map(|&i| self.encoded_columns[i].clone())
            .collect();
        self.selector = Some(selector);

        // 6. reduce
        let (x, names) = if self.config.use_pca {
            let mut pca = Pca::new(self.config.pca_components, self.config.random_state);
            let reduced = pca.fit_transform(&x)?;
            let names = pca_names(reduced.ncols());
            self.pca = Some(pca);
            (reduced, names)
        } else {
            self.pca = None;
            (x, self.selected_features.clone())
        };

        self.target_column = Some(target_column.to_string());
        self.is_fitted = true;
        self.fit_time = Some(start.elapsed().as_secs_f64());

        debug!(
            rows = x.nrows(),
            encoded = self.encoded_columns.len(),
            selected = self.selected_features.len(),
            output = names.len(),
            task = ?task,
            "Preprocessing fitted"
        );

        Ok(PreprocessOutput {
            features: matrix_to_frame(&x, &names)?,
            target: y,
            task,
            selected_features: self.selected_features.clone(),
            target_classes,
        })
    }

    /// Apply the fitted steps to new rows. No rows are dropped and the target
    /// column, if present, is ignored.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(QuickmlError::ModelNotFitted);
        }
        let selector = self.selector.as_ref().ok_or(QuickmlError::ModelNotFitted)?;

        let mut features = self.imputer.transform(df)?;
        features = self.encoder.transform(&features)?;
        features = self.scaler.transform(&features)?;

        let x = frame_to_matrix(&features, &self.encoded_columns)?;
        let x = selector.transform(&x)?;
        match &self.pca {
            Some(pca) => {
                let reduced = pca.transform(&x)?;
                matrix_to_frame(&reduced, &pca_names(reduced.ncols()))
            }
            None => matrix_to_frame(&x, &self.selected_features),
        }
    }

    pub fn target_column(&self) -> Option<&str> {
        self.target_column.as_deref()
    }

    pub fn selected_features(&self) -> &[String] {
        &self.selected_features
    }

    pub fn fit_time(&self) -> Option<f64> {
        self.fit_time
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }
}

fn pca_names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("pca_{}", i)).collect()
}

fn drop_missing_target(df: &DataFrame, target_column: &str) -> Result<DataFrame> {
    let column = df.column(target_column)?;
    if column.null_count() == 0 {
        return Ok(df.clone());
    }
    let mask = column.as_materialized_series().is_not_null();
    Ok(df.filter(&mask)?)
}

/// Float64 target plus the class labels of a categorical target
fn prepare_target(column: &Column) -> Result<(Series, Option<Vec<String>>)> {
    let name = column.name().clone();
    match ColumnKind::of(column) {
        ColumnKind::Numeric => {
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            Ok((series.with_name(name), None))
        }
        ColumnKind::Categorical => {
            let series = column.as_materialized_series().cast(&DataType::String)?;
            let ca = series.str()?;
            let mut classes: Vec<String> = ca.into_no_null_iter().map(|s| s.to_string()).collect();
            classes.sort();
            classes.dedup();

            let encoded: Vec<f64> = ca
                .into_no_null_iter()
                .map(|v| classes.binary_search_by(|c| c.as_str().cmp(v)).unwrap_or(0) as f64)
                .collect();
            Ok((Series::new(name, encoded), Some(classes)))
        }
    }
}

fn matrix_to_frame(x: &Array2<f64>, names: &[String]) -> Result<DataFrame> {
    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(j, name)| Series::new(name.as_str().into(), x.column(j).to_vec()).into())
        .collect();
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df!(
            "amount" => &[Some(10.0), Some(20.0), None, Some(40.0), Some(50.0), Some(60.0), Some(70.0), Some(80.0)],
            "category" => &[Some("a"), Some("b"), Some("a"), None, Some("c"), Some("a"), Some("b"), Some("c")],
            "score" => &[1.0, 3.0, 2.0, 5.0, 4.0, 6.0, 8.0, 7.0],
            "label" => &[Some(0.0), Some(1.0), Some(0.0), Some(1.0), None, Some(1.0), Some(0.0), Some(1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_fit_transform_without_pca() {
        let config = PreprocessingConfig::new().with_pca(false, 5).with_k_features(3);
        let mut pre = Preprocessor::with_config(config);
        let out = pre.fit_transform(&sample_df(), "label").unwrap();

        // one row dropped for the missing label
        assert_eq!(out.features.height(), 7);
        assert_eq!(out.target.len(), 7);
        assert_eq!(out.features.width(), 3);
        assert_eq!(out.task, TaskKind::Classification);
        assert_eq!(out.target_column(), "label");
        assert_eq!(out.features.get_column_names().len(), out.selected_features.len());
    }

    #[test]
    fn test_pca_output_names() {
        let mut pre = Preprocessor::new();
        let out = pre.fit_transform(&sample_df(), "label").unwrap();

        let names = out.feature_names();
        assert!(!names.is_empty() && names.len() <= 5);
        assert_eq!(names[0], "pca_1");
        let frame = out.to_frame().unwrap();
        assert_eq!(frame.width(), names.len() + 1);
    }

    #[test]
    fn test_missing_target_is_validation_error() {
        let mut pre = Preprocessor::new();
        let err = pre.fit_transform(&sample_df(), "nope").unwrap_err();
        assert!(matches!(err, QuickmlError::ValidationError(_)));
    }

    #[test]
    fn test_categorical_target_label_encoded() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "kind" => &["dog", "cat", "dog", "bird"],
        )
        .unwrap();
        let mut pre = Preprocessor::with_config(PreprocessingConfig::new().with_pca(false, 1));
        let out = pre.fit_transform(&df, "kind").unwrap();

        assert_eq!(
            out.target_classes.as_deref().unwrap(),
            &["bird".to_string(), "cat".to_string(), "dog".to_string()]
        );
        assert_eq!(out.target_vector().unwrap().to_vec(), vec![2.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_transform_reuses_fitted_statistics() {
        let config = PreprocessingConfig::new().with_pca(false, 5);
        let mut pre = Preprocessor::with_config(config);
        pre.fit_transform(&sample_df(), "label").unwrap();

        let new_rows = df!(
            "amount" => &[10.0],
            "category" => &["never-seen"],
            "score" => &[1.0],
        )
        .unwrap();
        let out = pre.transform(&new_rows).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.width(), pre.selected_features().len());
    }

    #[test]
    fn test_outlier_removal_masks_features_and_target() {
        let x = [1.0, 2.0, 3.0, 1000.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let z = [4.0, 1.0, 3.0, 2.0, 5.0, 4.0, 1.0, 3.0, 2.0, 5.0];
        let config = PreprocessingConfig::new()
            .with_pca(false, 5)
            .with_outlier_removal(true);

        // row 3 has an outlying feature, row 7 an outlying numeric target
        let df = df!(
            "x" => &x,
            "z" => &z,
            "price" => &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 5000.0, 90.0, 100.0],
        )
        .unwrap();
        let out = Preprocessor::with_config(config.clone())
            .fit_transform(&df, "price")
            .unwrap();
        assert_eq!(out.features.height(), 8);
        assert_eq!(
            out.target_vector().unwrap().to_vec(),
            vec![10.0, 20.0, 30.0, 50.0, 60.0, 70.0, 90.0, 100.0]
        );

        // a categorical target has no fences
        let df = df!(
            "x" => &x,
            "z" => &z,
            "kind" => &["a", "b", "a", "b", "a", "b", "a", "b", "a", "b"],
        )
        .unwrap();
        let out = Preprocessor::with_config(config).fit_transform(&df, "kind").unwrap();
        assert_eq!(out.features.height(), 9);
        assert_eq!(out.target.len(), 9);
    }

    #[test]
    fn test_no_feature_columns() {
        let df = df!("label" => &[0.0, 1.0]).unwrap();
        let err = Preprocessor::new().fit_transform(&df, "label").unwrap_err();
        assert!(matches!(err, QuickmlError::ValidationError(_)));
    }
}
