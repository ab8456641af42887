//! Data preprocessing module
//!
//! The fixed pipeline applied to an uploaded table before training:
//! - Target column detection
//! - Missing value imputation (mean / most frequent)
//! - Optional IQR outlier removal
//! - Top-N category collapsing and one-hot encoding
//! - Robust scaling
//! - Mutual-information feature selection
//! - Optional PCA

mod config;
mod encoder;
mod imputer;
mod pipeline;
mod scaler;
pub mod feature_selection;
pub mod outlier;
pub mod pca;
pub mod target;

pub use config::PreprocessingConfig;
pub use encoder::{TopNOneHotEncoder, OTHER_CATEGORY};
pub use feature_selection::MutualInfoSelector;
pub use imputer::Imputer;
pub use outlier::{OutlierBounds, OutlierFilter};
pub use pca::Pca;
pub use pipeline::{PreprocessOutput, Preprocessor};
pub use scaler::RobustScaler;
pub use target::{detect_target_column, distinct_count, TaskKind, CLASSIFICATION_MAX_CLASSES};

use polars::prelude::*;
use std::collections::HashMap;

/// Non-null values with their counts, in order of first appearance.
pub(crate) fn frequency_table(ca: &StringChunked) -> Vec<(String, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut table: Vec<(String, usize)> = Vec::new();
    for value in ca.into_iter().flatten() {
        match index.get(value) {
            Some(&i) => table[i].1 += 1,
            None => {
                index.insert(value, table.len());
                table.push((value.to_string(), 1));
            }
        }
    }
    table
}
