//! Preprocessing configuration

use serde::{Deserialize, Serialize};

/// Parameters of the fixed preprocessing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Categories kept per categorical column; the rest become `"Other"`
    pub top_n_categories: usize,

    /// Number of features kept by mutual-information selection
    pub k_features: usize,

    /// Drop rows outside the 1.5 IQR fences of any numeric column
    pub remove_outliers: bool,

    /// IQR multiplier for the outlier fences
    pub outlier_factor: f64,

    /// Reduce the selected features with PCA
    pub use_pca: bool,

    /// PCA component count, capped at the available feature count
    pub pca_components: usize,

    /// Distinct target values above which the task is treated as regression
    pub regression_threshold: usize,

    /// Random seed for PCA initialization
    pub random_state: u64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            top_n_categories: 5,
            k_features: 10,
            remove_outliers: false,
            outlier_factor: 1.5,
            use_pca: true,
            pca_components: 5,
            regression_threshold: 10,
            random_state: 42,
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_n_categories(mut self, n: usize) -> Self {
        self.top_n_categories = n.max(1);
        self
    }

    pub fn with_k_features(mut self, k: usize) -> Self {
        self.k_features = k.max(1);
        self
    }

    /// Enable IQR outlier removal
    pub fn with_outlier_removal(mut self, enabled: bool) -> Self {
        self.remove_outliers = enabled;
        self
    }

    /// Enable or disable PCA and set the component count
    pub fn with_pca(mut self, enabled: bool, components: usize) -> Self {
        self.use_pca = enabled;
        self.pca_components = components.max(1);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}
