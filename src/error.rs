//! Error types for quickml

use thiserror::Error;

/// Result type alias for quickml operations
pub type Result<T> = std::result::Result<T, QuickmlError>;

/// Main error type.
///
/// Variants fall into three families that the HTTP layer maps to status
/// codes: input validation, missing resources, and everything else.
#[derive(Error, Debug)]
pub enum QuickmlError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse file: {0}")]
    ParseError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Training cancelled: {0}")]
    Cancelled(String),
}

impl QuickmlError {
    /// True for errors caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QuickmlError::ValidationError(_)
                | QuickmlError::UnsupportedFormat(_)
                | QuickmlError::ParseError(_)
                | QuickmlError::FeatureNotFound(_)
        )
    }
}

impl From<polars::error::PolarsError> for QuickmlError {
    fn from(err: polars::error::PolarsError) -> Self {
        QuickmlError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for QuickmlError {
    fn from(err: serde_json::Error) -> Self {
        QuickmlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for QuickmlError {
    fn from(err: ndarray::ShapeError) -> Self {
        QuickmlError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
