//! quickml - AutoML helper service
//!
//! Accepts tabular datasets, runs a fixed preprocessing pipeline, trains a
//! handful of stock models, picks the best one and keeps models and metrics
//! in a document store.
//!
//! # Modules
//!
//! - [`data`] - Dataset parsing and document/data-frame conversion
//! - [`preprocessing`] - Target detection and the preprocessing pipeline
//! - [`training`] - Estimators, trainers, persistence and best-model selection
//! - [`store`] - Document and blob stores (in-memory and file-backed)
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

pub mod data;
pub mod preprocessing;
pub mod store;
pub mod training;

// Services
pub mod server;
pub mod cli;

pub use error::{QuickmlError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{QuickmlError, Result};

    pub use crate::data::{frame_from_documents, frame_to_documents, Document};

    pub use crate::preprocessing::{detect_target_column, PreprocessingConfig, Preprocessor, TaskKind};

    pub use crate::training::{
        BestModelSelector, MetricBundle, ModelKind, ModelStore, ScoringPolicy, SvmMode, TrainOptions,
        TrainedModel, TrainingData,
    };

    pub use crate::store::{BlobStore, DocumentStore, FileStore, MemoryStore};
}
