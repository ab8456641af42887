//! Model artifact persistence
//!
//! A saved model is two records: the JSON-encoded estimator as a blob named
//! `{model_name}_{timestamp}`, and a metrics document in a fresh
//! `trained_model_{timestamp}` collection.

use super::metrics::MetricBundle;
use super::models::TrainedModel;
use crate::error::{QuickmlError, Result};
use crate::store::{reserve_collection, timestamp_now, BlobStore, DocumentStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Where a persisted model ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub file_id: String,
    pub filename: String,
    pub metrics_collection: String,
    pub timestamp: String,
}

/// Writes and reads model artifacts through the configured stores
#[derive(Clone)]
pub struct ModelStore {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
}

impl ModelStore {
    pub fn new(documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { documents, blobs }
    }

    /// Persist a fitted model and its metrics.
    pub fn save(&self, model: &TrainedModel, metrics: &MetricBundle) -> Result<ArtifactRef> {
        let timestamp = timestamp_now();
        let model_name = model.kind().name();
        let filename = format!("{}_{}", model_name, timestamp);

        let bytes = model.to_bytes()?;
        let file_id = self.blobs.put(&filename, &bytes)?;

        let collection = reserve_collection(self.documents.as_ref(), "trained_model", &timestamp)?;
        let mut doc = match serde_json::to_value(metrics)? {
            Value::Object(map) => map,
            other => {
                return Err(QuickmlError::SerializationError(format!(
                    "metrics serialized to {} instead of an object",
                    other
                )))
            }
        };
        doc.insert("model_name".to_string(), Value::from(model_name));
        doc.insert("file_id".to_string(), Value::from(file_id.clone()));
        doc.insert("filename".to_string(), Value::from(filename.clone()));
        doc.insert("timestamp".to_string(), Value::from(timestamp.clone()));
        self.documents.insert_one(&collection, doc)?;

        info!(
            model = model_name,
            file_id = %file_id,
            collection = %collection,
            size = bytes.len(),
            "Model artifact saved"
        );

        Ok(ArtifactRef {
            file_id,
            filename,
            metrics_collection: collection,
            timestamp,
        })
    }

    /// Load a model back from its blob id
    pub fn load(&self, file_id: &str) -> Result<TrainedModel> {
        let blob = self
            .blobs
            .get(file_id)?
            .ok_or_else(|| QuickmlError::NotFound(format!("model '{}'", file_id)))?;
        TrainedModel::from_bytes(&blob.data)
    }
}
