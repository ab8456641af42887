//! HTTP request handlers

use std::sync::Arc;
use std::time::Duration;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::data::{frame_from_documents, frame_to_documents, parse_bytes, DatasetFormat};
use crate::error::QuickmlError;
use crate::preprocessing::{detect_target_column, Preprocessor};
use crate::store::{reserve_collection, timestamp_now};
use crate::training::{ModelKind, TrainTarget, TrainingData, TrainingJob};

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Dataset Handlers
// ============================================================================

/// Upload a dataset file and store its rows as a new collection
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| ServerError::BadRequest(e.to_string()))? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        // reject before reading the body
        let format = DatasetFormat::from_filename(&file_name)?;
        let data = field.bytes().await.map_err(|e| ServerError::BadRequest(e.to_string()))?;
        info!(file = %file_name, bytes = data.len(), "Received upload");

        let df = parse_bytes(format, &data)?;
        let docs = frame_to_documents(&df)?;

        let collection = reserve_collection(state.documents.as_ref(), "dataset", &timestamp_now())?;
        let row_count = state.documents.insert_many(&collection, docs)?;
        info!(collection = %collection, rows = row_count, "Dataset stored");

        return Ok(Json(json!({
            "message": "Dataset uploaded successfully",
            "raw_collection": collection,
            "file_name": file_name,
            "row_count": row_count,
        })));
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

/// All rows of a collection
pub async fn get_dataset(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let docs = state.documents.find_all(&collection)?;
    if docs.is_empty() {
        return Err(ServerError::NotFound("No dataset found".to_string()));
    }
    Ok(Json(json!({ "dataset": docs })))
}

/// Column names of a collection, read from one sample row
pub async fn get_features(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let sample = state
        .documents
        .find_one(&collection)?
        .ok_or_else(|| ServerError::NotFound("No dataset found".to_string()))?;
    let features: Vec<&String> = sample.keys().collect();
    Ok(Json(json!({ "features": features })))
}

pub async fn list_collections(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let mut collections = state.documents.list_collections()?;
    collections.sort();
    Ok(Json(json!({ "collections": collections })))
}

// ============================================================================
// Preprocessing
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FeatureSelectionRequest {
    pub mode: String,
    pub target_column: Option<String>,
    pub selected_features: Option<Vec<String>>,
}

/// Preprocess a collection into a new `processed_*` collection.
///
/// `auto` detects the target. `manual` uses the given target and, when
/// `selected_features` is non-empty, keeps only those columns plus the target.
pub async fn select_features(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Json(request): Json<FeatureSelectionRequest>,
) -> Result<Json<serde_json::Value>> {
    let manual = match request.mode.as_str() {
        "manual" => true,
        "auto" => false,
        other => return Err(ServerError::BadRequest(format!("Invalid mode '{}'", other))),
    };

    let docs = state.documents.find_all(&collection)?;
    if docs.is_empty() {
        return Err(ServerError::NotFound("No data found in the collection".to_string()));
    }

    let processed = tokio::task::spawn_blocking(move || -> crate::error::Result<Vec<_>> {
        let mut df = frame_from_documents(&docs)?;
        // an empty list keeps every column
        let selected = request.selected_features.filter(|features| !features.is_empty());
        let target = match (manual, request.target_column) {
            (true, Some(target)) => target,
            (true, None) if selected.is_some() => {
                return Err(QuickmlError::ValidationError(
                    "manual feature selection requires target_column".to_string(),
                ))
            }
            _ => detect_target_column(&df)?,
        };
        if let (true, Some(features)) = (manual, selected) {
            let mut keep = features;
            if !keep.contains(&target) {
                keep.push(target.clone());
            }
            df = df
                .select(keep.iter().map(|s| s.as_str()))
                .map_err(|e| QuickmlError::FeatureNotFound(e.to_string()))?;
        }

        let output = Preprocessor::new().fit_transform(&df, &target)?;
        output.to_documents()
    })
    .await
    .map_err(|e| ServerError::Internal(format!("preprocessing task failed: {}", e)))??;

    let processed_collection = reserve_collection(state.documents.as_ref(), "processed", &timestamp_now())?;
    let rows = state.documents.insert_many(&processed_collection, processed)?;
    info!(source = %collection, collection = %processed_collection, rows, "Preprocessing complete");

    Ok(Json(json!({
        "message": "Preprocessing complete",
        "processed_collection": processed_collection,
    })))
}

// ============================================================================
// Training Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub collection_name: String,
    #[serde(default)]
    pub model_type: String,
    #[serde(default)]
    pub auto_model_selection: bool,
    /// Overrides target detection
    pub target_column: Option<String>,
}

/// Train one model, or all of them with best-model selection
pub async fn train_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<serde_json::Value>> {
    let collection = request.collection_name.trim().to_string();
    if collection.is_empty() {
        return Err(ServerError::BadRequest(
            "Invalid collection_name. Must be a non-empty string.".to_string(),
        ));
    }
    if !state.documents.collection_exists(&collection)? {
        return Err(ServerError::NotFound("Specified collection not found.".to_string()));
    }
    let docs = state.documents.find_all(&collection)?;
    if docs.is_empty() {
        return Err(ServerError::NotFound(
            "No data found in the specified collection.".to_string(),
        ));
    }

    let target = if request.auto_model_selection {
        TrainTarget::BestModel
    } else {
        TrainTarget::Single(request.model_type.parse::<ModelKind>()?)
    };

    let df = frame_from_documents(&docs)?;
    let target_column = match request.target_column {
        Some(col) => col,
        None => detect_target_column(&df)?,
    };
    let data = TrainingData::from_frame(&df, &target_column)?;

    let job_id = Uuid::new_v4();
    info!(
        %job_id,
        collection = %collection,
        target = %target_column,
        ?target,
        rows = data.n_samples(),
        "Training started"
    );

    let job = TrainingJob::new(data, target).with_policy(state.config.scoring_policy);
    let deadline = Duration::from_secs(state.config.training_timeout_secs);
    let outcome = job.run(state.models.clone(), deadline).await.map_err(|e| {
        warn!(%job_id, error = %e, "Training failed");
        ServerError::from(e)
    })?;

    Ok(Json(json!({
        "message": "Model trained and saved successfully.",
        "model_type": outcome.model_type,
        "file_id": outcome.artifact.file_id,
        "filename": outcome.artifact.filename,
        "metrics": {
            "rmse": outcome.metrics.rmse,
            "mae": outcome.metrics.mae,
            "r2": outcome.metrics.r2,
            "accuracy": outcome.metrics.accuracy,
        },
    })))
}

/// Stream a stored model artifact as a `.pkl` attachment
pub async fn download_model(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse> {
    let blob = state
        .blobs
        .get(&file_id)?
        .ok_or_else(|| ServerError::NotFound(format!("Model not found: {}", file_id)))?;

    let mut filename = if blob.filename.is_empty() {
        "model".to_string()
    } else {
        blob.filename
    };
    if !filename.ends_with(".pkl") {
        filename.push_str(".pkl");
    }
    let disposition = format!("attachment; filename={}", filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .map_err(|e| ServerError::Internal(format!("Invalid header: {}", e)))?,
            ),
        ],
        blob.data,
    ))
}

// ============================================================================
// System
// ============================================================================

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
