//! Error types for the server

use crate::error::QuickmlError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<QuickmlError> for ServerError {
    fn from(err: QuickmlError) -> Self {
        match err {
            QuickmlError::NotFound(_) => ServerError::NotFound(err.to_string()),
            QuickmlError::Cancelled(_) => ServerError::Unavailable(err.to_string()),
            e if e.is_client_error() => ServerError::BadRequest(e.to_string()),
            e => ServerError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ServerError::Unavailable(msg) => {
                tracing::warn!(detail = %msg, "Request aborted");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let cases = [
            (QuickmlError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (QuickmlError::UnsupportedFormat("x".into()), StatusCode::BAD_REQUEST),
            (QuickmlError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (QuickmlError::Cancelled("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (QuickmlError::TrainingError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (QuickmlError::StoreError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            let response = ServerError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
