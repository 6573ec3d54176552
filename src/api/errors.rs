// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::storage::StorageError;
use crate::vision::{ImageError, ModelLoadError, OcrError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    NotFound(String),
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    ModelUnavailable { model: String, reason: String },
    InferenceFailed(String),
    StorageFailed(String),
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::ModelUnavailable { model, reason } => {
                let mut details = HashMap::new();
                details.insert(
                    "model".to_string(),
                    serde_json::Value::String(model.clone()),
                );
                ("model_unavailable", reason.clone(), Some(details))
            }
            ApiError::InferenceFailed(msg) => ("inference_failed", msg.clone(), None),
            ApiError::StorageFailed(msg) => ("storage_failed", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => 400,
            ApiError::ModelUnavailable { .. }
            | ApiError::InferenceFailed(_)
            | ApiError::StorageFailed(_)
            | ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::ModelUnavailable { model, reason } => {
                write!(f, "Model '{}' unavailable: {}", model, reason)
            }
            ApiError::InferenceFailed(msg) => write!(f, "Inference failed: {}", msg),
            ApiError::StorageFailed(msg) => write!(f, "Storage failed: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response(None))).into_response()
    }
}

impl From<ImageError> for ApiError {
    fn from(e: ImageError) -> Self {
        ApiError::ValidationError {
            field: "image".to_string(),
            message: e.to_string(),
        }
    }
}

impl From<ModelLoadError> for ApiError {
    fn from(e: ModelLoadError) -> Self {
        let model = match &e {
            ModelLoadError::EmptyPath => String::new(),
            ModelLoadError::CheckpointNotFound { path } => path.display().to_string(),
            ModelLoadError::ArchitectureMismatch { kind, .. }
            | ModelLoadError::RestoreFailed { kind, .. } => kind.to_string(),
        };
        ApiError::ModelUnavailable {
            model,
            reason: e.to_string(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::SessionNotFound(id) => {
                ApiError::NotFound(format!("Session {} not found", id))
            }
            StorageError::UnknownArtifact(name) => {
                ApiError::NotFound(format!("Unknown artifact '{}'", name))
            }
            other => ApiError::StorageFailed(other.to_string()),
        }
    }
}

impl From<OcrError> for ApiError {
    fn from(e: OcrError) -> Self {
        match e {
            OcrError::ModelLoad(e) => e.into(),
            OcrError::Storage(e) => e.into(),
            OcrError::Detection(_) | OcrError::Recognition(_) => {
                ApiError::InferenceFailed(e.to_string())
            }
            OcrError::ModelKindMismatch { .. } => ApiError::InternalError(e.to_string()),
        }
    }
}
