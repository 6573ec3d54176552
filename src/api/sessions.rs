// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session artifact retrieval

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use super::errors::ApiError;
use super::http_server::AppState;
use crate::storage::Artifact;

/// GET /v1/sessions/:session_id/:artifact
///
/// Serves `input.png`, `output.png` or `result.json` of a stored session.
/// Malformed ids and unknown artifact names are reported as 404.
pub async fn session_artifact_handler(
    State(state): State<AppState>,
    Path((session_id, artifact)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = Uuid::parse_str(&session_id)
        .map_err(|_| ApiError::NotFound(format!("Session {} not found", session_id)))?;
    let artifact: Artifact = artifact.parse()?;

    let bytes = state.store.read_artifact(session_id, artifact).await?;
    debug!("Serving {} bytes of {} for {}", bytes.len(), artifact, session_id);

    Ok(([(header::CONTENT_TYPE, artifact.content_type())], bytes))
}
