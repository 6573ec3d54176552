// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, info, warn};

use super::response::OcrResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::{decode_image_bytes, ModelKind, OcrError};

/// Multipart field carrying the upload
pub const IMAGE_FIELD: &str = "image";

/// POST /v1/ocr - Detect and transcribe the text in an uploaded image
///
/// # Request
/// - multipart form with an `image` file field (PNG, JPEG, WebP, GIF, BMP or
///   TIFF, at most 10MB)
///
/// # Response
/// - `sessionId`: identifier of the stored session
/// - `lineCount`: number of detected lines
/// - `lines`: text, score, corners and bounds per line
/// - `processingTimeMs`: detection plus recognition time
/// - `artifacts`: URLs of `input.png`, `output.png` and `result.json`
///
/// # Errors
/// - 400 Bad Request: missing or undecodable image
/// - 500 Internal Server Error: model load, inference or storage failure
pub async fn ocr_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, ApiError> {
    // 1. Read the upload
    let data = read_image_field(&mut multipart).await?;

    // 2. Decode
    let (image, image_info) = decode_image_bytes(&data).map_err(|e| {
        warn!("Failed to decode image: {}", e);
        ApiError::from(e)
    })?;
    debug!(
        "Decoded image: {}x{} {:?}, {} bytes",
        image_info.width, image_info.height, image_info.format, image_info.size_bytes
    );

    // 3. Acquire both models
    let detector = state
        .models
        .acquire(ModelKind::Detector, &state.east_model_dir)
        .await
        .map_err(|e| {
            warn!("Detector unavailable: {}", e);
            ApiError::from(e)
        })?;
    let recognizer = state
        .models
        .acquire(ModelKind::Recognizer, &state.crnn_model_dir)
        .await
        .map_err(|e| {
            warn!("Recognizer unavailable: {}", e);
            ApiError::from(e)
        })?;

    // 4. Inference and persistence on a blocking worker
    let pipeline = state.pipeline.clone();
    let store = state.store.clone();
    let (session_id, result) = tokio::task::spawn_blocking(move || {
        let result = pipeline.run(&image, &detector, &recognizer)?;
        let session_id = store.persist(&image, &result)?;
        Ok::<_, OcrError>((session_id, result))
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("OCR worker failed: {}", e)))?
    .map_err(|e| {
        warn!("OCR request failed: {}", e);
        ApiError::from(e)
    })?;

    info!(
        "OCR complete: session {}, {} lines, {}ms",
        session_id,
        result.text_lines.len(),
        result.timing.overall.as_millis()
    );

    Ok(Json(OcrResponse::new(session_id, &result)))
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }
        return field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read image: {}", e)));
    }

    warn!("OCR request without an image field");
    Err(ApiError::ValidationError {
        field: IMAGE_FIELD.to_string(),
        message: "image is required".to_string(),
    })
}
