// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::ocr::ocr_handler;
use super::sessions::session_artifact_handler;
use crate::config::NodeConfig;
use crate::storage::ResultStore;
use crate::vision::image_utils::MAX_IMAGE_SIZE;
use crate::vision::ocr::Pipeline;
use crate::vision::{CacheStats, ModelCache};

/// Multipart framing on top of the image itself
const BODY_OVERHEAD: usize = 64 * 1024;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub models: Arc<ModelCache>,
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<ResultStore>,
    pub east_model_dir: PathBuf,
    pub crnn_model_dir: PathBuf,
}

impl AppState {
    pub fn new(config: &NodeConfig, models: Arc<ModelCache>) -> Self {
        Self {
            models,
            pipeline: Arc::new(Pipeline::new(config.detection_config())),
            store: Arc::new(ResultStore::new(&config.save_dir)),
            east_model_dir: config.models.east_model_dir.clone(),
            crnn_model_dir: config.models.crnn_model_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: serde_json::Value,
    pub cache: CacheStats,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/ocr", post(ocr_handler))
        .route(
            "/v1/sessions/:session_id/:artifact",
            get(session_artifact_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE + BODY_OVERHEAD))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::version::get_version_info(),
        cache: state.models.stats().await,
    })
}
