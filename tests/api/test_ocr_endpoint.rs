// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! HTTP endpoint tests for POST /v1/ocr, GET /v1/sessions and GET /health
//!
//! The router runs in-process with a counting fake loader, so no model files
//! are needed.

use crate::support::{draw_block, png_bytes, white_image, FakeLoader};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use fabstir_ocr_node::{
    api::{create_router, AppState},
    config::NodeConfig,
    vision::ModelCache,
};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "ocr-test-boundary";

struct TestApp {
    router: Router,
    loader: Arc<FakeLoader>,
    _save_dir: TempDir,
}

fn setup() -> TestApp {
    let save_dir = TempDir::new().unwrap();
    let mut config = NodeConfig::default();
    config.save_dir = save_dir.path().to_path_buf();

    let loader = Arc::new(FakeLoader::new("HELLO"));
    let models = Arc::new(ModelCache::new(loader.clone(), config.models.cache_capacity));
    let router = create_router(AppState::new(&config, models));

    TestApp {
        router,
        loader,
        _save_dir: save_dir,
    }
}

fn multipart_request(field: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\nContent-Type: image/png\r\n\r\n",
            BOUNDARY, field
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/v1/ocr")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec(), content_type)
}

fn word_image_png() -> Vec<u8> {
    let mut image = white_image(400, 200);
    draw_block(&mut image, 100, 80, 200, 40);
    png_bytes(&image)
}

#[cfg(test)]
mod ocr_endpoint_tests {
    use super::*;

    // =============================================================================
    // Success path
    // =============================================================================

    /// Test 1: Upload returns the session and its lines
    #[tokio::test]
    async fn test_ocr_single_word() {
        let app = setup();

        let (status, body, _) = send(&app.router, multipart_request("image", &word_image_png())).await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["lineCount"], 1);
        assert_eq!(json["lines"][0]["text"], "HELLO");
        let session_id = json["sessionId"].as_str().unwrap();
        assert_eq!(
            json["artifacts"]["output"],
            format!("/v1/sessions/{}/output.png", session_id)
        );
    }

    /// Test 2: Session artifacts are retrievable after an upload
    #[tokio::test]
    async fn test_artifacts_retrievable() {
        let app = setup();
        let (_, body, _) = send(&app.router, multipart_request("image", &word_image_png())).await;
        let json: Value = serde_json::from_slice(&body).unwrap();

        let output_url = json["artifacts"]["output"].as_str().unwrap();
        let (status, png, content_type) = send(&app.router, get(output_url)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("image/png"));
        assert_eq!(image::load_from_memory(&png).unwrap().width(), 400);

        let result_url = json["artifacts"]["result"].as_str().unwrap();
        let (status, result, content_type) = send(&app.router, get(result_url)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        let stored: Value = serde_json::from_slice(&result).unwrap();
        assert_eq!(stored["session_id"], json["sessionId"]);
        assert_eq!(stored["text_lines"][0]["text"], "HELLO");
    }

    /// Test 3: Models are loaded once across requests
    #[tokio::test]
    async fn test_models_loaded_once() {
        let app = setup();

        for _ in 0..3 {
            let (status, _, _) =
                send(&app.router, multipart_request("image", &word_image_png())).await;
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(app.loader.detector_loads.load(Ordering::SeqCst), 1);
        assert_eq!(app.loader.recognizer_loads.load(Ordering::SeqCst), 1);
    }

    // =============================================================================
    // Client errors
    // =============================================================================

    /// Test 4: Missing image field is a bad request
    #[tokio::test]
    async fn test_missing_image_field() {
        let app = setup();

        let (status, body, _) = send(&app.router, multipart_request("file", &word_image_png())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error_type"], "validation_error");
        assert_eq!(app.loader.loads(), 0);
    }

    /// Test 5: Undecodable upload is a bad request
    #[tokio::test]
    async fn test_invalid_image_bytes() {
        let app = setup();

        let (status, _, _) = send(&app.router, multipart_request("image", b"not an image")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    /// Test 6: Malformed ids, unknown sessions and unknown artifacts are 404
    #[tokio::test]
    async fn test_unknown_sessions_not_found() {
        let app = setup();

        let (status, _, _) = send(&app.router, get("/v1/sessions/not-a-uuid/input.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let missing = format!("/v1/sessions/{}/input.png", uuid::Uuid::new_v4());
        let (status, _, _) = send(&app.router, get(&missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let bad_artifact = format!("/v1/sessions/{}/secrets.txt", uuid::Uuid::new_v4());
        let (status, body, _) = send(&app.router, get(&bad_artifact)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error_type"], "not_found");
    }

    // =============================================================================
    // Server errors
    // =============================================================================

    /// Test 7: Model load failure is a server error and is not cached
    #[tokio::test]
    async fn test_model_load_failure() {
        let app = setup();
        app.loader.fail.store(true, Ordering::SeqCst);

        let (status, body, _) = send(&app.router, multipart_request("image", &word_image_png())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error_type"], "model_unavailable");

        app.loader.fail.store(false, Ordering::SeqCst);
        let (status, _, _) = send(&app.router, multipart_request("image", &word_image_png())).await;
        assert_eq!(status, StatusCode::OK);
    }

    // =============================================================================
    // Health
    // =============================================================================

    /// Test 8: Health reports cache statistics
    #[tokio::test]
    async fn test_health() {
        let app = setup();
        send(&app.router, multipart_request("image", &word_image_png())).await;

        let (status, body, _) = send(&app.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["cache"]["loads"], 2);
        assert_eq!(json["cache"]["entries"], 2);
        assert_eq!(json["cache"]["capacity"], 100);
    }
}
