// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR API endpoint module
//!
//! Provides POST /v1/ocr for extracting text from uploaded images.

pub mod handler;
pub mod response;

pub use handler::{ocr_handler, IMAGE_FIELD};
pub use response::{ArtifactLinks, BoundingBox, OcrResponse, TextRegion};
