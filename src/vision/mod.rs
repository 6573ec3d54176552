// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for scene-text OCR
//!
//! This module provides:
//! - A bounded, single-flight model cache
//! - The detection/recognition pipeline over injected capabilities
//! - An ONNX Runtime backend (EAST detector, CRNN recognizer)
//!
//! Both models run on CPU.

pub mod errors;
pub mod image_utils;
pub mod model_cache;
pub mod ocr;
pub mod onnx;

pub use errors::{DetectionError, ModelLoadError, OcrError, RecognitionError};
pub use image_utils::{decode_image_bytes, detect_format, encode_png, ImageError, ImageInfo};
pub use model_cache::{CacheStats, ModelCache, ModelHandle, ModelKey, ModelKind};
pub use onnx::{OnnxConfig, OnnxModelLoader};
