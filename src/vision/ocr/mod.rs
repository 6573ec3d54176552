// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scene-text OCR: detection, recognition and orchestration
//!
//! Components:
//! - `capability` - detector/recognizer/loader traits the pipeline consumes
//! - `quad` - oriented text boxes
//! - `preprocessing` - working-size computation and tensor conversion
//! - `detection` - resize, detect, rescale, filter
//! - `recognition` - crop with margin, transcribe
//! - `pipeline` - detection then per-line recognition

pub mod capability;
pub mod detection;
pub mod pipeline;
pub mod preprocessing;
pub mod quad;
pub mod recognition;

pub use capability::{DecodedBoxes, FeatureMaps, ModelLoader, TextDetector, TextRecognizer};
pub use detection::{Detection, DetectionAdapter, DetectionConfig, DetectionTiming};
pub use pipeline::{InferenceResult, Pipeline, RuntimeParams, TextLine, Timing};
pub use preprocessing::WorkingSize;
pub use quad::Quad;
pub use recognition::{crop_region, CropRegion, RecognitionAdapter};
