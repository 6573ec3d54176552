// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Capability contracts for the detection and recognition models
//!
//! The pipeline only talks to models through these traits. The ONNX backend in
//! `vision::onnx` is one implementation; tests inject deterministic fakes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use ndarray::{Array2, Array3};

use super::quad::Quad;
use crate::vision::errors::{DetectionError, ModelLoadError, RecognitionError};

/// Raw detector output for one working image
#[derive(Debug, Clone)]
pub struct FeatureMaps {
    /// Per-cell text probability, shape (rows, cols)
    pub score: Array2<f32>,
    /// Per-cell geometry channels, shape (rows, cols, channels)
    pub geometry: Array3<f32>,
}

/// Boxes decoded from a pair of feature maps
#[derive(Debug, Clone, Default)]
pub struct DecodedBoxes {
    /// Quads in working-image coordinates, in NMS output order
    pub quads: Vec<Quad>,
    /// Time spent restoring geometry before NMS, if the decoder measures it
    pub restore: Duration,
}

impl DecodedBoxes {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Text detector: forward pass plus box decoding
pub trait TextDetector: Send + Sync {
    fn forward(&self, working_image: &RgbImage) -> Result<FeatureMaps, DetectionError>;

    fn decode(&self, maps: &FeatureMaps) -> Result<DecodedBoxes, DetectionError>;
}

/// Text recognizer: returns candidate transcriptions, best first
pub trait TextRecognizer: Send + Sync {
    fn transcribe(&self, crop: &RgbImage) -> Result<Vec<String>, RecognitionError>;
}

/// Builds capabilities from checkpoint locations
///
/// Loading is slow and blocking; the model cache calls it at most once per key.
pub trait ModelLoader: Send + Sync {
    fn load_detector(&self, checkpoint: &Path) -> Result<Arc<dyn TextDetector>, ModelLoadError>;

    fn load_recognizer(
        &self,
        checkpoint: &Path,
    ) -> Result<Arc<dyn TextRecognizer>, ModelLoadError>;
}
