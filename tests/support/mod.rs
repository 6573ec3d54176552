// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic detector/recognizer/loader doubles shared by integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fabstir_ocr_node::vision::ocr::{
    DecodedBoxes, FeatureMaps, ModelLoader, Quad, TextDetector, TextRecognizer,
};
use fabstir_ocr_node::vision::{
    encode_png, DetectionError, ModelHandle, ModelLoadError, RecognitionError,
};
use image::{Rgb, RgbImage};
use mockall::mock;
use ndarray::{Array2, Array3};

/// Feature-map stride of the ink detector, same as EAST
pub const STRIDE: u32 = 4;

/// Pixels darker than this count as ink
const INK_LEVEL: u8 = 128;

pub fn white_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

/// Paint a solid black rectangle
pub fn draw_block(image: &mut RgbImage, x: u32, y: u32, width: u32, height: u32) {
    for py in y..(y + height).min(image.height()) {
        for px in x..(x + width).min(image.width()) {
            image.put_pixel(px, py, Rgb([0, 0, 0]));
        }
    }
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    encode_png(image).unwrap()
}

fn is_ink(pixel: &Rgb<u8>) -> bool {
    pixel.0.iter().all(|&c| c < INK_LEVEL)
}

/// Finds the single bounding box of dark pixels
///
/// The score map samples the centre of each 4x4 cell; decoding returns one
/// axis-aligned quad covering every inked cell, or nothing.
#[derive(Debug, Default)]
pub struct InkDetector;

impl TextDetector for InkDetector {
    fn forward(&self, working_image: &RgbImage) -> Result<FeatureMaps, DetectionError> {
        let rows = (working_image.height() / STRIDE) as usize;
        let cols = (working_image.width() / STRIDE) as usize;
        let score = Array2::from_shape_fn((rows, cols), |(r, c)| {
            let x = c as u32 * STRIDE + STRIDE / 2;
            let y = r as u32 * STRIDE + STRIDE / 2;
            let px = working_image.get_pixel(x, y);
            if is_ink(px) {
                1.0
            } else {
                0.0
            }
        });
        Ok(FeatureMaps {
            score,
            geometry: Array3::zeros((rows, cols, 5)),
        })
    }

    fn decode(&self, maps: &FeatureMaps) -> Result<DecodedBoxes, DetectionError> {
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for ((r, c), &v) in maps.score.indexed_iter() {
            if v < 0.5 {
                continue;
            }
            bounds = Some(match bounds {
                None => (c, r, c, r),
                Some((c0, r0, c1, r1)) => (c0.min(c), r0.min(r), c1.max(c), r1.max(r)),
            });
        }

        let quads = bounds
            .map(|(c0, r0, c1, r1)| {
                let s = STRIDE as f64;
                vec![Quad::from_rect(
                    c0 as f64 * s,
                    r0 as f64 * s,
                    (c1 - c0 + 1) as f64 * s,
                    (r1 - r0 + 1) as f64 * s,
                    0.99,
                )]
            })
            .unwrap_or_default();
        Ok(DecodedBoxes {
            quads,
            restore: Duration::ZERO,
        })
    }
}

/// Returns fixed working-space quads regardless of the image
#[derive(Debug, Clone)]
pub struct FixedDetector {
    pub quads: Vec<Quad>,
}

impl TextDetector for FixedDetector {
    fn forward(&self, _working_image: &RgbImage) -> Result<FeatureMaps, DetectionError> {
        Ok(FeatureMaps {
            score: Array2::zeros((1, 1)),
            geometry: Array3::zeros((1, 1, 5)),
        })
    }

    fn decode(&self, _maps: &FeatureMaps) -> Result<DecodedBoxes, DetectionError> {
        Ok(DecodedBoxes {
            quads: self.quads.clone(),
            restore: Duration::ZERO,
        })
    }
}

/// Transcribes any crop containing ink as `word`, anything else as ""
#[derive(Debug, Clone)]
pub struct InkRecognizer {
    pub word: String,
}

impl InkRecognizer {
    pub fn new(word: &str) -> Self {
        Self {
            word: word.to_string(),
        }
    }
}

impl TextRecognizer for InkRecognizer {
    fn transcribe(&self, crop: &RgbImage) -> Result<Vec<String>, RecognitionError> {
        if crop.pixels().any(is_ink) {
            Ok(vec![self.word.clone()])
        } else {
            Ok(vec![String::new()])
        }
    }
}

mock! {
    pub Recognizer {}

    impl TextRecognizer for Recognizer {
        fn transcribe(&self, crop: &RgbImage) -> Result<Vec<String>, RecognitionError>;
    }
}

pub fn detector_handle(detector: impl TextDetector + 'static) -> ModelHandle {
    ModelHandle::from_detector("/models/east", Arc::new(detector))
}

pub fn recognizer_handle(recognizer: impl TextRecognizer + 'static) -> ModelHandle {
    ModelHandle::from_recognizer("/models/crnn", Arc::new(recognizer))
}

/// Loader that counts loads, can be slowed down and can be told to fail
#[derive(Debug, Default)]
pub struct FakeLoader {
    pub detector_loads: AtomicUsize,
    pub recognizer_loads: AtomicUsize,
    pub fail: AtomicBool,
    /// Number of upcoming loads that fail before loads succeed again
    pub failures_left: AtomicUsize,
    pub delay: Duration,
    pub word: String,
}

impl FakeLoader {
    pub fn new(word: &str) -> Self {
        Self {
            word: word.to_string(),
            ..Self::default()
        }
    }

    pub fn with_delay(word: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(word)
        }
    }

    pub fn loads(&self) -> usize {
        self.detector_loads.load(Ordering::SeqCst) + self.recognizer_loads.load(Ordering::SeqCst)
    }

    fn check(&self, checkpoint: &Path) -> Result<(), ModelLoadError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let scheduled_failure = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scheduled_failure || self.fail.load(Ordering::SeqCst) {
            return Err(ModelLoadError::CheckpointNotFound {
                path: PathBuf::from(checkpoint),
            });
        }
        Ok(())
    }
}

impl ModelLoader for FakeLoader {
    fn load_detector(&self, checkpoint: &Path) -> Result<Arc<dyn TextDetector>, ModelLoadError> {
        self.detector_loads.fetch_add(1, Ordering::SeqCst);
        self.check(checkpoint)?;
        Ok(Arc::new(InkDetector))
    }

    fn load_recognizer(
        &self,
        checkpoint: &Path,
    ) -> Result<Arc<dyn TextRecognizer>, ModelLoadError> {
        self.recognizer_loads.fetch_add(1, Ordering::SeqCst);
        self.check(checkpoint)?;
        Ok(Arc::new(InkRecognizer::new(&self.word)))
    }
}
