// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR pipeline orchestrator
//!
//! Runs detection once, then recognition for every surviving box in detection
//! order, and assembles the result with timing and host metadata.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::detection::{DetectionAdapter, DetectionConfig};
use super::quad::Quad;
use super::recognition::RecognitionAdapter;
use crate::host::HostInfo;
use crate::vision::errors::OcrError;
use crate::vision::model_cache::ModelHandle;

/// One detected and transcribed line, in original-image coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    #[serde(flatten)]
    pub quad: Quad,
    pub text: String,
}

/// Run-time parameters recorded with each result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeParams {
    pub start_time: DateTime<Utc>,
    /// Original size as `WxH`
    pub image_size: String,
    /// Detector working size as `WxH`
    pub working_size: String,
}

/// Timing breakdown, serialized as seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    #[serde(with = "duration_secs")]
    pub net: Duration,
    #[serde(with = "duration_secs")]
    pub restore: Duration,
    #[serde(with = "duration_secs")]
    pub nms: Duration,
    #[serde(with = "duration_secs")]
    pub overall: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub text_lines: Vec<TextLine>,
    pub rtparams: RuntimeParams,
    pub timing: Timing,
    pub host: HostInfo,
}

impl InferenceResult {
    pub fn quads(&self) -> impl Iterator<Item = &Quad> {
        self.text_lines.iter().map(|line| &line.quad)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    detection: DetectionAdapter,
    recognition: RecognitionAdapter,
}

impl Pipeline {
    pub fn new(config: DetectionConfig) -> Self {
        Self {
            detection: DetectionAdapter::new(config),
            recognition: RecognitionAdapter::new(),
        }
    }

    /// Detect and transcribe all text in `image`
    ///
    /// Any recognition failure fails the whole run; no partial result is
    /// returned.
    pub fn run(
        &self,
        image: &RgbImage,
        detector: &ModelHandle,
        recognizer: &ModelHandle,
    ) -> Result<InferenceResult, OcrError> {
        let start_time = Utc::now();
        let start = Instant::now();

        let detector = detector.detector()?;
        let recognizer = recognizer.recognizer()?;

        let detection = self.detection.detect(detector, image)?;

        let mut text_lines = Vec::with_capacity(detection.quads.len());
        for (index, quad) in detection.quads.into_iter().enumerate() {
            let text = self.recognition.recognize(recognizer, image, &quad)?;
            debug!("Line {}: {:?} (score {:.3})", index, text, quad.score);
            text_lines.push(TextLine { quad, text });
        }

        let overall = start.elapsed();
        info!(
            "[timing] {:.3}s, {} text lines",
            overall.as_secs_f64(),
            text_lines.len()
        );

        Ok(InferenceResult {
            text_lines,
            rtparams: RuntimeParams {
                start_time,
                image_size: format!("{}x{}", image.width(), image.height()),
                working_size: format!("{}x{}", detection.working.width, detection.working.height),
            },
            timing: Timing {
                net: detection.timing.net,
                restore: detection.timing.restore,
                nms: detection.timing.nms,
                overall,
            },
            host: HostInfo::current(),
        })
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
