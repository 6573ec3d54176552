// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::Artifact;
use crate::vision::ocr::{InferenceResult, TextLine};

/// Axis-aligned bounds of a text quad
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A detected text line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRegion {
    /// Transcribed text, empty when the crop fell outside the image
    pub text: String,
    /// Detection score
    pub score: f64,
    /// Corners in original-image coordinates, clockwise from top-left
    pub points: [[f64; 2]; 4],
    pub bounding_box: BoundingBox,
}

impl From<&TextLine> for TextRegion {
    fn from(line: &TextLine) -> Self {
        let fold = |vals: [f64; 4]| {
            vals.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
        };
        let (x_min, x_max) = fold(line.quad.xs());
        let (y_min, y_max) = fold(line.quad.ys());

        Self {
            text: line.text.clone(),
            score: line.quad.score,
            points: line.quad.points,
            bounding_box: BoundingBox {
                x: x_min,
                y: y_min,
                width: x_max - x_min,
                height: y_max - y_min,
            },
        }
    }
}

/// Where the session artifacts can be fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactLinks {
    pub input: String,
    pub output: String,
    pub result: String,
}

impl ArtifactLinks {
    pub fn for_session(session_id: Uuid) -> Self {
        let link = |artifact: Artifact| format!("/v1/sessions/{}/{}", session_id, artifact);
        Self {
            input: link(Artifact::Input),
            output: link(Artifact::Output),
            result: link(Artifact::Result),
        }
    }
}

/// Response from OCR processing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub session_id: Uuid,
    pub line_count: usize,
    pub lines: Vec<TextRegion>,
    /// Wall time of detection plus recognition in milliseconds
    pub processing_time_ms: u64,
    pub artifacts: ArtifactLinks,
}

impl OcrResponse {
    pub fn new(session_id: Uuid, result: &InferenceResult) -> Self {
        let lines: Vec<TextRegion> = result.text_lines.iter().map(TextRegion::from).collect();
        Self {
            session_id,
            line_count: lines.len(),
            lines,
            processing_time_ms: result.timing.overall.as_millis() as u64,
            artifacts: ArtifactLinks::for_session(session_id),
        }
    }
}
