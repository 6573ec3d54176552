// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection adapter
//!
//! Bridges the original image and the detector's working resolution: resizes,
//! runs the detector, maps boxes back to original coordinates, puts corners in
//! canonical order and drops degenerate boxes.

use std::time::{Duration, Instant};

use image::RgbImage;
use tracing::{debug, info, warn};

use super::capability::TextDetector;
use super::preprocessing::{resize_to_working, WorkingSize, DEFAULT_MAX_SIDE_LEN};
use super::quad::Quad;
use crate::vision::errors::DetectionError;

/// Minimum length of the two leading edges, in working-image pixels
pub const DEFAULT_MIN_EDGE_PX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    /// Longest working-image side
    pub max_side_len: u32,
    /// Boxes with a shorter (p0,p1) or (p3,p0) edge are discarded
    pub min_edge_px: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_side_len: DEFAULT_MAX_SIDE_LEN,
            min_edge_px: DEFAULT_MIN_EDGE_PX,
        }
    }
}

/// Detection stage timings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DetectionTiming {
    /// Detector forward pass
    pub net: Duration,
    /// Geometry restoration inside the decoder
    pub restore: Duration,
    /// Remainder of decoding (merging, NMS, box scoring)
    pub nms: Duration,
    /// Whole `detect` call, including resize and filtering
    pub total: Duration,
}

/// Output of one detection pass
#[derive(Debug, Clone)]
pub struct Detection {
    /// Surviving boxes in original-image coordinates, in decode order
    pub quads: Vec<Quad>,
    pub working: WorkingSize,
    pub timing: DetectionTiming,
}

#[derive(Debug, Clone, Default)]
pub struct DetectionAdapter {
    config: DetectionConfig,
}

impl DetectionAdapter {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Locate text boxes in `image`
    ///
    /// An image with no text yields an empty `quads` list, not an error.
    pub fn detect(
        &self,
        detector: &dyn TextDetector,
        image: &RgbImage,
    ) -> Result<Detection, DetectionError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidImage(format!(
                "image has zero size ({}x{})",
                width, height
            )));
        }

        let (working_image, working) = resize_to_working(image, self.config.max_side_len);
        debug!(
            "Working size {}x{} (ratio_h {:.4}, ratio_w {:.4})",
            working.width, working.height, working.ratio_h, working.ratio_w
        );

        let net_start = Instant::now();
        let maps = detector.forward(&working_image)?;
        let net = net_start.elapsed();

        let decode_start = Instant::now();
        let decoded = detector.decode(&maps)?;
        let decode_elapsed = decode_start.elapsed();
        let restore = decoded.restore;
        let nms = decode_elapsed.saturating_sub(restore);

        let candidates = decoded.quads.len();
        let quads: Vec<Quad> = decoded
            .quads
            .into_iter()
            .filter_map(|quad| self.to_original(quad, &working))
            .collect();

        info!(
            "net {:.0}ms, restore {:.0}ms, nms {:.0}ms",
            net.as_secs_f64() * 1000.0,
            restore.as_secs_f64() * 1000.0,
            nms.as_secs_f64() * 1000.0
        );
        if quads.len() < candidates {
            debug!(
                "Dropped {} degenerate boxes, kept {}",
                candidates - quads.len(),
                quads.len()
            );
        }

        Ok(Detection {
            quads,
            working,
            timing: DetectionTiming {
                net,
                restore,
                nms,
                total: start.elapsed(),
            },
        })
    }

    /// Rescale a working-space quad and apply the degeneracy filter
    ///
    /// Corners are ordered in original space; edge lengths are measured on that
    /// same corner order mapped back into working space.
    fn to_original(&self, quad: Quad, working: &WorkingSize) -> Option<Quad> {
        if !quad.is_finite() {
            warn!("Skipping box with non-finite coordinates");
            return None;
        }

        let original = quad
            .to_original(working.ratio_h, working.ratio_w)
            .canonicalize();
        let edge = original
            .to_working(working.ratio_h, working.ratio_w)
            .min_leading_edge();

        if edge < self.config.min_edge_px {
            None
        } else {
            Some(original)
        }
    }
}
