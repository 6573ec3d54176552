// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Recognition adapter: crop a text box and transcribe it

use image::{imageops, RgbImage};
use tracing::debug;

use super::capability::TextRecognizer;
use super::quad::Quad;
use crate::vision::errors::RecognitionError;

/// Pixel rectangle inside an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Expanded crop rectangle for a box, clipped to the image
///
/// The corners are truncated to integers first, then widened by one pixel on
/// each side. Returns `None` when nothing is left after clipping.
pub fn crop_region(quad: &Quad, image_width: u32, image_height: u32) -> Option<CropRegion> {
    let [[x0, y0], [x1, y1], [x2, y2], [x3, y3]] = quad.points;

    let xt = x0.min(x2) as i64 - 1;
    let yt = y0.min(y2) as i64 - 1;
    let xb = x1.max(x3) as i64 + 1;
    let yb = y1.max(y3) as i64 + 1;

    let clip = |v: i64, max: u32| v.clamp(0, max as i64);
    let left = clip(xt, image_width);
    let top = clip(yt, image_height);
    let right = clip(xb, image_width);
    let bottom = clip(yb, image_height);

    if right <= left || bottom <= top {
        return None;
    }

    Some(CropRegion {
        x: left as u32,
        y: top as u32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecognitionAdapter;

impl RecognitionAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Transcribe the text inside `quad`
    ///
    /// Returns an empty string without calling the recognizer when the crop is
    /// empty, and when the recognizer yields no candidates.
    pub fn recognize(
        &self,
        recognizer: &dyn TextRecognizer,
        image: &RgbImage,
        quad: &Quad,
    ) -> Result<String, RecognitionError> {
        let Some(region) = crop_region(quad, image.width(), image.height()) else {
            debug!("Empty crop for box at ({:.1}, {:.1})", quad.points[0][0], quad.points[0][1]);
            return Ok(String::new());
        };

        let crop =
            imageops::crop_imm(image, region.x, region.y, region.width, region.height).to_image();
        let candidates = recognizer.transcribe(&crop)?;

        Ok(candidates.into_iter().next().unwrap_or_default())
    }
}
