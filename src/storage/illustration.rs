// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotated copy of the input with every detected box outlined

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::vision::ocr::Quad;

/// Outline colour (cyan)
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 255]);

/// Draw each quad as a closed polyline on a copy of `image`
pub fn draw_illustration<'a>(
    image: &RgbImage,
    quads: impl IntoIterator<Item = &'a Quad>,
) -> RgbImage {
    let mut canvas = image.clone();
    for quad in quads {
        draw_quad_mut(&mut canvas, quad, BOX_COLOR);
    }
    canvas
}

/// Draw the four edges of `quad`, p3 joined back to p0
pub fn draw_quad_mut(canvas: &mut RgbImage, quad: &Quad, color: Rgb<u8>) {
    // corners are truncated to whole pixels before drawing
    let corners = quad
        .points
        .map(|[x, y]| ((x as i64) as f32, (y as i64) as f32));
    for i in 0..4 {
        draw_line_segment_mut(canvas, corners[i], corners[(i + 1) % 4], color);
    }
}
