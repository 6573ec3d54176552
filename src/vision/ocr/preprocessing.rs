// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the detector and recognizer

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Default cap on the longest working-image side
pub const DEFAULT_MAX_SIDE_LEN: u32 = 2400;

/// Working-image sides are multiples of this stride
pub const SIZE_STRIDE: u32 = 32;

/// Resized image dimensions and the ratios used to produce them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkingSize {
    pub width: u32,
    pub height: u32,
    /// working height / original height
    pub ratio_h: f64,
    /// working width / original width
    pub ratio_w: f64,
}

/// Compute the detector working size for an image
///
/// Steps:
/// 1. Scale so the longest side is at most `max_side_len`
/// 2. Round each side that is not a multiple of 32 down to the previous
///    multiple below it
/// 3. Clamp each side to at least 32
pub fn working_size(width: u32, height: u32, max_side_len: u32) -> WorkingSize {
    let longest = width.max(height);
    let ratio = if longest > max_side_len {
        max_side_len as f64 / longest as f64
    } else {
        1.0
    };

    let snap = |side: u32| -> u32 {
        let scaled = (side as f64 * ratio) as i64;
        let stride = SIZE_STRIDE as i64;
        let snapped = if scaled % stride == 0 {
            scaled
        } else {
            (scaled / stride - 1) * stride
        };
        snapped.max(stride) as u32
    };

    let resized_w = snap(width);
    let resized_h = snap(height);

    WorkingSize {
        width: resized_w,
        height: resized_h,
        ratio_h: resized_h as f64 / height.max(1) as f64,
        ratio_w: resized_w as f64 / width.max(1) as f64,
    }
}

/// Resize an image to its detector working size
pub fn resize_to_working(image: &RgbImage, max_side_len: u32) -> (RgbImage, WorkingSize) {
    let size = working_size(image.width(), image.height(), max_side_len);
    let resized = if size.width == image.width() && size.height == image.height() {
        image.clone()
    } else {
        imageops::resize(image, size.width, size.height, FilterType::Triangle)
    };
    (resized, size)
}

/// Resize a text crop to the recognizer's fixed input size
pub fn resize_for_recognition(crop: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(crop, width, height, FilterType::Triangle)
}

/// Convert an RGB image into an NHWC float tensor `[1, H, W, 3]`
///
/// Pixel values are kept in the 0-255 range; both networks normalize internally.
pub fn to_nhwc_tensor(image: &RgbImage) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array4::zeros((1, h as usize, w as usize, 3));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = pixel[c] as f32;
        }
    }

    tensor
}
