// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! EAST text detector
//!
//! The network maps an NHWC image `[1, H, W, 3]` to a score map
//! `[1, H/4, W/4, 1]` and a rotated-box geometry map `[1, H/4, W/4, 5]`
//! (distances to the top, right, bottom and left edges, then the angle).
//!
//! Decoding:
//! 1. Keep cells scoring above `score_thresh`, in row-major order
//! 2. Restore one rotated rectangle per cell
//! 3. Merge consecutive overlapping boxes, weighting corners by score
//! 4. Standard polygon NMS
//! 5. Re-score each box by the mean score map value it covers and drop
//!    boxes at or below `box_thresh`

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use geo::{Area, BooleanOps, Coord, Intersects, LineString, Point, Polygon};
use image::RgbImage;
use ndarray::{Array2, Array3, ArrayViewD, IxDyn};
use ort::session::Session;
use ort::value::Value;
use tracing::debug;

use super::check_arity;
use crate::vision::errors::{DetectionError, ModelLoadError};
use crate::vision::model_cache::ModelKind;
use crate::vision::ocr::capability::{DecodedBoxes, FeatureMaps, TextDetector};
use crate::vision::ocr::preprocessing::to_nhwc_tensor;
use crate::vision::ocr::Quad;

/// Feature maps are a quarter of the working resolution
pub const MAP_STRIDE: f64 = 4.0;

/// Geometry channels: four edge distances plus angle
pub const GEOMETRY_CHANNELS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EastConfig {
    pub score_thresh: f32,
    pub box_thresh: f32,
    pub nms_thresh: f64,
}

impl Default for EastConfig {
    fn default() -> Self {
        Self {
            score_thresh: 0.8,
            box_thresh: 0.1,
            nms_thresh: 0.2,
        }
    }
}

pub struct EastDetector {
    session: Mutex<Session>,
    input_name: String,
    config: EastConfig,
}

impl std::fmt::Debug for EastDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EastDetector")
            .field("input_name", &self.input_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EastDetector {
    /// Wrap a restored session, checking it has the two EAST outputs
    pub fn from_session(
        session: Session,
        model_path: &Path,
        config: EastConfig,
    ) -> Result<Self, ModelLoadError> {
        let input_name = check_arity(&session, ModelKind::Detector, model_path, 2)?;
        Ok(Self {
            session: Mutex::new(session),
            input_name,
            config,
        })
    }
}

impl TextDetector for EastDetector {
    fn forward(&self, working_image: &RgbImage) -> Result<FeatureMaps, DetectionError> {
        let input = Value::from_array(to_nhwc_tensor(working_image))
            .map_err(|e| DetectionError::Inference(format!("input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectionError::Inference("detector session poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input])
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let first = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectionError::Inference(e.to_string()))?;
        let second = outputs[1]
            .try_extract_array::<f32>()
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        // Output order varies between exports; the geometry map has 5 channels
        let (score, geometry) = if first.shape().last() == Some(&GEOMETRY_CHANNELS) {
            (second, first)
        } else {
            (first, second)
        };

        Ok(FeatureMaps {
            score: score_map(&score)?,
            geometry: geometry_map(&geometry)?,
        })
    }

    fn decode(&self, maps: &FeatureMaps) -> Result<DecodedBoxes, DetectionError> {
        decode_maps(maps, &self.config)
    }
}

fn score_map(view: &ArrayViewD<f32>) -> Result<Array2<f32>, DetectionError> {
    match view.shape() {
        &[1, h, w, 1] => Ok(Array2::from_shape_fn((h, w), |(r, c)| {
            view[IxDyn(&[0, r, c, 0])]
        })),
        shape => Err(DetectionError::Inference(format!(
            "unexpected score map shape {:?}",
            shape
        ))),
    }
}

fn geometry_map(view: &ArrayViewD<f32>) -> Result<Array3<f32>, DetectionError> {
    match view.shape() {
        &[1, h, w, GEOMETRY_CHANNELS] => Ok(Array3::from_shape_fn(
            (h, w, GEOMETRY_CHANNELS),
            |(r, c, k)| view[IxDyn(&[0, r, c, k])],
        )),
        shape => Err(DetectionError::Inference(format!(
            "unexpected geometry map shape {:?}",
            shape
        ))),
    }
}

/// Decode EAST feature maps into working-space quads
pub fn decode_maps(
    maps: &FeatureMaps,
    config: &EastConfig,
) -> Result<DecodedBoxes, DetectionError> {
    let (rows, cols) = maps.score.dim();
    let (g_rows, g_cols, channels) = maps.geometry.dim();
    if (g_rows, g_cols) != (rows, cols) || channels != GEOMETRY_CHANNELS {
        return Err(DetectionError::Decode(format!(
            "score map {}x{} does not match geometry map {}x{}x{}",
            rows, cols, g_rows, g_cols, channels
        )));
    }

    let restore_start = Instant::now();
    let mut candidates = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let score = maps.score[[r, c]];
            if score > config.score_thresh {
                let geo = [
                    maps.geometry[[r, c, 0]],
                    maps.geometry[[r, c, 1]],
                    maps.geometry[[r, c, 2]],
                    maps.geometry[[r, c, 3]],
                    maps.geometry[[r, c, 4]],
                ];
                candidates.push(restore_rbox(c, r, geo, score as f64));
            }
        }
    }
    let restore = restore_start.elapsed();

    if candidates.is_empty() {
        return Ok(DecodedBoxes {
            quads: Vec::new(),
            restore,
        });
    }
    debug!("{} text cells above threshold", candidates.len());

    let merged = merge_adjacent(candidates, config.nms_thresh);
    let kept = standard_nms(merged, config.nms_thresh);

    let quads = kept
        .into_iter()
        .filter_map(|quad| {
            let mean = mean_score_inside(&maps.score, &quad);
            (mean > config.box_thresh as f64).then(|| Quad::new(quad.points, mean))
        })
        .collect();

    Ok(DecodedBoxes { quads, restore })
}

/// Rotated rectangle for the cell at (col, row)
///
/// Corners are `[tl, tr, br, bl]` around the cell origin scaled back to the
/// working image.
pub fn restore_rbox(col: usize, row: usize, geo: [f32; 5], score: f64) -> Quad {
    let [top, right, bottom, left, angle] = geo.map(|v| v as f64);
    let (ox, oy) = (col as f64 * MAP_STRIDE, row as f64 * MAP_STRIDE);
    let (sin, cos) = angle.sin_cos();

    let rotate = |vx: f64, vy: f64| [ox + cos * vx + sin * vy, oy - sin * vx + cos * vy];

    Quad::new(
        [
            rotate(-left, -top),
            rotate(right, -top),
            rotate(right, bottom),
            rotate(-left, bottom),
        ],
        score,
    )
}

fn to_polygon(quad: &Quad) -> Polygon<f64> {
    Polygon::new(
        LineString::from(quad.points.iter().map(|&[x, y]| (x, y)).collect::<Vec<_>>()),
        vec![],
    )
}

/// Intersection over union of two quads
pub fn quad_iou(a: &Quad, b: &Quad) -> f64 {
    let (pa, pb) = (to_polygon(a), to_polygon(b));
    let (area_a, area_b) = (pa.unsigned_area(), pb.unsigned_area());
    if area_a <= f64::EPSILON || area_b <= f64::EPSILON {
        return 0.0;
    }
    let inter = pa.intersection(&pb).unsigned_area();
    let union = area_a + area_b - inter;
    if union <= f64::EPSILON {
        0.0
    } else {
        inter / union
    }
}

/// Score-weighted running merge of a box into an accumulated box
struct Merger {
    weighted: [[f64; 2]; 4],
    score: f64,
}

impl Merger {
    fn start(quad: &Quad) -> Self {
        Self {
            weighted: quad.points.map(|[x, y]| [x * quad.score, y * quad.score]),
            score: quad.score,
        }
    }

    fn add(&mut self, quad: &Quad) {
        for (acc, [x, y]) in self.weighted.iter_mut().zip(quad.points) {
            acc[0] += x * quad.score;
            acc[1] += y * quad.score;
        }
        self.score += quad.score;
    }

    fn finish(&self) -> Quad {
        if self.score <= 0.0 {
            return Quad::new(self.weighted, self.score);
        }
        Quad::new(
            self.weighted.map(|[x, y]| [x / self.score, y / self.score]),
            self.score,
        )
    }
}

/// Locality-aware merge: consecutive boxes overlapping the running box fuse
fn merge_adjacent(quads: Vec<Quad>, thresh: f64) -> Vec<Quad> {
    let mut merged = Vec::new();
    let mut current: Option<Merger> = None;

    for quad in &quads {
        if let Some(acc) = current.as_mut() {
            if quad_iou(&acc.finish(), quad) > thresh {
                acc.add(quad);
                continue;
            }
        }
        if let Some(done) = current.take() {
            merged.push(done.finish());
        }
        current = Some(Merger::start(quad));
    }
    if let Some(done) = current {
        merged.push(done.finish());
    }
    merged
}

/// Greedy NMS, highest score first
fn standard_nms(mut quads: Vec<Quad>, thresh: f64) -> Vec<Quad> {
    quads.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Quad> = Vec::new();
    for quad in quads {
        if kept.iter().all(|k| quad_iou(k, &quad) <= thresh) {
            kept.push(quad);
        }
    }
    kept
}

/// Mean score-map value over the cells covered by `quad` (working coordinates)
fn mean_score_inside(score: &Array2<f32>, quad: &Quad) -> f64 {
    let (rows, cols) = score.dim();
    let scaled = quad.scaled(1.0 / MAP_STRIDE, 1.0 / MAP_STRIDE);
    let polygon = Polygon::new(
        LineString::from(
            scaled
                .points
                .iter()
                .map(|&[x, y]| Coord { x: x.trunc(), y: y.trunc() })
                .collect::<Vec<_>>(),
        ),
        vec![],
    );

    let xs = scaled.xs();
    let ys = scaled.ys();
    let clamp = |v: f64, max: usize| v.max(0.0).min(max.saturating_sub(1) as f64) as usize;
    let (c0, c1) = (
        clamp(xs.iter().copied().fold(f64::INFINITY, f64::min), cols),
        clamp(xs.iter().copied().fold(f64::NEG_INFINITY, f64::max), cols),
    );
    let (r0, r1) = (
        clamp(ys.iter().copied().fold(f64::INFINITY, f64::min), rows),
        clamp(ys.iter().copied().fold(f64::NEG_INFINITY, f64::max), rows),
    );

    let mut sum = 0.0;
    let mut count = 0usize;
    for r in r0..=r1 {
        for c in c0..=c1 {
            if polygon.intersects(&Point::new(c as f64, r as f64)) {
                sum += score[[r, c]] as f64;
                count += 1;
            }
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
