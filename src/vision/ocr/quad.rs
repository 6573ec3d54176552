// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Oriented quadrilateral text regions

use serde::{Deserialize, Serialize};

/// Four ordered corner points plus a detection score
///
/// Serialized flat as `x0, y0, ..., x3, y3, score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "QuadFields", into = "QuadFields")]
pub struct Quad {
    pub points: [[f64; 2]; 4],
    pub score: f64,
}

impl Quad {
    pub fn new(points: [[f64; 2]; 4], score: f64) -> Self {
        Self { points, score }
    }

    /// Axis-aligned rectangle, clockwise from top-left
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64, score: f64) -> Self {
        Self::new(
            [
                [x, y],
                [x + width, y],
                [x + width, y + height],
                [x, y + height],
            ],
            score,
        )
    }

    /// Euclidean distance between two corners
    pub fn edge_len(&self, from: usize, to: usize) -> f64 {
        let [ax, ay] = self.points[from % 4];
        let [bx, by] = self.points[to % 4];
        (ax - bx).hypot(ay - by)
    }

    /// Shorter of the (p0,p1) and (p3,p0) edges
    pub fn min_leading_edge(&self) -> f64 {
        self.edge_len(0, 1).min(self.edge_len(3, 0))
    }

    /// Multiply x by `sx` and y by `sy`
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            points: self.points.map(|[x, y]| [x * sx, y * sy]),
            score: self.score,
        }
    }

    /// Map working-image coordinates back to the original image
    pub fn to_original(&self, ratio_h: f64, ratio_w: f64) -> Self {
        Self {
            points: self.points.map(|[x, y]| [x / ratio_w, y / ratio_h]),
            score: self.score,
        }
    }

    /// Map original-image coordinates into the working image
    pub fn to_working(&self, ratio_h: f64, ratio_w: f64) -> Self {
        self.scaled(ratio_w, ratio_h)
    }

    /// Canonical corner order
    ///
    /// Starts at the corner with the smallest `x + y` (top-left). If the first
    /// edge runs more vertically than horizontally the traversal direction is
    /// flipped, so p0→p1 always follows the text baseline direction.
    pub fn canonicalize(&self) -> Self {
        let p = &self.points;
        let start = (0..4)
            .min_by(|&a, &b| (p[a][0] + p[a][1]).total_cmp(&(p[b][0] + p[b][1])))
            .unwrap_or(0);
        let rotated: [[f64; 2]; 4] = std::array::from_fn(|i| p[(start + i) % 4]);

        let dx = (rotated[0][0] - rotated[1][0]).abs();
        let dy = (rotated[0][1] - rotated[1][1]).abs();
        let points = if dx > dy {
            rotated
        } else {
            [rotated[0], rotated[3], rotated[2], rotated[1]]
        };

        Self {
            points,
            score: self.score,
        }
    }

    pub fn xs(&self) -> [f64; 4] {
        self.points.map(|[x, _]| x)
    }

    pub fn ys(&self) -> [f64; 4] {
        self.points.map(|[_, y]| y)
    }

    pub fn is_finite(&self) -> bool {
        self.score.is_finite() && self.points.iter().flatten().all(|v| v.is_finite())
    }
}

#[derive(Serialize, Deserialize)]
struct QuadFields {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    x3: f64,
    y3: f64,
    score: f64,
}

impl From<Quad> for QuadFields {
    fn from(q: Quad) -> Self {
        let [[x0, y0], [x1, y1], [x2, y2], [x3, y3]] = q.points;
        Self {
            x0,
            y0,
            x1,
            y1,
            x2,
            y2,
            x3,
            y3,
            score: q.score,
        }
    }
}

impl From<QuadFields> for Quad {
    fn from(f: QuadFields) -> Self {
        Quad::new(
            [[f.x0, f.y0], [f.x1, f.y1], [f.x2, f.y2], [f.x3, f.y3]],
            f.score,
        )
    }
}
