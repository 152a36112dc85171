// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Minimal column-major 4×4 transform.
//!
//! Element render transforms, absolute transforms, and projections all use
//! [`Transform3d`]. Elements live on the `z = 0` plane, so mapping a point only
//! needs the 3×3 [`Homography`] obtained by dropping the z row and column.

use core::ops::Mul;

use kurbo::{Affine, Point, Rect};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

/// Tolerance used when classifying matrix entries as zero.
const EPSILON: f64 = 1e-9;

/// Homogeneous `w` below which a mapped point is treated as behind the
/// viewer.
const MIN_W: f64 = 1e-7;

/// Stand-in extent for rectangles that cross the projection's horizon.
const UNBOUNDED: Rect = Rect::new(-1.0e7, -1.0e7, 1.0e7, 1.0e7);

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* of the matrix, matching the memory layout
/// used by GPU APIs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Returns column `i` (0-based).
    ///
    /// # Panics
    ///
    /// Panics if `i >= 4`.
    #[inline]
    #[must_use]
    pub const fn col(self, i: usize) -> [f64; 4] {
        self.cols[i]
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Z axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_z(radians: f64) -> Self {
        let (s, c) = sin_cos(radians);
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the X axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_x(radians: f64) -> Self {
        let (s, c) = sin_cos(radians);
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, c, s, 0.0],
                [0.0, -s, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Y axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_y(radians: f64) -> Self {
        let (s, c) = sin_cos(radians);
        Self {
            cols: [
                [c, 0.0, -s, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [s, 0.0, c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a perspective transform with the viewer at distance `d` on
    /// the positive z axis.
    #[inline]
    #[must_use]
    pub fn from_perspective(d: f64) -> Self {
        let mut t = Self::IDENTITY;
        t.cols[2][3] = -1.0 / d;
        t
    }

    /// Embeds a 2-D affine transform.
    #[must_use]
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        Self {
            cols: [
                [a, b, 0.0, 0.0],
                [c, d, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [e, f, 0.0, 1.0],
            ],
        }
    }

    /// Returns the 2-D affine part, dropping z and perspective terms.
    #[must_use]
    pub fn to_affine(self) -> Affine {
        let c = &self.cols;
        Affine::new([c[0][0], c[0][1], c[1][0], c[1][1], c[3][0], c[3][1]])
    }

    /// Returns the translation column's x and y.
    #[inline]
    #[must_use]
    pub fn translation_2d(self) -> (f64, f64) {
        (self.cols[3][0], self.cols[3][1])
    }

    /// Is this transform [finite]?
    ///
    /// [finite]: f64::is_finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }

    /// Is any entry [NaN]?
    ///
    /// [NaN]: f64::is_nan
    #[must_use]
    pub fn is_nan(&self) -> bool {
        self.cols.iter().flatten().any(|v| v.is_nan())
    }

    /// Whether mapping the `z = 0` plane is a plain 2-D affine map (no
    /// perspective divide).
    #[must_use]
    pub fn is_affine_2d(&self) -> bool {
        let c = &self.cols;
        c[0][3].abs() < EPSILON && c[1][3].abs() < EPSILON && (c[3][3] - 1.0).abs() < EPSILON
    }

    /// Whether the transform maps axis-aligned rectangles on the `z = 0`
    /// plane to axis-aligned rectangles.
    ///
    /// True for translations, scales, and rotations by multiples of 90°;
    /// false for skews, arbitrary rotations, and perspective.
    #[must_use]
    pub fn is_axis_aligned(&self) -> bool {
        if !self.is_affine_2d() {
            return false;
        }
        let c = &self.cols;
        let straight = c[0][1].abs() < EPSILON && c[1][0].abs() < EPSILON;
        let quarter = c[0][0].abs() < EPSILON && c[1][1].abs() < EPSILON;
        straight || quarter
    }

    /// Returns the 3×3 map of the `z = 0` plane.
    #[must_use]
    pub fn homography(&self) -> Homography {
        let c = &self.cols;
        Homography {
            rows: [
                [c[0][0], c[1][0], c[3][0]],
                [c[0][1], c[1][1], c[3][1]],
                [c[0][3], c[1][3], c[3][3]],
            ],
        }
    }

    /// Maps a point on the `z = 0` plane, with perspective divide.
    ///
    /// Returns `None` when the point lands behind the viewer.
    #[inline]
    #[must_use]
    pub fn transform_point(&self, p: Point) -> Option<Point> {
        self.homography().map_point(p)
    }

    /// Bounding box of `rect` after mapping.
    ///
    /// Empty input yields [`Rect::ZERO`]. Rectangles crossing the horizon
    /// of a perspective transform yield a large finite stand-in.
    #[must_use]
    pub fn transform_rect_bbox(&self, rect: Rect) -> Rect {
        if crate::region::is_empty_rect(rect) {
            return Rect::ZERO;
        }
        if self.is_affine_2d() {
            return self.to_affine().transform_rect_bbox(rect);
        }
        self.homography().map_rect_bbox(rect)
    }
}

impl Default for Transform3d {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Affine> for Transform3d {
    fn from(affine: Affine) -> Self {
        Self::from_affine(affine)
    }
}

impl Mul for Transform3d {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        let a = &self.cols;
        let b = &rhs.cols;
        let mut out = [[0.0_f64; 4]; 4];
        let mut j = 0;
        while j < 4 {
            let mut i = 0;
            while i < 4 {
                out[j][i] =
                    a[0][i] * b[j][0] + a[1][i] * b[j][1] + a[2][i] * b[j][2] + a[3][i] * b[j][3];
                i += 1;
            }
            j += 1;
        }
        Self { cols: out }
    }
}

/// A row-major 3×3 projective map of the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    /// Rows of the matrix.
    pub rows: [[f64; 3]; 3],
}

impl Homography {
    /// The identity map.
    pub const IDENTITY: Self = Self {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Maps `p`, returning `None` behind the viewer.
    #[inline]
    #[must_use]
    pub fn map_point(&self, p: Point) -> Option<Point> {
        let m = &self.rows;
        let w = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if w < MIN_W {
            return None;
        }
        let x = m[0][0] * p.x + m[0][1] * p.y + m[0][2];
        let y = m[1][0] * p.x + m[1][1] * p.y + m[1][2];
        Some(Point::new(x / w, y / w))
    }

    /// Bounding box of the mapped corners of `rect`.
    #[must_use]
    pub fn map_rect_bbox(&self, rect: Rect) -> Rect {
        let corners = [
            Point::new(rect.x0, rect.y0),
            Point::new(rect.x1, rect.y0),
            Point::new(rect.x1, rect.y1),
            Point::new(rect.x0, rect.y1),
        ];
        let mut out: Option<Rect> = None;
        for c in corners {
            let Some(p) = self.map_point(c) else {
                return UNBOUNDED;
            };
            out = Some(match out {
                Some(r) => r.union_pt(p),
                None => Rect::from_points(p, p),
            });
        }
        out.unwrap_or(Rect::ZERO)
    }

    /// Returns the inverse map, or `None` if singular.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        let m = &self.rows;
        let c00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
        let c01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
        let c02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];
        let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Self {
            rows: [
                [
                    c00 * inv,
                    (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv,
                    (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv,
                ],
                [
                    c01 * inv,
                    (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv,
                    (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv,
                ],
                [
                    c02 * inv,
                    (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv,
                    (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv,
                ],
            ],
        })
    }

    /// Returns `self ∘ rhs` (apply `rhs` first).
    #[must_use]
    pub fn then_after(&self, rhs: &Self) -> Self {
        let a = &self.rows;
        let b = &rhs.rows;
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Self { rows }
    }
}

fn sin_cos(radians: f64) -> (f64, f64) {
    #[cfg(feature = "std")]
    {
        radians.sin_cos()
    }
    #[cfg(not(feature = "std"))]
    {
        (radians.sin(), radians.cos())
    }
}
