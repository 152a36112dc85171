// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Straight-alpha RGBA colour.

/// A colour with straight (non-premultiplied) alpha, each channel in `0..=1`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque red.
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    /// Opaque green.
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    /// Opaque blue.
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    /// Creates a colour from straight-alpha components.
    #[inline]
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque colour from 8-bit components.
    #[inline]
    #[must_use]
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            1.0,
        )
    }

    /// Returns the colour with its alpha multiplied by `alpha`.
    #[inline]
    #[must_use]
    pub fn with_alpha_factor(self, alpha: f32) -> Self {
        Self {
            a: self.a * alpha,
            ..self
        }
    }

    /// Returns premultiplied `[r, g, b, a]` components.
    #[inline]
    #[must_use]
    pub fn premultiplied(self) -> [f32; 4] {
        let a = self.a.clamp(0.0, 1.0);
        [self.r * a, self.g * a, self.b * a, a]
    }

    /// Returns the colour as premultiplied 8-bit `[b, g, r, a]`, the byte
    /// order used by image buffers.
    #[must_use]
    pub fn to_premul_bgra8(self) -> [u8; 4] {
        let [r, g, b, a] = self.premultiplied();
        [unit_to_u8(b), unit_to_u8(g), unit_to_u8(r), unit_to_u8(a)]
    }

    /// Whether the colour is fully opaque.
    #[inline]
    #[must_use]
    pub fn is_opaque(self) -> bool {
        self.a >= 1.0
    }
}

/// Converts a `0..=1` value to a rounded byte.
#[inline]
#[must_use]
pub fn unit_to_u8(v: f32) -> u8 {
    let scaled = v.clamp(0.0, 1.0) * 255.0 + 0.5;
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is clamped to 0..=255.5 before the cast"
    )]
    let byte = scaled as u8;
    byte
}
