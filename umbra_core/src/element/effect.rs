// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-to-intermediate element properties: effects and bitmap caching.

use alloc::sync::Arc;
use alloc::vec::Vec;

use kurbo::{Insets, Vec2};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::color::Color;

/// Largest blur extent, in pixels, on either side of a sample.
///
/// Backends never build kernels wider than this, so padding is clamped to
/// match.
pub const MAX_BLUR_EXTENT: f64 = 32.0;

/// Number of pixels a blur of `radius` spreads content on each side.
#[must_use]
pub fn blur_extent(radius: f64) -> f64 {
    if radius.is_finite() && radius > 0.0 {
        radius.ceil().min(MAX_BLUR_EXTENT)
    } else {
        0.0
    }
}

/// A compiled pixel shader plus its constant bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct ShaderEffect {
    /// ps_2_0 token stream.
    pub bytecode: Arc<[u32]>,
    /// Constant registers `c0..`, in register order.
    pub constants: Vec<[f32; 4]>,
    /// Constant register that receives `(1/w, 0, 0, 1/h)` for the input
    /// size, if the shader samples neighbours.
    pub ddx_uv_ddy_uv: Option<u32>,
    /// How far the shader's output may extend past its input.
    pub padding: Insets,
}

impl ShaderEffect {
    /// Creates an effect with no constants and no padding.
    #[must_use]
    pub fn new(bytecode: impl Into<Arc<[u32]>>) -> Self {
        Self {
            bytecode: bytecode.into(),
            constants: Vec::new(),
            ddx_uv_ddy_uv: None,
            padding: Insets::ZERO,
        }
    }
}

/// A post-processing effect applied to an element's composited subtree.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Gaussian blur with the given radius.
    Blur {
        /// Blur radius in pixels.
        radius: f64,
    },
    /// A blurred, tinted copy of the subtree's alpha drawn underneath it.
    DropShadow {
        /// Shadow displacement.
        offset: Vec2,
        /// Blur radius of the shadow.
        blur_radius: f64,
        /// Shadow colour; its alpha scales the shadow.
        color: Color,
    },
    /// A custom pixel shader.
    Shader(ShaderEffect),
}

impl Effect {
    /// How far the effect grows the element's bounds on each side.
    #[must_use]
    pub fn padding(&self) -> Insets {
        match self {
            Self::Blur { radius } => Insets::uniform(blur_extent(*radius)),
            Self::DropShadow {
                offset,
                blur_radius,
                ..
            } => {
                let e = blur_extent(*blur_radius);
                Insets::new(
                    (e - offset.x).max(0.0),
                    (e - offset.y).max(0.0),
                    (e + offset.x).max(0.0),
                    (e + offset.y).max(0.0),
                )
            }
            Self::Shader(shader) => shader.padding,
        }
    }
}

/// Whether an element's rendered subtree is kept in an offscreen bitmap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CacheMode {
    /// Draw directly into the parent target.
    #[default]
    None,
    /// Draw into an intermediate bitmap, then composite it.
    BitmapCache,
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;

    use super::*;

    #[test]
    fn blur_extent_is_clamped() {
        assert_eq!(blur_extent(0.0), 0.0);
        assert_eq!(blur_extent(-3.0), 0.0);
        assert_eq!(blur_extent(f64::NAN), 0.0);
        assert_eq!(blur_extent(2.2), 3.0);
        assert_eq!(blur_extent(500.0), MAX_BLUR_EXTENT);
    }

    #[test]
    fn drop_shadow_padding_follows_offset() {
        let effect = Effect::DropShadow {
            offset: Vec2::new(10.0, -4.0),
            blur_radius: 3.0,
            color: Color::BLACK,
        };
        let pad = effect.padding();
        assert_eq!(pad, Insets::new(0.0, 7.0, 13.0, 0.0));
        let grown = Rect::new(0.0, 0.0, 10.0, 10.0) + pad;
        assert_eq!(grown, Rect::new(0.0, -7.0, 23.0, 10.0));
    }

    #[test]
    fn shader_padding_is_explicit() {
        let mut shader = ShaderEffect::new(alloc::vec![0xFFFF_0200_u32, 0xFFFF]);
        shader.padding = Insets::uniform(2.0);
        assert_eq!(Effect::Shader(shader).padding(), Insets::uniform(2.0));
    }
}
