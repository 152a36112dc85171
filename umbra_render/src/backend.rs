// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend contract for drawing and compositing surfaces.
//!
//! A backend owns the pixel-level work. It is handed a target surface, a
//! clip rectangle, and the operands of one primitive; it never sees the
//! element tree. The [`Context`](crate::Context) translates coordinates into
//! the target's pixel space before calling in, so every `clip`, `dest`, `x`,
//! and `y` below is in target pixels.
//!
//! The effect primitives have default implementations that log and fall
//! back to a plain [`blend`](RenderBackend::blend), so a minimal backend only
//! implements surface creation and the four core primitives.

use kurbo::{Rect, Vec2};
use umbra_core::color::Color;
use umbra_core::element::ShaderEffect;
use umbra_core::transform::Transform3d;

use crate::error::BackendError;

/// Pixel-level drawing and compositing primitives.
pub trait RenderBackend {
    /// An offscreen or onscreen pixel surface.
    type Surface;

    /// Allocates a transparent surface.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the size is unsupported or allocation
    /// fails.
    fn create_surface(&mut self, width: u32, height: u32) -> Result<Self::Surface, BackendError>;

    /// Returns the surface's `(width, height)` in pixels.
    fn surface_size(&self, surface: &Self::Surface) -> (u32, u32);

    /// Whether [`shader_effect`](Self::shader_effect) can run `effect`.
    ///
    /// Unsupported shaders still composite, unchanged.
    fn supports_shader(&mut self, effect: &ShaderEffect) -> bool {
        _ = effect;
        false
    }

    /// Replaces every pixel inside `clip` with `color`.
    fn clear(&mut self, target: &mut Self::Surface, clip: Rect, color: Color);

    /// Fills `rect`, mapped by `transform`, with `color`.
    ///
    /// A pixel is covered when its centre maps inside `rect`.
    fn fill_rect(
        &mut self,
        target: &mut Self::Surface,
        clip: Rect,
        transform: &Transform3d,
        rect: Rect,
        color: Color,
    );

    /// Copies premultiplied BGRA rows into `dest`, replacing the pixels
    /// there.
    fn blit(
        &mut self,
        target: &mut Self::Surface,
        clip: Rect,
        pixels: &[u8],
        stride: usize,
        dest: Rect,
    );

    /// Composites `src` with its top-left corner at `(x, y)`, scaled by
    /// `alpha`.
    fn blend(
        &mut self,
        target: &mut Self::Surface,
        clip: Rect,
        src: &Self::Surface,
        alpha: f32,
        x: f64,
        y: f64,
    );

    /// Like [`blend`](Self::blend), additionally scaled by the alpha channel
    /// of `mask`, which is placed at the same origin.
    fn blend_masked(
        &mut self,
        target: &mut Self::Surface,
        clip: Rect,
        src: &Self::Surface,
        mask: &Self::Surface,
        alpha: f32,
        x: f64,
        y: f64,
    ) {
        _ = mask;
        log::warn!("backend has no masked blend; compositing without the mask");
        self.blend(target, clip, src, alpha, x, y);
    }

    /// Composites `src`, whose top-left corner sits at `(x, y)` in its own
    /// plane, through the projective `matrix`.
    fn project(
        &mut self,
        target: &mut Self::Surface,
        clip: Rect,
        src: &Self::Surface,
        matrix: &Transform3d,
        alpha: f32,
        x: f64,
        y: f64,
    ) {
        if matrix.is_affine_2d() && matrix.is_axis_aligned() {
            let (tx, ty) = matrix.translation_2d();
            let scale = matrix.to_affine().as_coeffs();
            if scale[0] == 1.0 && scale[3] == 1.0 {
                self.blend(target, clip, src, alpha, x + tx, y + ty);
                return;
            }
        }
        log::warn!("backend cannot project surfaces; drawing the flattened content untransformed");
        self.blend(target, clip, src, alpha, x, y);
    }

    /// Composites a Gaussian blur of `src`.
    fn blur(
        &mut self,
        target: &mut Self::Surface,
        clip: Rect,
        src: &Self::Surface,
        radius: f64,
        x: f64,
        y: f64,
    ) {
        _ = radius;
        log::warn!("backend has no blur; compositing the unblurred content");
        self.blend(target, clip, src, 1.0, x, y);
    }

    /// Composites `src` over a blurred, tinted copy of its alpha displaced
    /// by `offset`.
    fn drop_shadow(
        &mut self,
        target: &mut Self::Surface,
        clip: Rect,
        src: &Self::Surface,
        offset: Vec2,
        radius: f64,
        color: Color,
        x: f64,
        y: f64,
    ) {
        _ = (offset, radius, color);
        log::warn!("backend has no drop shadow; compositing the content alone");
        self.blend(target, clip, src, 1.0, x, y);
    }

    /// Runs a pixel shader over `src` and composites the result.
    fn shader_effect(
        &mut self,
        target: &mut Self::Surface,
        clip: Rect,
        src: &Self::Surface,
        effect: &ShaderEffect,
        x: f64,
        y: f64,
    ) {
        _ = effect;
        log::warn!("backend has no shader support; compositing the content unchanged");
        self.blend(target, clip, src, 1.0, x, y);
    }
}
