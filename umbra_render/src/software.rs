// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CPU reference backend over [`Image`] buffers.

use std::sync::Arc;

use hashbrown::HashMap;
use kurbo::{Point, Rect, Vec2};
use umbra_core::color::Color;
use umbra_core::element::ShaderEffect;
use umbra_core::transform::Transform3d;

use crate::backend::RenderBackend;
use crate::blur::{Pixels, gaussian_blur};
use crate::error::BackendError;
use crate::image::{BYTES_PER_PIXEL, Image};
use crate::shader::{Interpreter, Program, parse};

/// Software backend configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SoftwareConfig {
    /// Largest width or height of a surface, in pixels.
    pub max_surface_size: u32,
}

impl SoftwareConfig {
    /// 8192 pixels on a side.
    pub const DEFAULT: Self = Self {
        max_surface_size: 8192,
    };
}

impl Default for SoftwareConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A [`RenderBackend`] that composites premultiplied BGRA [`Image`]s on the
/// CPU.
///
/// Shader programs are parsed once per distinct token stream and cached;
/// streams that fail to parse are remembered too, so their warning is
/// logged once.
pub struct SoftwareBackend {
    config: SoftwareConfig,
    programs: HashMap<Arc<[u32]>, Option<Program>>,
}

impl core::fmt::Debug for SoftwareBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SoftwareBackend")
            .field("config", &self.config)
            .field("programs", &self.programs.len())
            .finish()
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new(SoftwareConfig::DEFAULT)
    }
}

impl SoftwareBackend {
    /// Creates a backend with the given limits.
    #[must_use]
    pub fn new(config: SoftwareConfig) -> Self {
        Self {
            config,
            programs: HashMap::new(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> SoftwareConfig {
        self.config
    }

    fn program(&mut self, bytecode: &Arc<[u32]>) -> Option<&Program> {
        self.programs
            .entry(Arc::clone(bytecode))
            .or_insert_with(|| match parse(bytecode) {
                Ok(program) => Some(program),
                Err(e) => {
                    log::warn!("unsupported shader effect ({e}); rendering its input unchanged");
                    None
                }
            })
            .as_ref()
    }
}

impl RenderBackend for SoftwareBackend {
    type Surface = Image;

    fn create_surface(&mut self, width: u32, height: u32) -> Result<Image, BackendError> {
        let max = self.config.max_surface_size;
        if width > max || height > max {
            return Err(BackendError::SurfaceTooLarge { width, height, max });
        }
        Image::new(width, height)
    }

    fn surface_size(&self, surface: &Image) -> (u32, u32) {
        (surface.width(), surface.height())
    }

    fn supports_shader(&mut self, effect: &ShaderEffect) -> bool {
        self.program(&effect.bytecode).is_some()
    }

    fn clear(&mut self, target: &mut Image, clip: Rect, color: Color) {
        let Some((x0, y0, x1, y1)) = pixel_span(clip, target) else {
            return;
        };
        let bgra = color.to_premul_bgra8();
        for y in y0..y1 {
            for x in x0..x1 {
                target.set_pixel(x, y, bgra);
            }
        }
    }

    fn fill_rect(
        &mut self,
        target: &mut Image,
        clip: Rect,
        transform: &Transform3d,
        rect: Rect,
        color: Color,
    ) {
        let bbox = transform.transform_rect_bbox(rect);
        let Some((x0, y0, x1, y1)) = pixel_span(clip.intersect(bbox), target) else {
            return;
        };
        let premul = color.premultiplied();
        if transform.is_affine_2d() && transform.is_axis_aligned() {
            for y in y0..y1 {
                for x in x0..x1 {
                    target.blend_pixel(x, y, premul);
                }
            }
            return;
        }
        let Some(inverse) = transform.homography().inverse() else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let centre = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                let Some(p) = inverse.map_point(centre) else {
                    continue;
                };
                if p.x >= rect.x0 && p.x < rect.x1 && p.y >= rect.y0 && p.y < rect.y1 {
                    target.blend_pixel(x, y, premul);
                }
            }
        }
    }

    fn blit(&mut self, target: &mut Image, clip: Rect, pixels: &[u8], stride: usize, dest: Rect) {
        let dest = dest.round();
        let Some((x0, y0, x1, y1)) = pixel_span(clip.intersect(dest), target) else {
            return;
        };
        let (dx, dy) = (to_i64(dest.x0), to_i64(dest.y0));
        for y in y0..y1 {
            for x in x0..x1 {
                let sx = usize_from(i64::from(x) - dx);
                let sy = usize_from(i64::from(y) - dy);
                let o = sy * stride + sx * BYTES_PER_PIXEL;
                if let Some(px) = pixels.get(o..o + BYTES_PER_PIXEL) {
                    target.set_pixel(x, y, [px[0], px[1], px[2], px[3]]);
                }
            }
        }
    }

    fn blend(&mut self, target: &mut Image, clip: Rect, src: &Image, alpha: f32, x: f64, y: f64) {
        composite(target, clip, &Pixels::from_image(src), alpha, x, y, None);
    }

    fn blend_masked(
        &mut self,
        target: &mut Image,
        clip: Rect,
        src: &Image,
        mask: &Image,
        alpha: f32,
        x: f64,
        y: f64,
    ) {
        composite(target, clip, &Pixels::from_image(src), alpha, x, y, Some(mask));
    }

    fn project(
        &mut self,
        target: &mut Image,
        clip: Rect,
        src: &Image,
        matrix: &Transform3d,
        alpha: f32,
        x: f64,
        y: f64,
    ) {
        let h = matrix.homography();
        let Some(inverse) = h.inverse() else {
            return;
        };
        let plane = Rect::new(
            x,
            y,
            x + f64::from(src.width()),
            y + f64::from(src.height()),
        );
        let Some((x0, y0, x1, y1)) = pixel_span(clip.intersect(h.map_rect_bbox(plane)), target)
        else {
            return;
        };
        for ty in y0..y1 {
            for tx in x0..x1 {
                let centre = Point::new(f64::from(tx) + 0.5, f64::from(ty) + 0.5);
                let Some(p) = inverse.map_point(centre) else {
                    continue;
                };
                let (sx, sy) = ((p.x - x).floor(), (p.y - y).floor());
                if sx < 0.0
                    || sy < 0.0
                    || sx >= f64::from(src.width())
                    || sy >= f64::from(src.height())
                {
                    continue;
                }
                let s = src.pixel_f32(to_u32(sx), to_u32(sy));
                target.blend_pixel(tx, ty, s.map(|c| c * alpha));
            }
        }
    }

    fn blur(&mut self, target: &mut Image, clip: Rect, src: &Image, radius: f64, x: f64, y: f64) {
        let blurred = gaussian_blur(&Pixels::from_image(src), radius);
        composite(target, clip, &blurred, 1.0, x, y, None);
    }

    fn drop_shadow(
        &mut self,
        target: &mut Image,
        clip: Rect,
        src: &Image,
        offset: Vec2,
        radius: f64,
        color: Color,
        x: f64,
        y: f64,
    ) {
        let img = Pixels::from_image(src);
        let mut alpha = Pixels::new(img.width, img.height);
        for (a, px) in alpha.data.iter_mut().zip(&img.data) {
            a[3] = px[3];
        }
        let shadow = gaussian_blur(&alpha, radius);
        let (dx, dy) = (to_isize(offset.x), to_isize(offset.y));
        let tint = color.premultiplied();

        let mut out = Pixels::new(img.width, img.height);
        for yy in 0..img.height {
            for xx in 0..img.width {
                let s = shadow.get_or_clear(xx as isize - dx, yy as isize - dy)[3];
                let p = img.get(xx, yy);
                let under = (1.0 - p[3]) * s;
                out.data[yy * img.width + xx] = [
                    p[0] + under * tint[0],
                    p[1] + under * tint[1],
                    p[2] + under * tint[2],
                    p[3] + under * tint[3],
                ];
            }
        }
        composite(target, clip, &out, 1.0, x, y, None);
    }

    fn shader_effect(
        &mut self,
        target: &mut Image,
        clip: Rect,
        src: &Image,
        effect: &ShaderEffect,
        x: f64,
        y: f64,
    ) {
        let input = Pixels::from_image(src);
        let Some(program) = self.program(&effect.bytecode) else {
            composite(target, clip, &input, 1.0, x, y, None);
            return;
        };
        let mut interp = Interpreter::new(program, &effect.constants);
        if let Some(reg) = effect.ddx_uv_ddy_uv {
            let (w, h) = (src.width(), src.height());
            #[expect(
                clippy::cast_possible_truncation,
                reason = "reciprocal sizes only need f32 precision"
            )]
            let (iw, ih) = ((1.0 / f64::from(w)) as f32, (1.0 / f64::from(h)) as f32);
            interp.set_constant(reg, [iw, 0.0, 0.0, ih]);
        }
        let output = interp.apply(&input);
        composite(target, clip, &output, 1.0, x, y, None);
    }
}

/// Source-over of `src` at `(x, y)` rounded to whole pixels, scaled by
/// `alpha` and, when given, by the alpha of `mask` at the same position.
fn composite(
    target: &mut Image,
    clip: Rect,
    src: &Pixels,
    alpha: f32,
    x: f64,
    y: f64,
    mask: Option<&Image>,
) {
    let (ox, oy) = (x.round(), y.round());
    let area = Rect::new(ox, oy, ox + src.width as f64, oy + src.height as f64);
    let Some((x0, y0, x1, y1)) = pixel_span(clip.intersect(area), target) else {
        return;
    };
    let (ox, oy) = (to_i64(ox), to_i64(oy));
    for ty in y0..y1 {
        for tx in x0..x1 {
            let sx = usize_from(i64::from(tx) - ox);
            let sy = usize_from(i64::from(ty) - oy);
            let mut k = alpha;
            if let Some(mask) = mask {
                k *= match (u32::try_from(sx), u32::try_from(sy)) {
                    (Ok(mx), Ok(my)) if mx < mask.width() && my < mask.height() => {
                        f32::from(mask.pixel(mx, my)[3]) / 255.0
                    }
                    _ => 0.0,
                };
            }
            let s = src.get(sx, sy);
            target.blend_pixel(tx, ty, s.map(|c| c * k));
        }
    }
}

/// Pixels whose centres fall inside `r`, limited to the image.
fn pixel_span(r: Rect, img: &Image) -> Option<(u32, u32, u32, u32)> {
    let x0 = (r.x0 - 0.5).ceil().max(0.0);
    let y0 = (r.y0 - 0.5).ceil().max(0.0);
    let x1 = (r.x1 - 0.5).ceil().min(f64::from(img.width()));
    let y1 = (r.y1 - 0.5).ceil().min(f64::from(img.height()));
    if !(x0 < x1 && y0 < y1) {
        return None;
    }
    Some((to_u32(x0), to_u32(y0), to_u32(x1), to_u32(y1)))
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "callers pass values already clamped into a surface"
)]
fn to_u32(v: f64) -> u32 {
    v as u32
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "pixel coordinates are far below i64::MAX"
)]
fn to_i64(v: f64) -> i64 {
    v as i64
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "shadow offsets are rounded to whole pixels"
)]
fn to_isize(v: f64) -> isize {
    v.round() as isize
}

fn usize_from(v: i64) -> usize {
    usize::try_from(v).unwrap_or(0)
}
