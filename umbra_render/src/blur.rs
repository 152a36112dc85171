// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Separable Gaussian blur over float pixel buffers.

use umbra_core::element::blur_extent;

use crate::image::Image;

/// Smallest normalized tap weight kept at the kernel's tails.
const PRECISION: f32 = 1.0 / 256.0;

/// A premultiplied `[r, g, b, a]` float buffer used as effect scratch space.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Pixels {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) data: Vec<[f32; 4]>,
}

impl Pixels {
    pub(crate) fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![[0.0; 4]; width * height],
        }
    }

    pub(crate) fn from_image(img: &Image) -> Self {
        let (w, h) = (img.width(), img.height());
        let mut data = Vec::with_capacity(w as usize * h as usize);
        for y in 0..h {
            for x in 0..w {
                data.push(img.pixel_f32(x, y));
            }
        }
        Self {
            width: w as usize,
            height: h as usize,
            data,
        }
    }

    #[inline]
    pub(crate) fn get(&self, x: usize, y: usize) -> [f32; 4] {
        self.data[y * self.width + x]
    }

    /// Samples with coordinates clamped to the edge.
    #[inline]
    pub(crate) fn get_clamped(&self, x: isize, y: isize) -> [f32; 4] {
        let cx = x.clamp(0, self.width as isize - 1) as usize;
        let cy = y.clamp(0, self.height as isize - 1) as usize;
        self.get(cx, cy)
    }

    /// Samples, returning transparent black outside the buffer.
    #[inline]
    pub(crate) fn get_or_clear(&self, x: isize, y: isize) -> [f32; 4] {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            [0.0; 4]
        } else {
            self.get(x as usize, y as usize)
        }
    }
}

/// Normalized Gaussian weights for `radius`, `2 * half + 1` taps long.
///
/// Sigma is a third of the radius and the kernel never reaches past
/// [`blur_extent`]. Returns a single unit tap when the radius blurs
/// nothing.
pub(crate) fn gaussian_kernel(radius: f64) -> Vec<f32> {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "blur_extent is clamped to MAX_BLUR_EXTENT"
    )]
    let mut half = blur_extent(radius) as usize;
    if half == 0 {
        return vec![1.0];
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "a blur sigma needs no more than f32 precision"
    )]
    let sigma = (radius.min(f64::from(u16::MAX)) / 3.0) as f32;
    let denom = 2.0 * sigma * sigma;
    let mut weights = Vec::with_capacity(half * 2 + 1);
    for i in 0..=half * 2 {
        let x = i as f32 - half as f32;
        weights.push((-x * x / denom).exp());
    }
    normalize(&mut weights);

    // Trim tails that would not change an 8-bit result.
    while half > 0 && weights[0] < PRECISION {
        weights.pop();
        weights.remove(0);
        half -= 1;
    }
    normalize(&mut weights);
    weights
}

fn normalize(weights: &mut [f32]) {
    let sum: f32 = weights.iter().sum();
    if sum > 0.0 {
        for w in weights {
            *w /= sum;
        }
    }
}

/// Blurs `src` horizontally then vertically, clamping samples to the edge.
pub(crate) fn gaussian_blur(src: &Pixels, radius: f64) -> Pixels {
    let kernel = gaussian_kernel(radius);
    if kernel.len() == 1 {
        return src.clone();
    }
    let half = (kernel.len() / 2) as isize;
    let (w, h) = (src.width, src.height);

    let mut temp = Pixels::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0_f32; 4];
            for (i, weight) in kernel.iter().enumerate() {
                let s = src.get_clamped(x as isize + i as isize - half, y as isize);
                for (a, v) in acc.iter_mut().zip(s) {
                    *a += v * weight;
                }
            }
            temp.data[y * w + x] = acc;
        }
    }

    let mut out = Pixels::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0_f32; 4];
            for (i, weight) in kernel.iter().enumerate() {
                let s = temp.get_clamped(x as isize, y as isize + i as isize - half);
                for (a, v) in acc.iter_mut().zip(s) {
                    *a += v * weight;
                }
            }
            out.data[y * w + x] = acc;
        }
    }
    out
}
