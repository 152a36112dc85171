// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Premultiplied BGRA pixel buffers.

use umbra_core::color::{Color, unit_to_u8};

use crate::error::BackendError;

/// Bytes per pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// An 8-bit premultiplied BGRA image with an explicit row stride.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl core::fmt::Debug for Image {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish_non_exhaustive()
    }
}

impl Image {
    /// Allocates a transparent image.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::EmptySurface`] for a zero dimension and
    /// [`BackendError::OutOfMemory`] when the buffer cannot be allocated.
    pub fn new(width: u32, height: u32) -> Result<Self, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::EmptySurface);
        }
        let stride = (width as usize)
            .checked_mul(BYTES_PER_PIXEL)
            .ok_or(BackendError::OutOfMemory)?;
        let len = stride
            .checked_mul(height as usize)
            .ok_or(BackendError::OutOfMemory)?;
        let data = try_zeroed(len).ok_or(BackendError::OutOfMemory)?;
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Wraps existing BGRA bytes.
    ///
    /// Returns `None` when `data` is too short for `height` rows of
    /// `stride` bytes or `stride` cannot hold a row.
    #[must_use]
    pub fn from_bgra(width: u32, height: u32, stride: usize, data: Vec<u8>) -> Option<Self> {
        let row = (width as usize).checked_mul(BYTES_PER_PIXEL)?;
        if width == 0 || height == 0 || stride < row {
            return None;
        }
        let needed = stride.checked_mul(height as usize - 1)?.checked_add(row)?;
        (data.len() >= needed).then_some(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Width in pixels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the starts of consecutive rows.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Raw bytes, mutably.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.stride + x as usize * BYTES_PER_PIXEL
    }

    /// Returns the `[b, g, r, a]` bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the pixel is out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} image",
            self.width,
            self.height
        );
        let o = self.offset(x, y);
        [
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ]
    }

    /// Overwrites the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the pixel is out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, bgra: [u8; 4]) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) outside {}x{} image",
            self.width,
            self.height
        );
        let o = self.offset(x, y);
        self.data[o..o + BYTES_PER_PIXEL].copy_from_slice(&bgra);
    }

    /// Returns the pixel at `(x, y)` as premultiplied `[r, g, b, a]` floats.
    #[must_use]
    pub fn pixel_f32(&self, x: u32, y: u32) -> [f32; 4] {
        let [b, g, r, a] = self.pixel(x, y);
        [
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        ]
    }

    /// Composites a premultiplied `[r, g, b, a]` colour over the pixel at
    /// `(x, y)`.
    pub(crate) fn blend_pixel(&mut self, x: u32, y: u32, src: [f32; 4]) {
        let o = self.offset(x, y);
        let px = &mut self.data[o..o + BYTES_PER_PIXEL];
        let inv = 1.0 - src[3].clamp(0.0, 1.0);
        // Byte order is b, g, r, a.
        let order = [2, 1, 0, 3];
        for (byte, &channel) in px.iter_mut().zip(&order) {
            let dst = f32::from(*byte) / 255.0;
            *byte = unit_to_u8(src[channel] + dst * inv);
        }
    }

    /// Sets every pixel to `color`.
    pub fn fill(&mut self, color: Color) {
        let bgra = color.to_premul_bgra8();
        for y in 0..self.height {
            for x in 0..self.width {
                self.set_pixel(x, y, bgra);
            }
        }
    }

    /// Sum of the alpha channel in `0..=1` units.
    #[must_use]
    pub fn total_alpha(&self) -> f64 {
        let mut sum = 0.0;
        for y in 0..self.height {
            for x in 0..self.width {
                sum += f64::from(self.pixel(x, y)[3]) / 255.0;
            }
        }
        sum
    }
}

/// Allocates `len` zeroed bytes, returning `None` instead of aborting.
fn try_zeroed(len: usize) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).ok()?;
    data.resize(len, 0);
    Some(data)
}
