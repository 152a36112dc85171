// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clip geometry for elements.

use kurbo::{Rect, Shape};

/// A shape, in the element's local coordinates, that clips the element's
/// content and descendants.
///
/// Exact clip-path intersection is left to the renderer; the tree only ever
/// needs the clip's bounding box (for bounds, culling, and hit testing).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClipShape {
    /// An axis-aligned rectangle.
    Rect(Rect),
    /// A rectangle with rounded corners.
    RoundedRect(kurbo::RoundedRect),
}

impl ClipShape {
    /// Bounding box of the clip in local coordinates.
    #[must_use]
    pub fn bounding_box(&self) -> Rect {
        match self {
            Self::Rect(r) => r.abs(),
            Self::RoundedRect(rr) => rr.bounding_box(),
        }
    }

    /// Whether a local-space point lies inside the clip.
    #[must_use]
    pub fn contains(&self, p: kurbo::Point) -> bool {
        match self {
            Self::Rect(r) => r.abs().contains(p),
            Self::RoundedRect(rr) => rr.contains(p),
        }
    }
}

impl From<Rect> for ClipShape {
    fn from(r: Rect) -> Self {
        Self::Rect(r)
    }
}
