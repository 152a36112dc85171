// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Regions: sets of non-overlapping axis-aligned rectangles.
//!
//! A [`Region`] is used both for accumulated surface damage ("what must be
//! repainted") and for occlusion tracking during render-list construction
//! ("what is still undetermined"). Rectangles in a region never overlap, so
//! [`Region::area`] is exact and enumeration visits every covered point once.
//!
//! Subtraction splits a rectangle into at most four pieces in a fixed order:
//! the band above the hole, the band below it, then the parts left and right
//! of the hole within the middle band. Callers (and tests) can rely on that
//! order.

use alloc::vec::Vec;

use kurbo::{Rect, Vec2};

/// A set of non-overlapping axis-aligned rectangles.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// Creates an empty region.
    #[must_use]
    pub const fn new() -> Self {
        Self { rects: Vec::new() }
    }

    /// Creates a region covering `rect` (empty if `rect` is empty).
    #[must_use]
    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.union_rect(rect);
        region
    }

    /// Returns `true` if the region covers nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Returns the rectangles making up the region.
    #[inline]
    #[must_use]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Number of rectangles in the region.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Removes every rectangle.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Total covered area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.rects.iter().map(Rect::area).sum()
    }

    /// Smallest rectangle containing the whole region ([`Rect::ZERO`] when
    /// empty).
    #[must_use]
    pub fn bounds(&self) -> Rect {
        let mut iter = self.rects.iter();
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        iter.fold(*first, |acc, r| acc.union(*r))
    }

    /// Adds `rect` to the region.
    ///
    /// Only the parts of `rect` not already covered are appended, so the
    /// non-overlap invariant holds.
    pub fn union_rect(&mut self, rect: Rect) {
        let rect = rect.abs();
        if is_empty_rect(rect) {
            return;
        }
        let mut pieces = Vec::new();
        pieces.push(rect);
        for existing in &self.rects {
            if pieces.is_empty() {
                return;
            }
            let mut next = Vec::with_capacity(pieces.len());
            for piece in &pieces {
                subtract_into(*piece, *existing, &mut next);
            }
            pieces = next;
        }
        self.rects.extend(pieces);
    }

    /// Adds every rectangle of `other` to the region.
    pub fn union(&mut self, other: &Self) {
        for r in &other.rects {
            self.union_rect(*r);
        }
    }

    /// Restricts the region to `rect`.
    pub fn intersect_rect(&mut self, rect: Rect) {
        let rect = rect.abs();
        self.rects.retain_mut(|r| {
            *r = r.intersect(rect);
            !is_empty_rect(*r)
        });
    }

    /// Restricts the region to the area covered by `other`.
    pub fn intersect(&mut self, other: &Self) {
        let mut out = Vec::new();
        for a in &self.rects {
            for b in &other.rects {
                let r = a.intersect(*b);
                if !is_empty_rect(r) {
                    out.push(r);
                }
            }
        }
        self.rects = out;
    }

    /// Returns a copy of the region restricted to `rect`.
    #[must_use]
    pub fn intersected_rect(&self, rect: Rect) -> Self {
        let mut r = self.clone();
        r.intersect_rect(rect);
        r
    }

    /// Removes `rect` from the region.
    pub fn subtract_rect(&mut self, rect: Rect) {
        let rect = rect.abs();
        if is_empty_rect(rect) {
            return;
        }
        let mut out = Vec::with_capacity(self.rects.len());
        for r in &self.rects {
            subtract_into(*r, rect, &mut out);
        }
        self.rects = out;
    }

    /// Removes every rectangle of `other` from the region.
    pub fn subtract(&mut self, other: &Self) {
        for r in &other.rects {
            if self.is_empty() {
                return;
            }
            self.subtract_rect(*r);
        }
    }

    /// Returns `true` if any part of `rect` is covered by the region.
    #[must_use]
    pub fn intersects_rect(&self, rect: Rect) -> bool {
        let rect = rect.abs();
        self.rects.iter().any(|r| overlaps(*r, rect))
    }

    /// Returns `true` if `rect` is entirely covered by the region.
    ///
    /// An empty `rect` is trivially contained.
    #[must_use]
    pub fn contains_rect(&self, rect: Rect) -> bool {
        let mut rest = Self::from_rect(rect);
        rest.subtract(self);
        rest.is_empty()
    }

    /// Moves every rectangle by `offset`.
    pub fn translate(&mut self, offset: Vec2) {
        for r in &mut self.rects {
            *r = *r + offset;
        }
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

/// Returns `true` if `r` has no area (or is not finite).
#[inline]
#[must_use]
pub fn is_empty_rect(r: Rect) -> bool {
    // Written so that NaN coordinates count as empty.
    !(r.x0 < r.x1 && r.y0 < r.y1) || !r.is_finite()
}

/// Returns `a ∪ b`, ignoring empty operands.
#[must_use]
pub fn union_nonempty(a: Rect, b: Rect) -> Rect {
    match (is_empty_rect(a), is_empty_rect(b)) {
        (true, true) => Rect::ZERO,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a.union(b),
    }
}

/// Returns `a ∩ b`, or [`Rect::ZERO`] when they do not overlap.
#[must_use]
pub fn intersect_nonempty(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if is_empty_rect(r) { Rect::ZERO } else { r }
}

/// Smallest integer-aligned rectangle containing `r`.
#[inline]
#[must_use]
pub fn round_out(r: Rect) -> Rect {
    if is_empty_rect(r) {
        return Rect::ZERO;
    }
    r.abs().expand()
}

/// Largest integer-aligned rectangle contained in `r` ([`Rect::ZERO`] if
/// none).
#[inline]
#[must_use]
pub fn round_in(r: Rect) -> Rect {
    if is_empty_rect(r) {
        return Rect::ZERO;
    }
    let t = r.abs().trunc();
    if is_empty_rect(t) { Rect::ZERO } else { t }
}

/// Strict overlap test (touching edges do not overlap).
#[inline]
fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Pushes the pieces of `a` not covered by `hole` onto `out`.
fn subtract_into(a: Rect, hole: Rect, out: &mut Vec<Rect>) {
    if !overlaps(a, hole) {
        out.push(a);
        return;
    }
    if hole.y0 > a.y0 {
        out.push(Rect::new(a.x0, a.y0, a.x1, hole.y0));
    }
    if hole.y1 < a.y1 {
        out.push(Rect::new(a.x0, hole.y1, a.x1, a.y1));
    }
    let y0 = a.y0.max(hole.y0);
    let y1 = a.y1.min(hole.y1);
    if hole.x0 > a.x0 {
        out.push(Rect::new(a.x0, y0, hole.x0, y1));
    }
    if hole.x1 < a.x1 {
        out.push(Rect::new(hole.x1, y0, a.x1, y1));
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn empty_rects_are_ignored() {
        let mut r = Region::new();
        r.union_rect(Rect::ZERO);
        r.union_rect(Rect::new(5.0, 5.0, 5.0, 10.0));
        r.union_rect(Rect::new(0.0, 0.0, f64::NAN, 1.0));
        assert!(r.is_empty());
        assert_eq!(r.bounds(), Rect::ZERO);
    }

    #[test]
    fn union_does_not_overlap() {
        let mut r = Region::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        r.union_rect(Rect::new(5.0, 5.0, 15.0, 15.0));
        assert_eq!(r.area(), 100.0 + 100.0 - 25.0);
        assert_eq!(
            r.rects(),
            &[
                Rect::new(0.0, 0.0, 10.0, 10.0),
                Rect::new(5.0, 10.0, 15.0, 15.0),
                Rect::new(10.0, 5.0, 15.0, 10.0),
            ]
        );
    }

    #[test]
    fn union_of_covered_rect_is_noop() {
        let mut r = Region::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        r.union_rect(Rect::new(2.0, 2.0, 4.0, 4.0));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn subtract_hole_splits_in_fixed_order() {
        let mut r = Region::from_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        r.subtract_rect(Rect::new(25.0, 25.0, 75.0, 75.0));
        assert_eq!(
            r.rects(),
            &[
                Rect::new(0.0, 0.0, 100.0, 25.0),
                Rect::new(0.0, 75.0, 100.0, 100.0),
                Rect::new(0.0, 25.0, 25.0, 75.0),
                Rect::new(75.0, 25.0, 100.0, 75.0),
            ]
        );
        assert_eq!(r.area(), 10_000.0 - 2_500.0);
    }

    #[test]
    fn subtract_everything() {
        let mut r = Region::from_rect(Rect::new(10.0, 10.0, 20.0, 20.0));
        r.subtract_rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(r.is_empty());
    }

    #[test]
    fn intersect_rect_clips() {
        let mut r = Region::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        r.union_rect(Rect::new(20.0, 0.0, 30.0, 10.0));
        r.intersect_rect(Rect::new(5.0, 0.0, 25.0, 5.0));
        assert_eq!(
            r.rects(),
            &[Rect::new(5.0, 0.0, 10.0, 5.0), Rect::new(20.0, 0.0, 25.0, 5.0)]
        );
    }

    #[test]
    fn intersect_regions() {
        let a = Region::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut b = Region::from_rect(Rect::new(5.0, 5.0, 20.0, 20.0));
        b.intersect(&a);
        assert_eq!(b.rects(), &[Rect::new(5.0, 5.0, 10.0, 10.0)]);
    }

    #[test]
    fn contains_and_intersects() {
        let mut r = Region::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        r.union_rect(Rect::new(10.0, 0.0, 20.0, 10.0));
        // Spans both pieces.
        assert!(r.contains_rect(Rect::new(5.0, 2.0, 15.0, 8.0)));
        assert!(!r.contains_rect(Rect::new(5.0, 2.0, 25.0, 8.0)));
        assert!(r.intersects_rect(Rect::new(19.0, 9.0, 30.0, 30.0)));
        // Touching edges do not intersect.
        assert!(!r.intersects_rect(Rect::new(20.0, 0.0, 30.0, 10.0)));
        assert!(r.contains_rect(Rect::ZERO));
    }

    #[test]
    fn subtract_region_then_union_restores_area() {
        let full = Rect::new(0.0, 0.0, 64.0, 64.0);
        let mut holes = Region::new();
        for r in vec![
            Rect::new(4.0, 4.0, 12.0, 60.0),
            Rect::new(8.0, 8.0, 40.0, 16.0),
            Rect::new(50.0, 0.0, 64.0, 64.0),
        ] {
            holes.union_rect(r);
        }
        let mut rest = Region::from_rect(full);
        rest.subtract(&holes);
        assert!(!rest.intersects_rect(Rect::new(5.0, 5.0, 6.0, 6.0)));
        rest.union(&holes);
        assert_eq!(rest.area(), full.area());
        assert!(rest.contains_rect(full));
    }

    #[test]
    fn rounding() {
        let r = Rect::new(0.5, 1.2, 10.4, 9.9);
        assert_eq!(round_out(r), Rect::new(0.0, 1.0, 11.0, 10.0));
        assert_eq!(round_in(r), Rect::new(1.0, 2.0, 10.0, 9.0));
        assert_eq!(round_in(Rect::new(0.2, 0.2, 0.8, 0.8)), Rect::ZERO);
    }

    #[test]
    fn bounds_and_translate() {
        let mut r = Region::from_rect(Rect::new(0.0, 0.0, 1.0, 1.0));
        r.union_rect(Rect::new(4.0, 4.0, 5.0, 6.0));
        assert_eq!(r.bounds(), Rect::new(0.0, 0.0, 5.0, 6.0));
        r.translate(Vec2::new(10.0, 0.0));
        assert_eq!(r.bounds(), Rect::new(10.0, 0.0, 15.0, 6.0));
    }
}
