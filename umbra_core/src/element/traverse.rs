// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities and hit testing.

use kurbo::{Point, Rect};

use super::id::{ElementId, INVALID};
use super::store::ElementTree;

/// An iterator over the direct children of an element, in insertion order.
///
/// Created by [`ElementTree::children`].
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a ElementTree,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(tree: &'a ElementTree, first: u32) -> Self {
        Self {
            tree,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.next_sibling[idx as usize];
        Some(ElementId {
            idx,
            generation: self.tree.generation[idx as usize],
        })
    }
}

/// An iterator over the direct children of an element, back to front.
///
/// Created by [`ElementTree::paint_order`]. Reverse it for front-to-back
/// order.
#[derive(Debug)]
pub struct PaintOrder<'a> {
    tree: &'a ElementTree,
    inner: core::slice::Iter<'a, u32>,
}

impl<'a> PaintOrder<'a> {
    pub(crate) fn new(tree: &'a ElementTree, order: &'a [u32]) -> Self {
        Self {
            tree,
            inner: order.iter(),
        }
    }

    fn id(&self, idx: u32) -> ElementId {
        ElementId {
            idx,
            generation: self.tree.generation[idx as usize],
        }
    }
}

impl Iterator for PaintOrder<'_> {
    type Item = ElementId;

    fn next(&mut self) -> Option<ElementId> {
        let idx = *self.inner.next()?;
        Some(self.id(idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for PaintOrder<'_> {
    fn next_back(&mut self) -> Option<ElementId> {
        let idx = *self.inner.next_back()?;
        Some(self.id(idx))
    }
}

impl ExactSizeIterator for PaintOrder<'_> {}

impl ElementTree {
    /// Returns the front-most hit-testable element under a surface-space
    /// point.
    ///
    /// Uses the state of the last pump. Elements hidden, not hit-test
    /// visible, or outside an applicable clip never match.
    #[must_use]
    pub fn hit_test(&self, point: Point) -> Option<ElementId> {
        if self.root == INVALID {
            return None;
        }
        let idx = self.hit_test_at(self.root, point)?;
        self.id_at(idx)
    }

    fn hit_test_at(&self, idx: u32, point: Point) -> Option<u32> {
        let i = idx as usize;
        if !self.total_render_visible[i] || !self.total_hit_test_visible[i] {
            return None;
        }
        if !self.subtree_bounds[i].contains(point) {
            return None;
        }
        // Below a projection, children live on the flattened plane.
        let p = match self.projection[i] {
            Some(projection) => projection.homography().inverse()?.map_point(point)?,
            None => point,
        };
        if let Some(clip) = self.absolute_clip[i] {
            if !clip.contains(p) {
                return None;
            }
        }

        for &c in self.paint_order[i].iter().rev() {
            if let Some(hit) = self.hit_test_at(c, p) {
                return Some(hit);
            }
        }

        let local = self.absolute_transform[i]
            .homography()
            .inverse()?
            .map_point(p)?;
        let extents = Rect::from_origin_size(Point::ORIGIN, self.size[i]);
        if !extents.contains(local) {
            return None;
        }
        match self.clip[i] {
            Some(clip) if !clip.contains(local) => None,
            _ => Some(idx),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use kurbo::{RoundedRect, Size, Vec2};

    use crate::element::{ClipShape, ElementKind};
    use crate::transform::Transform3d;

    use super::*;

    fn overlapping() -> (ElementTree, ElementId, ElementId, ElementId) {
        let mut tree = ElementTree::new();
        let root = tree.create_element(ElementKind::Container);
        tree.set_size(root, Size::new(100.0, 100.0));
        let back = tree.create_element(ElementKind::Leaf);
        tree.set_size(back, Size::new(60.0, 60.0));
        let front = tree.create_element(ElementKind::Leaf);
        tree.set_offset(front, Vec2::new(40.0, 40.0));
        tree.set_size(front, Size::new(60.0, 60.0));
        tree.add_child(root, back);
        tree.add_child(root, front);
        tree.set_root(root);
        tree.process_dirty_elements();
        (tree, root, back, front)
    }

    #[test]
    fn paint_order_reverses() {
        let (tree, root, back, front) = overlapping();
        let order: Vec<_> = tree.paint_order(root).rev().collect();
        assert_eq!(order, [front, back]);
        assert_eq!(tree.paint_order(root).len(), 2);
    }

    #[test]
    fn front_most_wins() {
        let (tree, root, back, front) = overlapping();
        assert_eq!(tree.hit_test(Point::new(50.0, 50.0)), Some(front));
        assert_eq!(tree.hit_test(Point::new(10.0, 10.0)), Some(back));
        assert_eq!(tree.hit_test(Point::new(90.0, 5.0)), Some(root));
        assert_eq!(tree.hit_test(Point::new(150.0, 5.0)), None);
    }

    #[test]
    fn z_index_changes_hit_order() {
        let (mut tree, _, back, _) = overlapping();
        tree.set_z_index(back, 1);
        tree.process_dirty_elements();
        assert_eq!(tree.hit_test(Point::new(50.0, 50.0)), Some(back));
    }

    #[test]
    fn hit_test_visibility_is_inherited() {
        let (mut tree, root, back, front) = overlapping();
        tree.set_hit_test_visible(front, false);
        tree.process_dirty_elements();
        assert_eq!(tree.hit_test(Point::new(50.0, 50.0)), Some(back));

        tree.set_hit_test_visible(root, false);
        tree.process_dirty_elements();
        assert_eq!(tree.hit_test(Point::new(10.0, 10.0)), None);
    }

    #[test]
    fn clips_reject_points() {
        let (mut tree, root, back, front) = overlapping();
        tree.set_clip(root, Some(ClipShape::Rect(Rect::new(0.0, 0.0, 45.0, 45.0))));
        tree.set_clip(
            back,
            Some(ClipShape::RoundedRect(RoundedRect::new(0.0, 0.0, 60.0, 60.0, 20.0))),
        );
        tree.process_dirty_elements();
        // Outside the root clip, even though `front` covers it.
        assert_eq!(tree.hit_test(Point::new(50.0, 50.0)), None);
        // In `back`'s rounded corner: falls through to the root.
        assert_eq!(tree.hit_test(Point::new(1.0, 1.0)), Some(root));
        assert_eq!(tree.hit_test(Point::new(42.0, 42.0)), Some(front));
    }

    #[test]
    fn transformed_hit_uses_inverse() {
        let mut tree = ElementTree::new();
        let root = tree.create_element(ElementKind::Leaf);
        tree.set_size(root, Size::new(10.0, 10.0));
        tree.set_render_transform(root, Transform3d::from_scale(3.0, 3.0, 1.0));
        tree.set_root(root);
        tree.process_dirty_elements();
        assert_eq!(tree.hit_test(Point::new(25.0, 25.0)), Some(root));
        assert_eq!(tree.hit_test(Point::new(31.0, 5.0)), None);
    }
}
