// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays element storage with allocation, topology, properties,
//! and the notify entry points.

use alloc::vec::Vec;

use kurbo::{Point, Rect, Size, Vec2};

use crate::dirty::{DirtyFlags, DirtyList, NO_SLOT};
use crate::region::{Region, is_empty_rect, round_out};
use crate::transform::Transform3d;

use super::clip::ClipShape;
use super::effect::{CacheMode, Effect};
use super::id::{ElementId, INVALID, MaskId};
use super::pump::PumpConfig;
use super::traverse::{Children, PaintOrder};

/// Total opacity below which an element contributes nothing visible.
pub const INVISIBLE_OPACITY: f32 = 0.5 / 255.0;

/// Whether `opacity` is too small to produce a visible pixel.
#[inline]
#[must_use]
pub fn is_invisible_opacity(opacity: f32) -> bool {
    opacity.is_nan() || opacity < INVISIBLE_OPACITY
}

/// Whether an element may hold children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Paints its own content only.
    #[default]
    Leaf,
    /// Paints its own content, then its children in paint order.
    Container,
}

/// Bits seeded on every node of a newly attached subtree.
const ATTACH_FLAGS: DirtyFlags = DirtyFlags::RENDER_VISIBILITY
    .union(DirtyFlags::HIT_TEST_VISIBILITY)
    .union(DirtyFlags::LOCAL_TRANSFORM)
    .union(DirtyFlags::TRANSFORM)
    .union(DirtyFlags::LOCAL_CLIP)
    .union(DirtyFlags::CLIP)
    .union(DirtyFlags::BOUNDS);

/// Struct-of-arrays storage for one surface's element tree.
///
/// Elements are addressed by [`ElementId`] handles. Each element occupies a
/// slot in parallel arrays; destroyed elements are recycled through a free
/// list and generation counters reject stale handles.
///
/// Only elements reachable from the [root](Self::set_root) are *attached*.
/// Detached elements keep their properties but never enter the dirty lists,
/// and notifying them is a no-op.
#[derive(Debug)]
pub struct ElementTree {
    // -- Topology --
    pub(crate) kind: Vec<ElementKind>,
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,
    pub(crate) paint_order: Vec<Vec<u32>>,
    pub(crate) root: u32,

    // -- Properties (set by collaborators) --
    pub(crate) render_transform: Vec<Transform3d>,
    pub(crate) transform_origin: Vec<Point>,
    pub(crate) offset: Vec<Vec2>,
    pub(crate) size: Vec<Size>,
    pub(crate) clip: Vec<Option<ClipShape>>,
    pub(crate) opacity: Vec<f32>,
    pub(crate) visible: Vec<bool>,
    pub(crate) hit_test_visible: Vec<bool>,
    pub(crate) z_index: Vec<i32>,
    pub(crate) effect: Vec<Option<Effect>>,
    pub(crate) projection: Vec<Option<Transform3d>>,
    pub(crate) cache_mode: Vec<CacheMode>,
    pub(crate) opacity_mask: Vec<Option<MaskId>>,
    pub(crate) opaque: Vec<bool>,

    // -- Computed (written by the pump) --
    pub(crate) local_transform: Vec<Transform3d>,
    pub(crate) absolute_transform: Vec<Transform3d>,
    pub(crate) total_opacity: Vec<f32>,
    pub(crate) total_render_visible: Vec<bool>,
    pub(crate) total_hit_test_visible: Vec<bool>,
    pub(crate) absolute_clip: Vec<Option<Rect>>,
    pub(crate) bounds: Vec<Rect>,
    pub(crate) subtree_bounds: Vec<Rect>,
    pub(crate) inner_bounds: Vec<Rect>,
    pub(crate) level: Vec<u32>,

    // -- Dirty state --
    pub(crate) flags: Vec<DirtyFlags>,
    pub(crate) force_invalidate: Vec<bool>,
    pub(crate) dirty_region: Vec<Region>,
    pub(crate) down_slot: Vec<u32>,
    pub(crate) up_slot: Vec<u32>,
    pub(crate) attached: Vec<bool>,
    pub(crate) down: DirtyList,
    pub(crate) up: DirtyList,
    pub(crate) damage: Region,
    pub(crate) pump_config: PumpConfig,
    pub(crate) frame_index: u64,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTree {
    /// Creates an empty tree with the default [`PumpConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_pump_config(PumpConfig::DEFAULT)
    }

    /// Creates an empty tree with the given pump limits.
    #[must_use]
    pub fn with_pump_config(pump_config: PumpConfig) -> Self {
        Self {
            kind: Vec::new(),
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            paint_order: Vec::new(),
            root: INVALID,
            render_transform: Vec::new(),
            transform_origin: Vec::new(),
            offset: Vec::new(),
            size: Vec::new(),
            clip: Vec::new(),
            opacity: Vec::new(),
            visible: Vec::new(),
            hit_test_visible: Vec::new(),
            z_index: Vec::new(),
            effect: Vec::new(),
            projection: Vec::new(),
            cache_mode: Vec::new(),
            opacity_mask: Vec::new(),
            opaque: Vec::new(),
            local_transform: Vec::new(),
            absolute_transform: Vec::new(),
            total_opacity: Vec::new(),
            total_render_visible: Vec::new(),
            total_hit_test_visible: Vec::new(),
            absolute_clip: Vec::new(),
            bounds: Vec::new(),
            subtree_bounds: Vec::new(),
            inner_bounds: Vec::new(),
            level: Vec::new(),
            flags: Vec::new(),
            force_invalidate: Vec::new(),
            dirty_region: Vec::new(),
            down_slot: Vec::new(),
            up_slot: Vec::new(),
            attached: Vec::new(),
            down: DirtyList::new(),
            up: DirtyList::new(),
            damage: Region::new(),
            pump_config,
            frame_index: 0,
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Returns the pump limits.
    #[must_use]
    pub fn pump_config(&self) -> PumpConfig {
        self.pump_config
    }

    /// Replaces the pump limits.
    pub fn set_pump_config(&mut self, config: PumpConfig) {
        self.pump_config = config;
    }

    /// Number of completed pump calls.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // -- Allocation API --

    /// Creates a new, detached element and returns its handle.
    ///
    /// The element starts with identity transforms, zero size, full opacity,
    /// visible, hit-testable, no clip, no effect, and no parent.
    pub fn create_element(&mut self, kind: ElementKind) -> ElementId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.kind[i] = kind;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.paint_order[i].clear();
            self.render_transform[i] = Transform3d::IDENTITY;
            self.transform_origin[i] = Point::ORIGIN;
            self.offset[i] = Vec2::ZERO;
            self.size[i] = Size::ZERO;
            self.clip[i] = None;
            self.opacity[i] = 1.0;
            self.visible[i] = true;
            self.hit_test_visible[i] = true;
            self.z_index[i] = 0;
            self.effect[i] = None;
            self.projection[i] = None;
            self.cache_mode[i] = CacheMode::None;
            self.opacity_mask[i] = None;
            self.opaque[i] = false;
            self.local_transform[i] = Transform3d::IDENTITY;
            self.absolute_transform[i] = Transform3d::IDENTITY;
            self.total_opacity[i] = 1.0;
            self.total_render_visible[i] = true;
            self.total_hit_test_visible[i] = true;
            self.absolute_clip[i] = None;
            self.bounds[i] = Rect::ZERO;
            self.subtree_bounds[i] = Rect::ZERO;
            self.inner_bounds[i] = Rect::ZERO;
            self.level[i] = 0;
            self.flags[i] = DirtyFlags::empty();
            self.force_invalidate[i] = false;
            self.dirty_region[i].clear();
            self.down_slot[i] = NO_SLOT;
            self.up_slot[i] = NO_SLOT;
            self.attached[i] = false;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.kind.push(kind);
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.paint_order.push(Vec::new());
            self.render_transform.push(Transform3d::IDENTITY);
            self.transform_origin.push(Point::ORIGIN);
            self.offset.push(Vec2::ZERO);
            self.size.push(Size::ZERO);
            self.clip.push(None);
            self.opacity.push(1.0);
            self.visible.push(true);
            self.hit_test_visible.push(true);
            self.z_index.push(0);
            self.effect.push(None);
            self.projection.push(None);
            self.cache_mode.push(CacheMode::None);
            self.opacity_mask.push(None);
            self.opaque.push(false);
            self.local_transform.push(Transform3d::IDENTITY);
            self.absolute_transform.push(Transform3d::IDENTITY);
            self.total_opacity.push(1.0);
            self.total_render_visible.push(true);
            self.total_hit_test_visible.push(true);
            self.absolute_clip.push(None);
            self.bounds.push(Rect::ZERO);
            self.subtree_bounds.push(Rect::ZERO);
            self.inner_bounds.push(Rect::ZERO);
            self.level.push(0);
            self.flags.push(DirtyFlags::empty());
            self.force_invalidate.push(false);
            self.dirty_region.push(Region::new());
            self.down_slot.push(NO_SLOT);
            self.up_slot.push(NO_SLOT);
            self.attached.push(false);
            self.generation.push(0);
            idx
        };

        ElementId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys an element, freeing its slot for reuse.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale, or if the element has children, a
    /// parent, or is the root.
    pub fn destroy_element(&mut self, id: ElementId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy element with children"
        );
        assert!(
            self.parent[idx as usize] == INVALID && self.root != idx,
            "cannot destroy an attached element"
        );

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;
        self.free_list.push(idx);
    }

    /// Returns whether the given handle refers to a live element.
    #[must_use]
    pub fn is_alive(&self, id: ElementId) -> bool {
        (id.idx < self.len) && self.generation[id.idx as usize] == id.generation
    }

    /// Number of live elements.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.len as usize - self.free_list.len()
    }

    // -- Topology API --

    /// Makes `id` the surface root, attaching its subtree.
    ///
    /// A previous root is detached first.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the element has a parent.
    pub fn set_root(&mut self, id: ElementId) {
        self.validate(id);
        assert!(
            self.parent[id.idx as usize] == INVALID,
            "root element cannot have a parent"
        );
        if self.root == id.idx {
            return;
        }
        if self.root != INVALID {
            self.detach_subtree(self.root);
        }
        self.root = id.idx;
        self.attach_subtree(id.idx, 0);
    }

    /// Detaches the current root, if any.
    pub fn clear_root(&mut self) {
        if self.root != INVALID {
            self.detach_subtree(self.root);
            self.root = INVALID;
        }
    }

    /// Returns the surface root.
    #[must_use]
    pub fn root(&self) -> Option<ElementId> {
        self.id_at(self.root)
    }

    /// Adds `child` as the last child of `parent`.
    ///
    /// When `parent` is attached, `child`'s subtree is attached and seeded
    /// fully dirty.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, `parent` is a leaf, `child` already
    /// has a parent, or `child` is the root.
    pub fn add_child(&mut self, parent: ElementId, child: ElementId) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            self.kind[p as usize] == ElementKind::Container,
            "leaf elements cannot have children"
        );
        assert!(
            self.parent[c as usize] == INVALID && self.root != c,
            "child already has a parent"
        );

        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            // Walk to last child.
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        // Last in insertion order: goes after every sibling with z <= its own.
        let z = self.z_index[c as usize];
        let pos = self.paint_order[p as usize].partition_point(|&s| self.z_index[s as usize] <= z);
        self.paint_order[p as usize].insert(pos, c);

        if self.attached[p as usize] {
            let level = self.level[p as usize] + 1;
            self.attach_subtree(c, level);
            self.add_dirty(p, DirtyFlags::BOUNDS);
        }
    }

    /// Inserts `child` before `sibling` in the sibling list.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or
    /// `sibling` has no parent.
    pub fn insert_before(&mut self, child: ElementId, sibling: ElementId) {
        self.validate(child);
        self.validate(sibling);
        let c = child.idx;
        let s = sibling.idx;
        assert!(
            self.parent[c as usize] == INVALID && self.root != c,
            "child already has a parent"
        );
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];

        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            // `sibling` was the first child.
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        self.rebuild_paint_order(p);

        if self.attached[p as usize] {
            let level = self.level[p as usize] + 1;
            self.attach_subtree(c, level);
            self.add_dirty(p, DirtyFlags::BOUNDS);
        }
    }

    /// Removes `child` from its parent, detaching its subtree.
    ///
    /// The area the subtree last covered is added to the surface damage.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the element has no parent.
    pub fn remove_from_parent(&mut self, child: ElementId) {
        self.validate(child);
        let c = child.idx;
        let p = self.parent[c as usize];
        assert!(p != INVALID, "element has no parent");

        if self.attached[c as usize] {
            self.detach_subtree(c);
        }
        self.unlink_from_parent(c);
        self.paint_order[p as usize].retain(|&s| s != c);
        self.add_dirty(p, DirtyFlags::BOUNDS | DirtyFlags::CHILDREN_Z_INDICES);
    }

    /// Returns the kind of an element.
    #[must_use]
    pub fn kind(&self, id: ElementId) -> ElementKind {
        self.validate(id);
        self.kind[id.idx as usize]
    }

    /// Returns the parent of an element, if any.
    #[must_use]
    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.validate(id);
        self.id_at(self.parent[id.idx as usize])
    }

    /// Returns an iterator over the direct children of an element, in
    /// insertion order.
    #[must_use]
    pub fn children(&self, id: ElementId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns an iterator over the direct children of an element, back to
    /// front (ascending z-index, ties in insertion order).
    #[must_use]
    pub fn paint_order(&self, id: ElementId) -> PaintOrder<'_> {
        self.validate(id);
        PaintOrder::new(self, &self.paint_order[id.idx as usize])
    }

    /// Returns whether the element is reachable from the root.
    #[must_use]
    pub fn is_attached(&self, id: ElementId) -> bool {
        self.validate(id);
        self.attached[id.idx as usize]
    }

    /// Returns the depth of an attached element (the root is level 0).
    #[must_use]
    pub fn level(&self, id: ElementId) -> u32 {
        self.validate(id);
        self.level[id.idx as usize]
    }

    // -- Property getters (read-only, no dirty marking) --

    /// Returns the render transform.
    #[must_use]
    pub fn render_transform(&self, id: ElementId) -> Transform3d {
        self.validate(id);
        self.render_transform[id.idx as usize]
    }

    /// Returns the transform origin, relative to the element's size.
    #[must_use]
    pub fn transform_origin(&self, id: ElementId) -> Point {
        self.validate(id);
        self.transform_origin[id.idx as usize]
    }

    /// Returns the layout offset.
    #[must_use]
    pub fn offset(&self, id: ElementId) -> Vec2 {
        self.validate(id);
        self.offset[id.idx as usize]
    }

    /// Returns the layout size.
    #[must_use]
    pub fn size(&self, id: ElementId) -> Size {
        self.validate(id);
        self.size[id.idx as usize]
    }

    /// Returns the clip shape.
    #[must_use]
    pub fn clip(&self, id: ElementId) -> Option<ClipShape> {
        self.validate(id);
        self.clip[id.idx as usize]
    }

    /// Returns the local opacity.
    #[must_use]
    pub fn opacity(&self, id: ElementId) -> f32 {
        self.validate(id);
        self.opacity[id.idx as usize]
    }

    /// Returns the local visibility.
    #[must_use]
    pub fn visible(&self, id: ElementId) -> bool {
        self.validate(id);
        self.visible[id.idx as usize]
    }

    /// Returns the local hit-test visibility.
    #[must_use]
    pub fn hit_test_visible(&self, id: ElementId) -> bool {
        self.validate(id);
        self.hit_test_visible[id.idx as usize]
    }

    /// Returns the z-index.
    #[must_use]
    pub fn z_index(&self, id: ElementId) -> i32 {
        self.validate(id);
        self.z_index[id.idx as usize]
    }

    /// Returns the effect.
    #[must_use]
    pub fn effect(&self, id: ElementId) -> Option<&Effect> {
        self.validate(id);
        self.effect[id.idx as usize].as_ref()
    }

    /// Returns the projection.
    #[must_use]
    pub fn projection(&self, id: ElementId) -> Option<Transform3d> {
        self.validate(id);
        self.projection[id.idx as usize]
    }

    /// Returns the cache mode.
    #[must_use]
    pub fn cache_mode(&self, id: ElementId) -> CacheMode {
        self.validate(id);
        self.cache_mode[id.idx as usize]
    }

    /// Returns the opacity mask.
    #[must_use]
    pub fn opacity_mask(&self, id: ElementId) -> Option<MaskId> {
        self.validate(id);
        self.opacity_mask[id.idx as usize]
    }

    /// Returns whether the element's content covers its extents opaquely.
    #[must_use]
    pub fn opaque(&self, id: ElementId) -> bool {
        self.validate(id);
        self.opaque[id.idx as usize]
    }

    /// Whether the element composites through an offscreen group (effect,
    /// projection, or bitmap cache).
    #[must_use]
    pub fn renders_to_intermediate(&self, id: ElementId) -> bool {
        self.validate(id);
        self.is_intermediate(id.idx)
    }

    // -- Computed getters (valid after a pump) --

    /// Returns the computed local transform.
    #[must_use]
    pub fn local_transform(&self, id: ElementId) -> Transform3d {
        self.validate(id);
        self.local_transform[id.idx as usize]
    }

    /// Returns the computed absolute transform (excluding projections).
    #[must_use]
    pub fn absolute_transform(&self, id: ElementId) -> Transform3d {
        self.validate(id);
        self.absolute_transform[id.idx as usize]
    }

    /// Returns the product of ancestor opacities and the element's own.
    #[must_use]
    pub fn total_opacity(&self, id: ElementId) -> f32 {
        self.validate(id);
        self.total_opacity[id.idx as usize]
    }

    /// Returns whether the element and all its ancestors are visible.
    #[must_use]
    pub fn is_render_visible(&self, id: ElementId) -> bool {
        self.validate(id);
        self.total_render_visible[id.idx as usize]
    }

    /// Returns whether the element and all its ancestors are hit-testable.
    #[must_use]
    pub fn is_hit_test_visible(&self, id: ElementId) -> bool {
        self.validate(id);
        self.total_hit_test_visible[id.idx as usize]
    }

    /// Returns the bounding rect of every clip applying to the element's
    /// content, in its content space.
    #[must_use]
    pub fn absolute_clip(&self, id: ElementId) -> Option<Rect> {
        self.validate(id);
        self.absolute_clip[id.idx as usize]
    }

    /// Returns the element's own bounds in composition space.
    #[must_use]
    pub fn bounds(&self, id: ElementId) -> Rect {
        self.validate(id);
        self.bounds[id.idx as usize]
    }

    /// Returns the bounds of the element and its descendants in composition
    /// space.
    #[must_use]
    pub fn subtree_bounds(&self, id: ElementId) -> Rect {
        self.validate(id);
        self.subtree_bounds[id.idx as usize]
    }

    /// Returns the subtree extent before effect padding and projection.
    #[must_use]
    pub fn inner_bounds(&self, id: ElementId) -> Rect {
        self.validate(id);
        self.inner_bounds[id.idx as usize]
    }

    /// Returns the pending dirty bits of an element.
    #[must_use]
    pub fn dirty_flags(&self, id: ElementId) -> DirtyFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Number of elements waiting in the downward and upward lists.
    #[must_use]
    pub fn pending(&self) -> (usize, usize) {
        (self.down.len(), self.up.len())
    }

    // -- Damage --

    /// Returns the accumulated surface damage.
    #[must_use]
    pub fn damage(&self) -> &Region {
        &self.damage
    }

    /// Takes the accumulated surface damage, leaving it empty.
    pub fn take_damage(&mut self) -> Region {
        core::mem::take(&mut self.damage)
    }

    /// Adds a surface-space rect (rounded out) to the damage, for example
    /// after a resize.
    pub fn add_damage(&mut self, rect: Rect) {
        self.damage.union_rect(round_out(rect));
    }

    // -- Mutation API (auto-notifies) --

    /// Sets the render transform.
    pub fn set_render_transform(&mut self, id: ElementId, transform: Transform3d) {
        self.validate(id);
        let i = id.idx as usize;
        if self.render_transform[i] != transform {
            self.render_transform[i] = transform;
            self.notify_transform_changed(id);
        }
    }

    /// Sets the transform origin, relative to the element's size
    /// (`(0.5, 0.5)` is the centre).
    pub fn set_transform_origin(&mut self, id: ElementId, origin: Point) {
        self.validate(id);
        let i = id.idx as usize;
        if self.transform_origin[i] != origin {
            self.transform_origin[i] = origin;
            self.notify_transform_changed(id);
        }
    }

    /// Sets the layout offset within the parent.
    pub fn set_offset(&mut self, id: ElementId, offset: Vec2) {
        self.validate(id);
        let i = id.idx as usize;
        if self.offset[i] != offset {
            self.offset[i] = offset;
            self.notify_transform_changed(id);
        }
    }

    /// Sets the layout size.
    pub fn set_size(&mut self, id: ElementId, size: Size) {
        self.validate(id);
        let i = id.idx as usize;
        if self.size[i] != size {
            self.invalidate_idx(id.idx);
            self.size[i] = size;
            // The transform origin is relative to the size.
            if self.transform_origin[i] != Point::ORIGIN {
                self.notify_transform_changed(id);
            }
            self.notify_bounds_may_have_changed(id, false);
        }
    }

    /// Sets the clip shape.
    pub fn set_clip(&mut self, id: ElementId, clip: Option<ClipShape>) {
        self.validate(id);
        let i = id.idx as usize;
        if self.clip[i] != clip {
            self.invalidate_idx(id.idx);
            self.clip[i] = clip;
            self.notify_clip_changed(id);
        }
    }

    /// Sets the local opacity.
    ///
    /// Values are clamped to `0.0..=1.0`; NaN counts as fully transparent.
    pub fn set_opacity(&mut self, id: ElementId, opacity: f32) {
        self.validate(id);
        let opacity = if opacity.is_nan() {
            0.0
        } else {
            opacity.clamp(0.0, 1.0)
        };
        let i = id.idx as usize;
        if self.opacity[i] != opacity {
            self.invalidate_idx(id.idx);
            self.opacity[i] = opacity;
            self.notify_visibility_changed(id);
        }
    }

    /// Shows or hides the element and its subtree.
    pub fn set_visible(&mut self, id: ElementId, visible: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if self.visible[i] != visible {
            self.invalidate_idx(id.idx);
            self.visible[i] = visible;
            self.notify_visibility_changed(id);
        }
    }

    /// Sets whether the element and its subtree take part in hit testing.
    pub fn set_hit_test_visible(&mut self, id: ElementId, visible: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if self.hit_test_visible[i] != visible {
            self.hit_test_visible[i] = visible;
            self.notify_hit_test_visibility_changed(id);
        }
    }

    /// Sets the z-index used to order the element among its siblings.
    pub fn set_z_index(&mut self, id: ElementId, z_index: i32) {
        self.validate(id);
        let i = id.idx as usize;
        if self.z_index[i] == z_index {
            return;
        }
        self.z_index[i] = z_index;
        let p = self.parent[i];
        if p == INVALID {
            return;
        }
        if self.attached[p as usize] {
            self.add_dirty(p, DirtyFlags::CHILDREN_Z_INDICES);
        } else {
            self.rebuild_paint_order(p);
        }
    }

    /// Sets the effect.
    pub fn set_effect(&mut self, id: ElementId, effect: Option<Effect>) {
        self.validate(id);
        let i = id.idx as usize;
        if self.effect[i] != effect {
            // Old padding may have covered more than the new one will.
            self.invalidate_idx(id.idx);
            self.effect[i] = effect;
            self.notify_bounds_may_have_changed(id, true);
        }
    }

    /// Sets the projection, expressed in the element's composition space.
    pub fn set_projection(&mut self, id: ElementId, projection: Option<Transform3d>) {
        self.validate(id);
        let i = id.idx as usize;
        if self.projection[i] != projection {
            self.invalidate_idx(id.idx);
            self.projection[i] = projection;
            self.notify_transform_changed(id);
        }
    }

    /// Sets the cache mode.
    pub fn set_cache_mode(&mut self, id: ElementId, mode: CacheMode) {
        self.validate(id);
        let i = id.idx as usize;
        if self.cache_mode[i] != mode {
            self.cache_mode[i] = mode;
            self.invalidate_idx(id.idx);
        }
    }

    /// Sets the opacity mask.
    pub fn set_opacity_mask(&mut self, id: ElementId, mask: Option<MaskId>) {
        self.validate(id);
        let i = id.idx as usize;
        if self.opacity_mask[i] != mask {
            self.opacity_mask[i] = mask;
            self.invalidate_idx(id.idx);
        }
    }

    /// Declares whether the element's content covers its extents opaquely,
    /// which lets it occlude content behind it.
    pub fn set_opaque(&mut self, id: ElementId, opaque: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if self.opaque[i] != opaque {
            self.opaque[i] = opaque;
            self.invalidate_idx(id.idx);
        }
    }

    // -- Notify entry points --

    /// Marks the local transform inputs dirty.
    pub fn notify_transform_changed(&mut self, id: ElementId) {
        self.validate(id);
        self.add_dirty(id.idx, DirtyFlags::LOCAL_TRANSFORM | DirtyFlags::TRANSFORM);
    }

    /// Marks the clip dirty.
    pub fn notify_clip_changed(&mut self, id: ElementId) {
        self.validate(id);
        self.add_dirty(id.idx, DirtyFlags::LOCAL_CLIP | DirtyFlags::CLIP);
    }

    /// Marks render visibility and opacity dirty.
    pub fn notify_visibility_changed(&mut self, id: ElementId) {
        self.validate(id);
        self.add_dirty(id.idx, DirtyFlags::RENDER_VISIBILITY);
    }

    /// Marks hit-test visibility dirty.
    pub fn notify_hit_test_visibility_changed(&mut self, id: ElementId) {
        self.validate(id);
        self.add_dirty(id.idx, DirtyFlags::HIT_TEST_VISIBILITY);
    }

    /// Marks the children's paint order dirty.
    pub fn notify_z_order_changed(&mut self, id: ElementId) {
        self.validate(id);
        self.add_dirty(id.idx, DirtyFlags::CHILDREN_Z_INDICES);
    }

    /// Marks bounds dirty. With `force`, the whole subtree area is repainted
    /// after the bounds are recomputed, even if they did not change.
    pub fn notify_bounds_may_have_changed(&mut self, id: ElementId, force: bool) {
        self.validate(id);
        let i = id.idx as usize;
        if !self.attached[i] {
            return;
        }
        if force {
            self.force_invalidate[i] = true;
        }
        self.add_dirty(id.idx, DirtyFlags::BOUNDS);
    }

    /// Adds `rect` (in the element's composition space) to the area that
    /// must be repainted.
    ///
    /// Skipped for elements that are hidden or fully transparent.
    pub fn notify_paint_region_dirty(&mut self, id: ElementId, rect: Rect) {
        self.validate(id);
        self.invalidate_rect(id.idx, rect);
    }

    /// Repaints the element's whole subtree area.
    pub fn invalidate(&mut self, id: ElementId) {
        self.validate(id);
        self.invalidate_idx(id.idx);
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: ElementId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale ElementId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Handle for a raw slot, or `None` for [`INVALID`].
    pub(crate) fn id_at(&self, idx: u32) -> Option<ElementId> {
        (idx != INVALID).then(|| ElementId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    pub(crate) fn is_intermediate(&self, idx: u32) -> bool {
        let i = idx as usize;
        self.effect[i].is_some()
            || self.projection[i].is_some()
            || self.cache_mode[i] == CacheMode::BitmapCache
    }

    /// Sets bits on an attached element and enqueues it in the lists the bits
    /// belong to.
    pub(crate) fn add_dirty(&mut self, idx: u32, flags: DirtyFlags) {
        let i = idx as usize;
        if !self.attached[i] {
            return;
        }
        let flags = flags.with_implied();
        self.flags[i] |= flags;
        if flags.needs_down() && self.down_slot[i] == NO_SLOT {
            self.down_slot[i] = self.down.insert(idx, self.level[i]);
        }
        if flags.needs_up() && self.up_slot[i] == NO_SLOT {
            self.up_slot[i] = self.up.insert(idx, self.level[i]);
        }
    }

    /// Whether paint invalidation of `idx` can produce visible damage.
    pub(crate) fn can_invalidate(&self, idx: u32) -> bool {
        let i = idx as usize;
        self.attached[i]
            && self.total_render_visible[i]
            && !is_invisible_opacity(self.total_opacity[i])
    }

    pub(crate) fn invalidate_rect(&mut self, idx: u32, rect: Rect) {
        if is_empty_rect(rect) || !self.can_invalidate(idx) {
            return;
        }
        self.dirty_region[idx as usize].union_rect(rect);
        self.add_dirty(idx, DirtyFlags::INVALIDATE);
    }

    pub(crate) fn invalidate_idx(&mut self, idx: u32) {
        self.invalidate_rect(idx, self.subtree_bounds[idx as usize]);
    }

    /// Re-sorts a container's paint order from its child list.
    pub(crate) fn rebuild_paint_order(&mut self, idx: u32) {
        let mut order = core::mem::take(&mut self.paint_order[idx as usize]);
        order.clear();
        let mut c = self.first_child[idx as usize];
        while c != INVALID {
            order.push(c);
            c = self.next_sibling[c as usize];
        }
        // Stable: equal z keeps insertion order.
        order.sort_by_key(|&c| self.z_index[c as usize]);
        self.paint_order[idx as usize] = order;
    }

    /// Marks every node of the subtree at `idx` attached and fully dirty.
    fn attach_subtree(&mut self, idx: u32, level: u32) {
        let mut stack = alloc::vec![(idx, level)];
        while let Some((n, lvl)) = stack.pop() {
            let i = n as usize;
            self.attached[i] = true;
            self.level[i] = lvl;
            let mut seed = ATTACH_FLAGS;
            if self.kind[i] == ElementKind::Container {
                seed |= DirtyFlags::CHILDREN_Z_INDICES;
            }
            self.add_dirty(n, seed);
            // Reversed so siblings are enqueued in child order.
            let start = stack.len();
            let mut c = self.first_child[i];
            while c != INVALID {
                stack.push((c, lvl + 1));
                c = self.next_sibling[c as usize];
            }
            stack[start..].reverse();
        }
    }

    /// Damages the subtree's last painted area and unlinks every node of it
    /// from both dirty lists.
    fn detach_subtree(&mut self, idx: u32) {
        let old = self.subtree_bounds[idx as usize];
        if !is_empty_rect(old) {
            self.merge_damage(idx, old);
        }

        let mut stack = alloc::vec![idx];
        while let Some(n) = stack.pop() {
            let i = n as usize;
            if self.down_slot[i] != NO_SLOT {
                self.down.remove(self.down_slot[i]);
                self.down_slot[i] = NO_SLOT;
            }
            if self.up_slot[i] != NO_SLOT {
                self.up.remove(self.up_slot[i]);
                self.up_slot[i] = NO_SLOT;
            }
            self.flags[i] = DirtyFlags::empty();
            self.force_invalidate[i] = false;
            self.dirty_region[i].clear();
            self.attached[i] = false;
            self.bounds[i] = Rect::ZERO;
            self.subtree_bounds[i] = Rect::ZERO;
            self.inner_bounds[i] = Rect::ZERO;
            let mut c = self.first_child[i];
            while c != INVALID {
                stack.push(c);
                c = self.next_sibling[c as usize];
            }
        }
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;

    fn container(tree: &mut ElementTree) -> ElementId {
        tree.create_element(ElementKind::Container)
    }

    #[test]
    fn create_and_destroy() {
        let mut tree = ElementTree::new();
        let id = tree.create_element(ElementKind::Leaf);
        assert!(tree.is_alive(id));
        assert_eq!(tree.live_count(), 1);
        tree.destroy_element(id);
        assert!(!tree.is_alive(id));
        assert_eq!(tree.live_count(), 0);
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut tree = ElementTree::new();
        let id1 = tree.create_element(ElementKind::Leaf);
        tree.destroy_element(id1);
        let id2 = tree.create_element(ElementKind::Leaf);
        // id2 reuses the same slot but has a different generation.
        assert!(!tree.is_alive(id1));
        assert!(tree.is_alive(id2));
        assert_eq!(id1.idx, id2.idx);
        assert_ne!(id1.generation, id2.generation);
    }

    #[test]
    #[should_panic(expected = "stale ElementId")]
    fn stale_handle_panics() {
        let mut tree = ElementTree::new();
        let id = tree.create_element(ElementKind::Leaf);
        tree.destroy_element(id);
        let _ = tree.opacity(id);
    }

    #[test]
    #[should_panic(expected = "leaf elements cannot have children")]
    fn leaf_rejects_children() {
        let mut tree = ElementTree::new();
        let leaf = tree.create_element(ElementKind::Leaf);
        let child = tree.create_element(ElementKind::Leaf);
        tree.add_child(leaf, child);
    }

    #[test]
    #[should_panic(expected = "cannot destroy an attached element")]
    fn destroying_attached_element_panics() {
        let mut tree = ElementTree::new();
        let root = container(&mut tree);
        let child = tree.create_element(ElementKind::Leaf);
        tree.add_child(root, child);
        tree.destroy_element(child);
    }

    #[test]
    #[should_panic(expected = "cannot destroy element with children")]
    fn destroying_parent_panics() {
        let mut tree = ElementTree::new();
        let root = container(&mut tree);
        let child = tree.create_element(ElementKind::Leaf);
        tree.add_child(root, child);
        tree.destroy_element(root);
    }

    #[test]
    fn add_child_and_query() {
        let mut tree = ElementTree::new();
        let parent = container(&mut tree);
        let child1 = tree.create_element(ElementKind::Leaf);
        let child2 = tree.create_element(ElementKind::Leaf);

        tree.add_child(parent, child1);
        tree.add_child(parent, child2);

        assert_eq!(tree.parent(child1), Some(parent));
        let kids: Vec<_> = tree.children(parent).collect();
        assert_eq!(kids, vec![child1, child2]);
    }

    #[test]
    fn insert_before_first_child() {
        let mut tree = ElementTree::new();
        let parent = container(&mut tree);
        let a = tree.create_element(ElementKind::Leaf);
        let b = tree.create_element(ElementKind::Leaf);
        tree.add_child(parent, a);
        tree.insert_before(b, a);
        let kids: Vec<_> = tree.children(parent).collect();
        assert_eq!(kids, vec![b, a]);
        let order: Vec<_> = tree.paint_order(parent).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn paint_order_is_stable_by_z() {
        let mut tree = ElementTree::new();
        let parent = container(&mut tree);
        let a = tree.create_element(ElementKind::Leaf);
        let b = tree.create_element(ElementKind::Leaf);
        let c = tree.create_element(ElementKind::Leaf);
        tree.set_z_index(a, 1);
        tree.add_child(parent, a);
        tree.add_child(parent, b);
        tree.add_child(parent, c);
        let order: Vec<_> = tree.paint_order(parent).collect();
        assert_eq!(order, vec![b, c, a]);

        // Detached parent: re-sorted immediately.
        tree.set_z_index(a, 0);
        let order: Vec<_> = tree.paint_order(parent).collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn attach_seeds_subtree() {
        let mut tree = ElementTree::new();
        let root = container(&mut tree);
        let mid = container(&mut tree);
        let leaf = tree.create_element(ElementKind::Leaf);
        tree.add_child(mid, leaf);
        tree.add_child(root, mid);

        // Nothing attached yet.
        assert_eq!(tree.pending(), (0, 0));
        assert!(tree.dirty_flags(leaf).is_empty());

        tree.set_root(root);
        assert!(tree.is_attached(leaf));
        assert_eq!(tree.level(leaf), 2);
        assert_eq!(tree.pending(), (3, 3));
        assert!(tree.dirty_flags(mid).contains(DirtyFlags::CHILDREN_Z_INDICES));
        assert!(!tree.dirty_flags(leaf).contains(DirtyFlags::CHILDREN_Z_INDICES));
        assert!(tree.dirty_flags(leaf).contains(DirtyFlags::BOUNDS));
    }

    #[test]
    fn notify_on_detached_is_noop() {
        let mut tree = ElementTree::new();
        let id = tree.create_element(ElementKind::Leaf);
        tree.notify_transform_changed(id);
        tree.notify_bounds_may_have_changed(id, true);
        tree.notify_paint_region_dirty(id, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(tree.dirty_flags(id).is_empty());
        assert_eq!(tree.pending(), (0, 0));
    }

    #[test]
    fn detach_unlinks_from_both_lists() {
        let mut tree = ElementTree::new();
        let root = container(&mut tree);
        let child = container(&mut tree);
        let grandchild = tree.create_element(ElementKind::Leaf);
        tree.add_child(child, grandchild);
        tree.set_root(root);
        tree.add_child(root, child);
        assert_eq!(tree.pending(), (3, 3));

        tree.remove_from_parent(child);
        assert!(!tree.is_attached(child));
        assert!(!tree.is_attached(grandchild));
        assert!(tree.dirty_flags(grandchild).is_empty());
        // Only the root remains queued.
        assert_eq!(tree.pending(), (1, 1));

        // Re-attaching works after a detach.
        tree.add_child(root, child);
        assert_eq!(tree.pending(), (3, 3));
    }

    #[test]
    fn set_same_value_does_not_dirty() {
        let mut tree = ElementTree::new();
        let root = tree.create_element(ElementKind::Leaf);
        tree.set_root(root);
        tree.process_dirty_elements();
        tree.set_opacity(root, 1.0);
        tree.set_offset(root, Vec2::ZERO);
        assert!(tree.dirty_flags(root).is_empty());
    }

    #[test]
    fn opacity_is_clamped_to_unit_range() {
        let mut tree = ElementTree::new();
        let root = tree.create_element(ElementKind::Container);
        let child = tree.create_element(ElementKind::Leaf);
        tree.add_child(root, child);
        tree.set_root(root);

        tree.set_opacity(root, 1.5);
        tree.set_opacity(child, -0.25);
        assert_eq!(tree.opacity(root), 1.0, "above one clamps to opaque");
        assert_eq!(tree.opacity(child), 0.0, "below zero clamps to transparent");
        tree.process_dirty_elements();
        assert_eq!(tree.total_opacity(child), 0.0, "product stays in range");

        tree.set_opacity(child, f32::NAN);
        assert_eq!(tree.opacity(child), 0.0, "NaN is transparent");
        assert!(tree.dirty_flags(child).is_empty(), "no change, no dirt");

        tree.set_opacity(root, 0.5);
        tree.set_opacity(child, 2.0);
        tree.process_dirty_elements();
        assert_eq!(tree.total_opacity(child), 0.5, "child at full opacity inherits");
    }

    #[test]
    fn replacing_root_detaches_old() {
        let mut tree = ElementTree::new();
        let a = tree.create_element(ElementKind::Leaf);
        let b = tree.create_element(ElementKind::Leaf);
        tree.set_root(a);
        tree.set_root(b);
        assert!(!tree.is_attached(a));
        assert_eq!(tree.root(), Some(b));
        tree.clear_root();
        assert_eq!(tree.root(), None);
        assert_eq!(tree.pending(), (0, 0));
        tree.destroy_element(a);
    }
}
