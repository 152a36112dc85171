// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The two-phase dirty pump.
//!
//! [`process_dirty_elements`](ElementTree::process_dirty_elements) drains the
//! tree's two worklists:
//!
//! 1. **Layout**: the collaborator's [`PumpHooks::layout`] runs first and may
//!    freely mutate the tree.
//! 2. **Down**: elements are popped lowest level first, so every parent is
//!    processed before its children. Each visit handles, in order:
//!    render visibility, hit-test visibility, local transform, absolute
//!    transform, local clip, accumulated clip, and child paint order.
//! 3. **Up**: elements are popped highest level first, so children report
//!    their bounds before their parent recomputes its own. Each visit
//!    handles bounds, new-bounds invalidation, and merging the element's
//!    dirty region into the surface damage.
//!
//! Hooks may dirty elements downward while the up pass runs. The pump then
//! goes back to step 2 before returning.
//!
//! Both passes are capped (see [`PumpConfig`]). A pass that reaches its cap
//! logs a warning, emits [`DiagnosticKind::PumpDiverged`], and leaves the
//! remaining elements queued for the next call.

#[cfg(feature = "trace-rich")]
use alloc::vec::Vec;

use kurbo::{Point, Rect};

use crate::dirty::{DirtyFlags, NO_SLOT};
use crate::region::{Region, intersect_nonempty, is_empty_rect, round_out, union_nonempty};
use crate::trace::{DiagnosticEvent, DiagnosticKind, PumpEvent, Tracer};
use crate::transform::Transform3d;

use super::id::{ElementId, INVALID};
use super::store::{ElementKind, ElementTree};

/// Limits for a single pump call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PumpConfig {
    /// Per live element, how many times each dirty bit may be processed in
    /// one pass before the pass is considered divergent.
    pub max_visits_per_element: u32,
}

impl PumpConfig {
    /// Default limits: generous enough for heavy re-entrant hooks.
    pub const DEFAULT: Self = Self {
        max_visits_per_element: 4,
    };

    /// Tight limits that flag re-entrancy loops early (useful in tests).
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            max_visits_per_element: 1,
        }
    }
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Collaborator callbacks run during a pump.
///
/// Both methods may mutate the tree. Changes made from
/// [`on_processed`](Self::on_processed) are picked up by the pass that is
/// currently running when they land in its list at or after the current
/// position, otherwise by the next pump call.
pub trait PumpHooks {
    /// Runs before the downward pass.
    fn layout(&mut self, tree: &mut ElementTree) {
        _ = tree;
    }

    /// Runs after each element visit with the bits that visit processed.
    fn on_processed(&mut self, tree: &mut ElementTree, id: ElementId, flags: DirtyFlags) {
        _ = (tree, id, flags);
    }
}

/// [`PumpHooks`] that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl PumpHooks for NoHooks {}

/// What one pump call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Elements dequeued by the downward pass.
    pub down_visits: u32,
    /// Elements dequeued by the upward pass.
    pub up_visits: u32,
    /// Elements still queued downward (non-zero only after divergence).
    pub residual_down: u32,
    /// Elements still queued upward (non-zero only after divergence).
    pub residual_up: u32,
}

impl PumpReport {
    /// Whether any element was processed.
    #[must_use]
    pub fn did_work(&self) -> bool {
        self.down_visits > 0 || self.up_visits > 0
    }

    /// Whether a pass hit its cap.
    #[must_use]
    pub fn diverged(&self) -> bool {
        self.residual_down > 0 || self.residual_up > 0
    }
}

impl ElementTree {
    /// Drains both dirty lists with no hooks and no tracing.
    ///
    /// Returns `true` when any element was processed.
    pub fn process_dirty_elements(&mut self) -> bool {
        self.process_dirty_elements_with(&mut NoHooks, &mut Tracer::none())
            .did_work()
    }

    /// Runs the layout hook, then the downward and upward passes.
    ///
    /// Downward work that hooks queue during the upward pass starts another
    /// round of both passes. The visit caps count every round of the call.
    pub fn process_dirty_elements_with(
        &mut self,
        hooks: &mut dyn PumpHooks,
        tracer: &mut Tracer<'_>,
    ) -> PumpReport {
        self.frame_index += 1;
        let frame = self.frame_index;
        hooks.layout(self);

        let mut report = PumpReport::default();
        #[cfg(feature = "trace-rich")]
        let mut changes = Vec::new();

        let down_cap = self.visit_cap(DirtyFlags::DOWN_COUNT);
        let up_cap = self.visit_cap(DirtyFlags::UP_COUNT);
        let mut diverged = false;
        loop {
            loop {
                if u64::from(report.down_visits) >= down_cap {
                    self.report_divergence("down", frame, tracer);
                    diverged = true;
                    break;
                }
                let Some(idx) = self.down.pop_lowest() else {
                    break;
                };
                self.down_slot[idx as usize] = NO_SLOT;
                report.down_visits += 1;
                let done = self.visit_down(idx, frame, tracer);
                log::trace!("pump down: element {idx} {done:?}");
                #[cfg(feature = "trace-rich")]
                changes.push(crate::trace::ElementChange {
                    element_index: idx,
                    flags: done.bits(),
                });
                if let Some(id) = self.id_at(idx) {
                    hooks.on_processed(self, id, done);
                }
            }

            loop {
                if u64::from(report.up_visits) >= up_cap {
                    self.report_divergence("up", frame, tracer);
                    diverged = true;
                    break;
                }
                let Some(idx) = self.up.pop_highest() else {
                    break;
                };
                self.up_slot[idx as usize] = NO_SLOT;
                report.up_visits += 1;
                let done = self.visit_up(idx);
                log::trace!("pump up: element {idx} {done:?}");
                #[cfg(feature = "trace-rich")]
                changes.push(crate::trace::ElementChange {
                    element_index: idx,
                    flags: done.bits(),
                });
                if let Some(id) = self.id_at(idx) {
                    hooks.on_processed(self, id, done);
                }
            }

            if diverged || self.down.is_empty() {
                break;
            }
            // Hooks queued downward work during the up pass.
            log::debug!(
                "pump frame {frame}: {} elements dirtied downward during the up pass; \
                 running another round",
                self.down.len()
            );
        }

        report.residual_down = saturate_u32(self.down.len());
        report.residual_up = saturate_u32(self.up.len());

        if report.did_work() {
            log::debug!(
                "pump frame {frame}: {} down, {} up, damage {} rects",
                report.down_visits,
                report.up_visits,
                self.damage.len()
            );
        }
        #[cfg(feature = "trace-rich")]
        if !changes.is_empty() {
            tracer.element_changes(frame, &changes);
        }
        tracer.pump(&PumpEvent {
            frame_index: frame,
            down_visits: report.down_visits,
            up_visits: report.up_visits,
            residual_down: report.residual_down,
            residual_up: report.residual_up,
        });
        report
    }

    fn visit_cap(&self, bits: u32) -> u64 {
        (self.live_count() as u64 + 1)
            * u64::from(bits)
            * u64::from(self.pump_config.max_visits_per_element.max(1))
    }

    fn report_divergence(&self, pass: &str, frame: u64, tracer: &mut Tracer<'_>) {
        let (down, up) = self.pending();
        log::warn!(
            "pump {pass} pass hit its visit cap; leaving {down} down / {up} up elements queued"
        );
        tracer.diagnostic(&DiagnosticEvent {
            frame_index: frame,
            kind: DiagnosticKind::PumpDiverged,
            element_index: INVALID,
        });
    }

    /// Clears `bit` on `idx`, returning whether it was set.
    fn take_flag(&mut self, idx: u32, bit: DirtyFlags) -> bool {
        let flags = &mut self.flags[idx as usize];
        let had = flags.contains(bit);
        flags.remove(bit);
        had
    }

    /// Marks `idx` and its parent for bounds recomputation.
    fn update_bounds(&mut self, idx: u32) {
        self.add_dirty(idx, DirtyFlags::BOUNDS);
        let p = self.parent[idx as usize];
        if p != INVALID {
            self.add_dirty(p, DirtyFlags::BOUNDS);
        }
    }

    fn mark_children(&mut self, idx: u32, bit: DirtyFlags) {
        let mut c = self.first_child[idx as usize];
        while c != INVALID {
            self.add_dirty(c, bit);
            c = self.next_sibling[c as usize];
        }
    }

    fn visit_down(&mut self, idx: u32, frame: u64, tracer: &mut Tracer<'_>) -> DirtyFlags {
        let i = idx as usize;
        let p = self.parent[i];
        let mut done = DirtyFlags::empty();

        if self.take_flag(idx, DirtyFlags::RENDER_VISIBILITY) {
            done |= DirtyFlags::RENDER_VISIBILITY;
            let (visible, opacity) = if p == INVALID {
                (true, 1.0)
            } else {
                (
                    self.total_render_visible[p as usize],
                    self.total_opacity[p as usize],
                )
            };
            self.total_render_visible[i] = visible && self.visible[i];
            self.total_opacity[i] = opacity * self.opacity[i];
            self.update_bounds(idx);
            self.add_dirty(idx, DirtyFlags::NEW_BOUNDS);
            self.mark_children(idx, DirtyFlags::RENDER_VISIBILITY);
        }

        if self.take_flag(idx, DirtyFlags::HIT_TEST_VISIBILITY) {
            done |= DirtyFlags::HIT_TEST_VISIBILITY;
            let inherited = p == INVALID || self.total_hit_test_visible[p as usize];
            self.total_hit_test_visible[i] = inherited && self.hit_test_visible[i];
            self.mark_children(idx, DirtyFlags::HIT_TEST_VISIBILITY);
        }

        if self.take_flag(idx, DirtyFlags::LOCAL_TRANSFORM) {
            done |= DirtyFlags::LOCAL_TRANSFORM;
            self.local_transform[i] = self.compute_local_transform(idx);
            self.flags[i] |= DirtyFlags::TRANSFORM;
        }

        if self.take_flag(idx, DirtyFlags::TRANSFORM) {
            done |= DirtyFlags::TRANSFORM;
            // The previous paint area is gone once the transform moves.
            self.invalidate_idx(idx);
            let parent_abs = if p == INVALID {
                Transform3d::IDENTITY
            } else {
                self.absolute_transform[p as usize]
            };
            self.absolute_transform[i] = parent_abs * self.local_transform[i];
            self.update_bounds(idx);
            self.add_dirty(idx, DirtyFlags::NEW_BOUNDS);
            self.flags[i] |= DirtyFlags::CLIP;
            self.mark_children(idx, DirtyFlags::TRANSFORM);
        }

        if self.take_flag(idx, DirtyFlags::LOCAL_CLIP) {
            done |= DirtyFlags::LOCAL_CLIP;
            self.flags[i] |= DirtyFlags::CLIP;
            // A larger clip can reveal descendants whose own bounds did not
            // change.
            self.force_invalidate[i] = true;
            self.update_bounds(idx);
        }

        if self.take_flag(idx, DirtyFlags::CLIP) {
            done |= DirtyFlags::CLIP;
            self.absolute_clip[i] = self.compute_absolute_clip(idx);
            self.mark_children(idx, DirtyFlags::CLIP);
        }

        if self.take_flag(idx, DirtyFlags::CHILDREN_Z_INDICES) {
            done |= DirtyFlags::CHILDREN_Z_INDICES;
            if self.kind[i] == ElementKind::Container {
                self.rebuild_paint_order(idx);
                self.invalidate_idx(idx);
            } else {
                log::warn!("z-order change reported on leaf element {idx}; ignored");
                tracer.diagnostic(&DiagnosticEvent {
                    frame_index: frame,
                    kind: DiagnosticKind::ZOrderOnLeaf,
                    element_index: idx,
                });
            }
        }

        done
    }

    fn visit_up(&mut self, idx: u32) -> DirtyFlags {
        let i = idx as usize;
        let p = self.parent[i];
        let mut done = DirtyFlags::empty();

        if self.take_flag(idx, DirtyFlags::BOUNDS) {
            done |= DirtyFlags::BOUNDS;
            let old_bounds = self.bounds[i];
            let old_subtree = self.subtree_bounds[i];
            self.compute_bounds(idx);

            let mut parent_notified = false;
            if old_subtree != self.subtree_bounds[i] && p != INVALID {
                self.add_dirty(p, DirtyFlags::BOUNDS);
                parent_notified = true;
            }
            if old_bounds != self.bounds[i] {
                if !parent_notified && p != INVALID {
                    self.add_dirty(p, DirtyFlags::BOUNDS);
                }
                // The old area must be repainted even when the element has
                // just become invisible.
                if !is_empty_rect(old_bounds) {
                    self.merge_damage(idx, old_bounds);
                }
                self.invalidate_rect(idx, self.bounds[i]);
            }
            if self.force_invalidate[i] {
                self.force_invalidate[i] = false;
                self.invalidate_idx(idx);
            }
        }

        if self.take_flag(idx, DirtyFlags::NEW_BOUNDS) {
            done |= DirtyFlags::NEW_BOUNDS;
            self.invalidate_rect(idx, self.bounds[i]);
        }

        if self.take_flag(idx, DirtyFlags::INVALIDATE) {
            done |= DirtyFlags::INVALIDATE;
            let mut region = core::mem::take(&mut self.dirty_region[i]);
            for &r in region.rects() {
                self.merge_damage(idx, r);
            }
            // Keep the allocation.
            region.clear();
            self.dirty_region[i] = region;
        }

        // Invalidating above re-enqueued the element for work it has
        // already done.
        if self.up_slot[i] != NO_SLOT && !self.flags[i].needs_up() {
            self.up.remove(self.up_slot[i]);
            self.up_slot[i] = NO_SLOT;
        }

        done
    }

    /// `translate(offset) · translate(origin) · render · translate(−origin)`.
    fn compute_local_transform(&self, idx: u32) -> Transform3d {
        let i = idx as usize;
        let size = self.size[i];
        let origin = self.transform_origin[i];
        let (ox, oy) = (origin.x * size.width, origin.y * size.height);
        let offset = self.offset[i];
        let render = self.render_transform[i];
        if ox == 0.0 && oy == 0.0 {
            return Transform3d::from_translation(offset.x, offset.y, 0.0) * render;
        }
        Transform3d::from_translation(offset.x + ox, offset.y + oy, 0.0)
            * render
            * Transform3d::from_translation(-ox, -oy, 0.0)
    }

    /// Bounding rect of every clip applying to the element's content.
    ///
    /// Ancestor clips do not carry through a projection: they apply after
    /// the flattened plane is mapped, in a different space.
    fn compute_absolute_clip(&self, idx: u32) -> Option<Rect> {
        let i = idx as usize;
        let p = self.parent[i];
        let inherited = if p == INVALID || self.projection[i].is_some() {
            None
        } else {
            self.absolute_clip[p as usize]
        };
        let own = self.clip[i].map(|c| {
            self.absolute_transform[i].transform_rect_bbox(c.bounding_box())
        });
        match (inherited, own) {
            (Some(a), Some(b)) => Some(intersect_nonempty(a, b)),
            (a, b) => a.or(b),
        }
    }

    /// Recomputes `bounds`, `inner_bounds`, and `subtree_bounds`.
    pub(crate) fn compute_bounds(&mut self, idx: u32) {
        let i = idx as usize;
        if !self.total_render_visible[i] {
            self.bounds[i] = Rect::ZERO;
            self.subtree_bounds[i] = Rect::ZERO;
            self.inner_bounds[i] = Rect::ZERO;
            return;
        }

        let abs = self.absolute_transform[i];
        let extents = Rect::from_origin_size(Point::ORIGIN, self.size[i]);
        let mut own = if is_empty_rect(extents) {
            Rect::ZERO
        } else {
            abs.transform_rect_bbox(extents)
        };
        let clip_box = self.clip[i].map(|c| abs.transform_rect_bbox(c.bounding_box()));
        if let Some(cb) = clip_box {
            own = intersect_nonempty(own, cb);
        }

        let mut inner = own;
        let mut c = self.first_child[i];
        while c != INVALID {
            if self.total_render_visible[c as usize] {
                inner = union_nonempty(inner, self.subtree_bounds[c as usize]);
            }
            c = self.next_sibling[c as usize];
        }
        if let Some(cb) = clip_box {
            inner = intersect_nonempty(inner, cb);
        }

        self.inner_bounds[i] = inner;
        self.bounds[i] = self.map_to_composition(idx, own);
        self.subtree_bounds[i] = self.map_to_composition(idx, inner);
    }

    /// Applies the element's own effect padding and projection to a rect in
    /// its content space.
    fn map_to_composition(&self, idx: u32, r: Rect) -> Rect {
        if is_empty_rect(r) {
            return Rect::ZERO;
        }
        let i = idx as usize;
        let mut r = r;
        if let Some(effect) = &self.effect[i] {
            r = r + effect.padding();
        }
        if let Some(projection) = self.projection[i] {
            r = projection.transform_rect_bbox(r);
        }
        r
    }

    /// Maps a rect in the composition space of `idx` up through every
    /// ancestor and unions it, rounded out, into the surface damage.
    pub(crate) fn merge_damage(&mut self, idx: u32, rect: Rect) {
        let mut r = rect;
        let mut a = self.parent[idx as usize];
        while a != INVALID {
            r = self.map_to_composition(a, r);
            a = self.parent[a as usize];
        }
        self.damage.union_rect(round_out(r));
    }

    /// Returns a copy of the element's pending dirty region.
    #[must_use]
    pub fn dirty_region(&self, id: ElementId) -> Region {
        self.validate(id);
        self.dirty_region[id.idx as usize].clone()
    }
}

fn saturate_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
