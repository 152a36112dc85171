// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-list construction with region-based occlusion culling.
//!
//! [`ElementTree::build_render_list`] turns the tree and a damage [`Region`]
//! into a flat, back-to-front [`RenderList`]. In front-to-back mode the tree
//! is walked from the front-most child backwards; every opaque,
//! axis-aligned element removes its inner pixel rect from the region still
//! to be painted, so elements hidden behind it get smaller regions or no node
//! at all.
//!
//! Nodes come in four kinds (see [`RenderOp`]):
//!
//! ```text
//!   Enter(container)      pre-render + own content, then its children
//!     Paint(leaf)         pre-render, content, post-render
//!     PaintSubtree(fx)    whole subtree through an offscreen group
//!   Leave(container)      post-render
//! ```

use alloc::vec::Vec;

use crate::element::{ElementId, ElementTree, is_invisible_opacity};
use crate::region::{Region, round_in, round_out};
use crate::trace::RenderListEvent;

/// What the compositor does for one [`RenderNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderOp {
    /// Push the element's state and paint its own content; its children
    /// follow, then a matching [`Leave`](Self::Leave).
    Enter,
    /// Pop the state pushed by the matching [`Enter`](Self::Enter).
    Leave,
    /// Push, paint, and pop an element none of whose children are drawn.
    Paint,
    /// Render the whole subtree into an intermediate and composite it.
    PaintSubtree,
}

/// One step of a render list.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderNode {
    /// The element.
    pub element: ElementId,
    /// What to do.
    pub op: RenderOp,
    /// The surface-space area this node must repaint.
    pub region: Region,
}

/// A back-to-front sequence of [`RenderNode`]s plus builder statistics.
#[derive(Clone, Debug, Default)]
pub struct RenderList {
    nodes: Vec<RenderNode>,
    visited: u32,
    culled: u32,
}

impl RenderList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            visited: 0,
            culled: 0,
        }
    }

    /// Removes every node and resets the statistics, keeping the allocation.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.visited = 0;
        self.culled = 0;
    }

    /// The nodes, back to front.
    #[must_use]
    pub fn nodes(&self) -> &[RenderNode] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates nodes back to front.
    pub fn iter(&self) -> core::slice::Iter<'_, RenderNode> {
        self.nodes.iter()
    }

    /// Number of nodes with the given op.
    #[must_use]
    pub fn count(&self, op: RenderOp) -> usize {
        self.nodes.iter().filter(|n| n.op == op).count()
    }

    /// Elements the builder looked at.
    #[must_use]
    pub fn visited(&self) -> u32 {
        self.visited
    }

    /// Visited elements that produced no node.
    #[must_use]
    pub fn culled(&self) -> u32 {
        self.culled
    }

    /// Summarizes the list as a trace event.
    #[must_use]
    pub fn event(&self, frame_index: u64) -> RenderListEvent {
        let count = |op| u32::try_from(self.count(op)).unwrap_or(u32::MAX);
        RenderListEvent {
            frame_index,
            visited: self.visited,
            enter: count(RenderOp::Enter),
            paint: count(RenderOp::Paint),
            paint_subtree: count(RenderOp::PaintSubtree),
            culled: self.culled,
        }
    }
}

impl<'a> IntoIterator for &'a RenderList {
    type Item = &'a RenderNode;
    type IntoIter = core::slice::Iter<'a, RenderNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// How the render list is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullMode {
    /// Front-to-back walk with occlusion culling.
    FrontToBack,
    /// Plain back-to-front walk; every visible element gets the full damage.
    BackToFront,
    /// Front-to-back once the tree has at least `min_elements` live
    /// elements, back-to-front below that.
    Auto {
        /// Threshold for switching to occlusion culling.
        min_elements: usize,
    },
}

/// Render-list builder settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CullConfig {
    /// Walk strategy.
    pub mode: CullMode,
}

impl CullConfig {
    /// Occlusion culling for trees of 25 elements or more.
    pub const DEFAULT: Self = Self {
        mode: CullMode::Auto { min_elements: 25 },
    };

    /// Always cull front to back.
    #[must_use]
    pub const fn front_to_back() -> Self {
        Self {
            mode: CullMode::FrontToBack,
        }
    }

    /// Never cull.
    #[must_use]
    pub const fn back_to_front() -> Self {
        Self {
            mode: CullMode::BackToFront,
        }
    }
}

impl Default for CullConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl ElementTree {
    /// Builds the back-to-front render list for `damage` into `out`.
    ///
    /// Uses the state of the last pump; call
    /// [`process_dirty_elements`](Self::process_dirty_elements) first.
    pub fn build_render_list(&self, damage: &Region, config: &CullConfig, out: &mut RenderList) {
        out.clear();
        if self.root == crate::element::INVALID || damage.is_empty() {
            return;
        }
        let front_to_back = match config.mode {
            CullMode::FrontToBack => true,
            CullMode::BackToFront => false,
            CullMode::Auto { min_elements } => self.live_count() >= min_elements,
        };
        if front_to_back {
            let mut work = damage.clone();
            self.cull_front_to_back(self.root, &mut work, out);
            out.nodes.reverse();
        } else {
            self.walk_back_to_front(self.root, damage, out);
        }
    }

    /// Common skip test; returns `false` when the element cannot contribute.
    fn cull_visible(&self, idx: u32, region: &Region) -> bool {
        let i = idx as usize;
        self.total_render_visible[i]
            && !is_invisible_opacity(self.total_opacity[i])
            && region.intersects_rect(self.subtree_bounds[i])
    }

    fn node_id(&self, idx: u32) -> ElementId {
        ElementId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Appends nodes in reverse order (front first). Returns whether any
    /// node was emitted.
    fn cull_front_to_back(&self, idx: u32, work: &mut Region, out: &mut RenderList) -> bool {
        let i = idx as usize;
        out.visited += 1;
        if !self.cull_visible(idx, work) {
            out.culled += 1;
            return false;
        }
        let element = self.node_id(idx);

        if self.is_intermediate(idx) {
            let region = work.intersected_rect(round_out(self.subtree_bounds[i]));
            if region.is_empty() {
                out.culled += 1;
                return false;
            }
            out.nodes.push(RenderNode {
                element,
                op: RenderOp::PaintSubtree,
                region,
            });
            return true;
        }

        // Children may only occlude for the caller when nothing between them
        // and the caller can show through or cut them off.
        let shares_region =
            self.clip[i].is_none() && self.opacity_mask[i].is_none() && self.opacity[i] >= 1.0;
        let mut local;
        let work: &mut Region = if shares_region {
            work
        } else {
            local = work.clone();
            &mut local
        };

        let marker = out.nodes.len();
        out.nodes.push(RenderNode {
            element,
            op: RenderOp::Leave,
            region: Region::new(),
        });

        let mut any_child = false;
        for &c in self.paint_order[i].iter().rev() {
            any_child |= self.cull_front_to_back(c, work, out);
        }

        let own = work.intersected_rect(round_out(self.bounds[i]));
        if any_child {
            out.nodes[marker].region = own.clone();
            out.nodes.push(RenderNode {
                element,
                op: RenderOp::Enter,
                region: own,
            });
        } else {
            out.nodes.truncate(marker);
            if own.is_empty() {
                out.culled += 1;
                return false;
            }
            out.nodes.push(RenderNode {
                element,
                op: RenderOp::Paint,
                region: own,
            });
        }

        if shares_region && self.opaque[i] && self.absolute_transform[i].is_axis_aligned() {
            work.subtract_rect(round_in(self.bounds[i]));
        }
        true
    }

    /// Appends nodes in paint order without occlusion.
    fn walk_back_to_front(&self, idx: u32, region: &Region, out: &mut RenderList) -> bool {
        let i = idx as usize;
        out.visited += 1;
        if !self.cull_visible(idx, region) {
            out.culled += 1;
            return false;
        }
        let element = self.node_id(idx);

        if self.is_intermediate(idx) {
            out.nodes.push(RenderNode {
                element,
                op: RenderOp::PaintSubtree,
                region: region.intersected_rect(round_out(self.subtree_bounds[i])),
            });
            return true;
        }

        let own = region.intersected_rect(round_out(self.bounds[i]));
        let marker = out.nodes.len();
        out.nodes.push(RenderNode {
            element,
            op: RenderOp::Enter,
            region: own.clone(),
        });

        let mut any_child = false;
        for &c in &self.paint_order[i] {
            any_child |= self.walk_back_to_front(c, region, out);
        }

        if any_child {
            out.nodes.push(RenderNode {
                element,
                op: RenderOp::Leave,
                region: own,
            });
        } else if own.is_empty() {
            out.nodes.truncate(marker);
            out.culled += 1;
            return false;
        } else {
            out.nodes[marker].op = RenderOp::Paint;
        }
        true
    }
}
