// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-window driver tying the tree, the compositor, and a backend target
//! together.

use std::time::Instant;

use umbra_core::dirty::DirtyFlags;
use umbra_core::element::{ElementId, ElementTree, NoHooks, PumpHooks};
use umbra_core::region::Region;
use umbra_core::trace::{FrameSummaryBuilder, PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer};
use umbra_core::transform::Transform3d;

use crate::backend::RenderBackend;
use crate::compositor::{Compositor, CompositorConfig, ElementRenderer};
use crate::context::Context;
use crate::error::BackendError;
use crate::sync::{DeferredQueue, DeferredSender};

/// Owns an element tree and repaints its damage into a backend surface.
///
/// A frame on the UI thread is:
///
/// ```text
///   surface.process_dirty_elements()   deferred posts, then the pump
///   surface.paint(..)                  damage -> render list -> target
/// ```
pub struct Surface<B: RenderBackend> {
    tree: ElementTree,
    compositor: Compositor,
    queue: DeferredQueue,
    backend: B,
    target: B::Surface,
    epoch: Instant,
    frame: Option<FrameSummaryBuilder>,
}

impl<B: RenderBackend> core::fmt::Debug for Surface<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Surface")
            .field("size", &self.size())
            .field("compositor", &self.compositor)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<B: RenderBackend> Surface<B> {
    /// Creates a surface with an empty tree and a `width` × `height` target.
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the target cannot be allocated.
    pub fn new(
        mut backend: B,
        width: u32,
        height: u32,
        config: CompositorConfig,
    ) -> Result<Self, BackendError> {
        let target = backend.create_surface(width, height)?;
        Ok(Self {
            tree: ElementTree::new(),
            compositor: Compositor::new(config),
            queue: DeferredQueue::new(),
            backend,
            target,
            epoch: Instant::now(),
            frame: None,
        })
    }

    /// Returns the tree.
    #[must_use]
    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    /// Returns the tree for mutation.
    pub fn tree_mut(&mut self) -> &mut ElementTree {
        &mut self.tree
    }

    /// Returns the compositor.
    #[must_use]
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Returns the compositor for reconfiguration.
    pub fn compositor_mut(&mut self) -> &mut Compositor {
        &mut self.compositor
    }

    /// Returns a handle other threads can post mutations and releases
    /// through.
    #[must_use]
    pub fn deferred_sender(&self) -> DeferredSender {
        self.queue.sender()
    }

    /// Returns the backend.
    pub fn backend(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Returns the painted target.
    #[must_use]
    pub fn target(&self) -> &B::Surface {
        &self.target
    }

    /// Target size in pixels.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.backend.surface_size(&self.target)
    }

    /// Replaces the target with a new transparent one and damages all of it.
    ///
    /// # Errors
    ///
    /// Returns the backend's error and keeps the old target when the new
    /// one cannot be allocated.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        self.target = self.backend.create_surface(width, height)?;
        self.tree.add_damage(kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(width),
            f64::from(height),
        ));
        Ok(())
    }

    /// Runs posted mutations, drops released objects, and pumps the tree.
    ///
    /// Returns `true` when any element was processed.
    pub fn process_dirty_elements(&mut self) -> bool {
        self.process_dirty_elements_with(&mut NoHooks, &mut Tracer::none())
    }

    /// Like [`process_dirty_elements`](Self::process_dirty_elements), with
    /// collaborator hooks and tracing.
    ///
    /// The time spent in [`PumpHooks::layout`] is reported as the frame's
    /// layout phase.
    pub fn process_dirty_elements_with(
        &mut self,
        hooks: &mut dyn PumpHooks,
        tracer: &mut Tracer<'_>,
    ) -> bool {
        self.queue.run_pending(&mut self.tree);
        self.queue.drain_releases();

        let frame_index = self.tree.frame_index() + 1;
        let mut timed = TimedHooks {
            inner: hooks,
            epoch: self.epoch,
            layout: None,
        };
        let report = self.tree.process_dirty_elements_with(&mut timed, tracer);

        let mut frame = FrameSummaryBuilder::new(frame_index);
        if let Some((begin, end)) = timed.layout {
            frame.phase_begin(PhaseKind::Layout, begin);
            frame.phase_end(PhaseKind::Layout, end);
            tracer.phase_begin(&PhaseBeginEvent {
                frame_index,
                phase: PhaseKind::Layout,
                timestamp_ns: begin,
            });
            tracer.phase_end(&PhaseEndEvent {
                frame_index,
                phase: PhaseKind::Layout,
                timestamp_ns: end,
            });
        }
        self.frame = Some(frame);

        log::debug!(
            "frame {frame_index}: {} down, {} up",
            report.down_visits,
            report.up_visits
        );
        report.did_work()
    }

    /// Paints the accumulated damage and returns it.
    ///
    /// The damage is in the tree's root space; `extra_transform` maps that
    /// space onto the target. Returns an empty region when nothing needed
    /// repainting.
    pub fn paint<R>(
        &mut self,
        renderer: &mut R,
        extra_transform: Option<Transform3d>,
        tracer: &mut Tracer<'_>,
    ) -> Region
    where
        R: ElementRenderer<B> + ?Sized,
    {
        let damage = self.tree.take_damage();
        let frame_index = self.tree.frame_index();
        let mut frame = self
            .frame
            .take()
            .unwrap_or_else(|| FrameSummaryBuilder::new(frame_index));
        if damage.is_empty() {
            return damage;
        }

        let begin = nanos_since(self.epoch);
        tracer.phase_begin(&PhaseBeginEvent {
            frame_index,
            phase: PhaseKind::Render,
            timestamp_ns: begin,
        });
        let mut ctx = Context::new(&mut self.backend, &mut self.target);
        self.compositor.paint(
            &self.tree,
            &mut ctx,
            renderer,
            &damage,
            extra_transform,
            tracer,
        );
        let end = nanos_since(self.epoch);
        tracer.phase_end(&PhaseEndEvent {
            frame_index,
            phase: PhaseKind::Render,
            timestamp_ns: end,
        });

        frame.phase_begin(PhaseKind::Render, begin);
        frame.phase_end(PhaseKind::Render, end);
        frame.set_damage_rects(u32::try_from(damage.len()).unwrap_or(u32::MAX));
        tracer.frame_summary(&frame.finish());
        damage
    }
}

struct TimedHooks<'h> {
    inner: &'h mut dyn PumpHooks,
    epoch: Instant,
    layout: Option<(u64, u64)>,
}

impl PumpHooks for TimedHooks<'_> {
    fn layout(&mut self, tree: &mut ElementTree) {
        let begin = nanos_since(self.epoch);
        self.inner.layout(tree);
        self.layout = Some((begin, nanos_since(self.epoch)));
    }

    fn on_processed(&mut self, tree: &mut ElementTree, id: ElementId, flags: DirtyFlags) {
        self.inner.on_processed(tree, id, flags);
    }
}

fn nanos_since(epoch: Instant) -> u64 {
    u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use kurbo::{Rect, Size, Vec2};
    use umbra_core::color::Color;
    use umbra_core::element::ElementKind;

    use super::*;
    use crate::compositor::SolidFills;
    use crate::image::Image;
    use crate::software::SoftwareBackend;

    const RED: [u8; 4] = [0, 0, 255, 255];
    const CLEAR: [u8; 4] = [0, 0, 0, 0];

    fn surface() -> (Surface<SoftwareBackend>, ElementId, SolidFills) {
        let config = CompositorConfig {
            background: Some(Color::TRANSPARENT),
            ..CompositorConfig::DEFAULT
        };
        let mut surface = Surface::new(SoftwareBackend::default(), 64, 64, config).unwrap();
        let tree = surface.tree_mut();
        let root = tree.create_element(ElementKind::Container);
        tree.set_size(root, Size::new(64.0, 64.0));
        let leaf = tree.create_element(ElementKind::Leaf);
        tree.set_size(leaf, Size::new(10.0, 10.0));
        tree.add_child(root, leaf);
        tree.set_root(root);
        let mut fills = SolidFills::new();
        fills.set_fill(leaf, Color::RED);
        (surface, leaf, fills)
    }

    fn pixel(surface: &Surface<SoftwareBackend>, x: u32, y: u32) -> [u8; 4] {
        let target: &Image = surface.target();
        target.pixel(x, y)
    }

    #[test]
    fn paints_only_new_damage() {
        let (mut s, leaf, mut fills) = surface();
        assert!(s.process_dirty_elements(), "first pump attaches the tree");
        let damage = s.paint(&mut fills, None, &mut Tracer::none());
        assert!(damage.contains_rect(Rect::new(0.0, 0.0, 64.0, 64.0)));
        assert_eq!(pixel(&s, 5, 5), RED);

        assert!(!s.process_dirty_elements(), "nothing changed");
        assert!(s.paint(&mut fills, None, &mut Tracer::none()).is_empty());

        s.tree_mut().set_offset(leaf, Vec2::new(20.0, 20.0));
        s.process_dirty_elements();
        let damage = s.paint(&mut fills, None, &mut Tracer::none());
        assert!(damage.contains_rect(Rect::new(0.0, 0.0, 10.0, 10.0)), "old area");
        assert!(damage.contains_rect(Rect::new(20.0, 20.0, 30.0, 30.0)), "new area");
        assert_eq!(pixel(&s, 5, 5), CLEAR, "old area cleared");
        assert_eq!(pixel(&s, 25, 25), RED);
    }

    #[test]
    fn deferred_posts_apply_before_the_pump() {
        let (mut s, leaf, mut fills) = surface();
        s.process_dirty_elements();
        s.paint(&mut fills, None, &mut Tracer::none());

        let sender = s.deferred_sender();
        std::thread::spawn(move || {
            sender.post(move |tree| tree.set_visible(leaf, false));
        })
        .join()
        .unwrap();

        assert!(s.process_dirty_elements(), "posted change pumped");
        assert!(!s.tree().is_render_visible(leaf));
        s.paint(&mut fills, None, &mut Tracer::none());
        assert_eq!(pixel(&s, 5, 5), CLEAR);
    }

    #[test]
    fn resize_damages_the_new_target() {
        let (mut s, _, mut fills) = surface();
        s.process_dirty_elements();
        s.paint(&mut fills, None, &mut Tracer::none());

        s.resize(32, 16).unwrap();
        assert_eq!(s.size(), (32, 16));
        s.process_dirty_elements();
        let damage = s.paint(&mut fills, None, &mut Tracer::none());
        assert_eq!(damage.bounds(), Rect::new(0.0, 0.0, 32.0, 16.0));
        assert_eq!(pixel(&s, 5, 5), RED, "repainted after resize");
    }

    #[test]
    fn resize_failure_keeps_the_old_target() {
        let (mut s, _, _) = surface();
        assert!(s.resize(0, 10).is_err(), "empty size rejected");
        assert_eq!(s.size(), (64, 64));
    }

    #[cfg(feature = "trace")]
    #[test]
    fn frame_summary_reports_phases() {
        use umbra_core::trace::{FrameSummary, TraceSink};

        #[derive(Default)]
        struct Summaries(Vec<FrameSummary>);
        impl TraceSink for Summaries {
            fn on_frame_summary(&mut self, s: &FrameSummary) {
                self.0.push(*s);
            }
        }

        let (mut s, _, mut fills) = surface();
        let mut sink = Summaries::default();
        s.process_dirty_elements_with(&mut NoHooks, &mut Tracer::new(&mut sink));
        s.paint(&mut fills, None, &mut Tracer::new(&mut sink));
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.0[0].frame_index, 1);
        assert!(sink.0[0].damage_rects >= 1, "{:?}", sink.0[0]);
    }
}
