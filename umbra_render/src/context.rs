// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render context: a transform, clip, and target stack over a root
//! surface.
//!
//! Every push adds one frame; [`Context::pop`] removes it. Drawing calls go
//! to the innermost frame that owns an offscreen group, or to the root
//! surface, with coordinates translated into that surface's pixel space.
//!
//! Coordinates passed to the context are in the current *space*. The root
//! space is the root surface's pixel grid. [`Context::push_plane_group`]
//! opens a new space for content that is later mapped through a projection;
//! ordinary groups keep their parent's space.
//!
//! Each frame carries two clips. The *clip* limits drawing. The *extent* is
//! the same clip without the damage limit pushed by
//! [`Context::push_damage_clip`]; [`Context::push_effect_group`] captures
//! everything inside it, so effects sample the same input however little of
//! their output is repainted.

use kurbo::{Point, Rect, Vec2};
use umbra_core::color::Color;
use umbra_core::element::ShaderEffect;
use umbra_core::region::{is_empty_rect, round_out};
use umbra_core::transform::Transform3d;

use crate::backend::RenderBackend;
use crate::error::BackendError;

/// What [`Context::push_group`] and [`Context::push_plane_group`] pushed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupOutcome {
    /// An offscreen surface now receives drawing.
    Allocated,
    /// The group covered no pixels; an empty clip was pushed.
    Empty,
    /// The backend could not allocate the surface; only the clip was
    /// pushed and drawing goes straight to the enclosing target.
    Failed(BackendError),
}

impl GroupOutcome {
    /// Whether a surface was allocated.
    #[must_use]
    pub fn is_allocated(self) -> bool {
        matches!(self, Self::Allocated)
    }
}

#[derive(Clone, Copy, Debug)]
struct State {
    /// Transform from the space's coordinates to its pixels; absolute
    /// transforms are applied after it.
    base: Transform3d,
    transform: Transform3d,
    clip: Rect,
    /// Clip without damage limits.
    extent: Rect,
}

struct Group<S> {
    surface: S,
    origin: Point,
}

struct Frame<S> {
    state: State,
    group: Option<Group<S>>,
}

/// A transform, clip, and group stack bound to a backend and a root
/// surface.
pub struct Context<'a, B: RenderBackend> {
    backend: &'a mut B,
    root: &'a mut B::Surface,
    root_state: State,
    frames: Vec<Frame<B::Surface>>,
}

impl<B: RenderBackend> core::fmt::Debug for Context<'_, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.frames.len())
            .field("clip", &self.clip())
            .finish_non_exhaustive()
    }
}

impl<'a, B: RenderBackend> Context<'a, B> {
    /// Creates a context drawing into `root`, clipped to its extent.
    pub fn new(backend: &'a mut B, root: &'a mut B::Surface) -> Self {
        let (w, h) = backend.surface_size(root);
        let full = Rect::new(0.0, 0.0, f64::from(w), f64::from(h));
        Self {
            backend,
            root,
            root_state: State {
                base: Transform3d::IDENTITY,
                transform: Transform3d::IDENTITY,
                clip: full,
                extent: full,
            },
            frames: Vec::new(),
        }
    }

    /// Returns the backend.
    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    /// Number of frames pushed and not yet popped.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn state(&self) -> State {
        self.frames.last().map_or(self.root_state, |f| f.state)
    }

    /// Current transform from local coordinates to the current space.
    #[must_use]
    pub fn transform(&self) -> Transform3d {
        self.state().transform
    }

    /// Transform of the current space, under which absolute transforms are
    /// applied.
    #[must_use]
    pub fn base(&self) -> Transform3d {
        self.state().base
    }

    /// Current clip in the current space.
    #[must_use]
    pub fn clip(&self) -> Rect {
        self.state().clip
    }

    fn push_state(&mut self, state: State) {
        self.frames.push(Frame { state, group: None });
    }

    /// Pushes `transform` after the current transform.
    pub fn push_transform(&mut self, transform: Transform3d) {
        let mut s = self.state();
        s.transform = s.transform * transform;
        self.push_state(s);
    }

    /// Pushes an element's absolute transform, applied under the current
    /// space's base transform.
    pub fn push_absolute_transform(&mut self, transform: Transform3d) {
        let mut s = self.state();
        s.transform = s.base * transform;
        self.push_state(s);
    }

    /// Pushes a transform that every later absolute transform is applied
    /// under, such as a host's extra surface transform.
    pub fn push_root_transform(&mut self, transform: Transform3d) {
        let mut s = self.state();
        s.base = s.base * transform;
        s.transform = s.base;
        self.push_state(s);
    }

    /// Intersects the clip with `rect`, in local coordinates, mapped by the
    /// current transform and bounded.
    pub fn push_clip(&mut self, rect: Rect) {
        let mut s = self.state();
        let rect = s.transform.transform_rect_bbox(rect);
        s.clip = clip_rect(s.clip, rect);
        s.extent = clip_rect(s.extent, rect);
        self.push_state(s);
    }

    /// Limits drawing to `rect`, in the current space, without narrowing
    /// what [`push_effect_group`](Self::push_effect_group) captures.
    pub fn push_damage_clip(&mut self, rect: Rect) {
        let mut s = self.state();
        s.clip = clip_rect(s.clip, rect);
        self.push_state(s);
    }

    /// Pushes an offscreen group covering `bounds`, in the current space.
    ///
    /// The surface covers the pixels of `bounds` inside the current clip.
    /// When it cannot be allocated the failure is logged and only the clip
    /// is pushed, so content still draws, ungrouped.
    pub fn push_group(&mut self, bounds: Rect) -> GroupOutcome {
        let mut s = self.state();
        let rect = round_out(clip_rect(s.clip, bounds));
        s.clip = rect;
        s.extent = clip_rect(s.extent, bounds);
        self.push_surface(s, rect)
    }

    /// Pushes an offscreen group covering `bounds` inside the current
    /// extent, for content a blur, shadow, or shader reads beyond the
    /// pixels it writes.
    ///
    /// Damage clips do not shrink the group; they apply when its result is
    /// composited. When allocation fails the group's pixels are clipped as
    /// before, so ungrouped drawing stays inside the damage.
    pub fn push_effect_group(&mut self, bounds: Rect) -> GroupOutcome {
        let enclosing = self.state();
        let rect = round_out(clip_rect(enclosing.extent, bounds));
        let group = State {
            clip: rect,
            extent: rect,
            ..enclosing
        };
        let outcome = self.push_surface(group, rect);
        if let (GroupOutcome::Failed(_), Some(frame)) = (outcome, self.frames.last_mut()) {
            frame.state.clip = clip_rect(enclosing.clip, rect);
        }
        outcome
    }

    /// Pushes an offscreen group that starts a new space, for content
    /// composited later through [`project`](Self::project).
    ///
    /// Inside the group both the base and the current transform are the
    /// identity, and the clip is `bounds` rounded out. When allocation fails
    /// the enclosing space is kept, so content draws unprojected.
    pub fn push_plane_group(&mut self, bounds: Rect) -> GroupOutcome {
        let enclosing = self.state();
        let rect = round_out(bounds);
        let plane = State {
            base: Transform3d::IDENTITY,
            transform: Transform3d::IDENTITY,
            clip: rect,
            extent: rect,
        };
        let outcome = self.push_surface(plane, rect);
        if let (GroupOutcome::Failed(_), Some(frame)) = (outcome, self.frames.last_mut()) {
            frame.state = enclosing;
        }
        outcome
    }

    fn push_surface(&mut self, state: State, rect: Rect) -> GroupOutcome {
        if is_empty_rect(rect) {
            self.push_state(State {
                clip: Rect::ZERO,
                ..state
            });
            return GroupOutcome::Empty;
        }
        let (w, h) = pixel_size(rect);
        match self.backend.create_surface(w, h) {
            Ok(surface) => {
                log::debug!("allocated {w}x{h} group at ({}, {})", rect.x0, rect.y0);
                self.frames.push(Frame {
                    state,
                    group: Some(Group {
                        surface,
                        origin: rect.origin(),
                    }),
                });
                GroupOutcome::Allocated
            }
            Err(e) => {
                log::warn!("could not allocate {w}x{h} group ({e}); drawing ungrouped");
                self.push_state(state);
                GroupOutcome::Failed(e)
            }
        }
    }

    /// Pops the innermost frame.
    ///
    /// Returns the finished surface and its placement in the enclosing space
    /// when the frame owned a group. Popping with nothing pushed returns
    /// `None`.
    pub fn pop(&mut self) -> Option<(B::Surface, Rect)> {
        let group = self.frames.pop()?.group?;
        let (w, h) = self.backend.surface_size(&group.surface);
        let placement = Rect::from_origin_size(
            group.origin,
            (f64::from(w), f64::from(h)),
        );
        Some((group.surface, placement))
    }

    /// Allocates a transparent surface, for example for an opacity mask.
    ///
    /// # Errors
    ///
    /// Passes on the backend's [`BackendError`].
    pub fn create_surface(&mut self, width: u32, height: u32) -> Result<B::Surface, BackendError> {
        self.backend.create_surface(width, height)
    }

    /// Whether the backend can run `effect`.
    pub fn supports_shader(&mut self, effect: &ShaderEffect) -> bool {
        self.backend.supports_shader(effect)
    }

    // -- Drawing --

    fn target(&mut self) -> Target<'_, B> {
        let state = self.state();
        let (surface, origin) = self
            .frames
            .iter_mut()
            .rev()
            .find_map(|f| f.group.as_mut().map(|g| (&mut g.surface, g.origin)))
            .unwrap_or((&mut *self.root, Point::ORIGIN));
        Target {
            backend: &mut *self.backend,
            surface,
            offset: -origin.to_vec2(),
            state,
        }
    }

    /// Fills the current clip with `color`, replacing what is there.
    pub fn clear(&mut self, color: Color) {
        let t = self.target();
        t.backend.clear(t.surface, t.state.clip + t.offset, color);
    }

    /// Fills `rect`, in local coordinates, with `color`.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let t = self.target();
        let transform = t.shift() * t.state.transform;
        t.backend
            .fill_rect(t.surface, t.state.clip + t.offset, &transform, rect, color);
    }

    /// Copies premultiplied BGRA rows to `dest`, in the current space.
    pub fn blit(&mut self, pixels: &[u8], stride: usize, dest: Rect) {
        let t = self.target();
        t.backend
            .blit(t.surface, t.state.clip + t.offset, pixels, stride, dest + t.offset);
    }

    /// Composites `src` with its top-left corner at `at`.
    pub fn blend(&mut self, src: &B::Surface, alpha: f32, at: Point) {
        let t = self.target();
        let p = at + t.offset;
        t.backend
            .blend(t.surface, t.state.clip + t.offset, src, alpha, p.x, p.y);
    }

    /// Composites `src` scaled by the alpha of `mask`, both at `at`.
    pub fn blend_masked(&mut self, src: &B::Surface, mask: &B::Surface, alpha: f32, at: Point) {
        let t = self.target();
        let p = at + t.offset;
        t.backend.blend_masked(
            t.surface,
            t.state.clip + t.offset,
            src,
            mask,
            alpha,
            p.x,
            p.y,
        );
    }

    /// Composites `src`, whose top-left corner is `at` in its own plane,
    /// through `matrix` into the current space.
    pub fn project(&mut self, src: &B::Surface, matrix: &Transform3d, alpha: f32, at: Point) {
        let t = self.target();
        let matrix = t.shift() * *matrix;
        t.backend.project(
            t.surface,
            t.state.clip + t.offset,
            src,
            &matrix,
            alpha,
            at.x,
            at.y,
        );
    }

    /// Composites a Gaussian blur of `src`.
    pub fn blur(&mut self, src: &B::Surface, radius: f64, at: Point) {
        let t = self.target();
        let p = at + t.offset;
        t.backend
            .blur(t.surface, t.state.clip + t.offset, src, radius, p.x, p.y);
    }

    /// Composites `src` over its drop shadow.
    pub fn drop_shadow(
        &mut self,
        src: &B::Surface,
        offset: Vec2,
        radius: f64,
        color: Color,
        at: Point,
    ) {
        let t = self.target();
        let p = at + t.offset;
        t.backend.drop_shadow(
            t.surface,
            t.state.clip + t.offset,
            src,
            offset,
            radius,
            color,
            p.x,
            p.y,
        );
    }

    /// Runs `effect` over `src` and composites the result.
    pub fn shader_effect(&mut self, src: &B::Surface, effect: &ShaderEffect, at: Point) {
        let t = self.target();
        let p = at + t.offset;
        t.backend
            .shader_effect(t.surface, t.state.clip + t.offset, src, effect, p.x, p.y);
    }
}

struct Target<'t, B: RenderBackend> {
    backend: &'t mut B,
    surface: &'t mut B::Surface,
    offset: Vec2,
    state: State,
}

impl<B: RenderBackend> Target<'_, B> {
    fn shift(&self) -> Transform3d {
        Transform3d::from_translation(self.offset.x, self.offset.y, 0.0)
    }
}

/// Intersection that collapses to [`Rect::ZERO`] when disjoint.
fn clip_rect(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if is_empty_rect(r) { Rect::ZERO } else { r }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "group rects are rounded and bounded by the clip"
)]
fn pixel_size(rect: Rect) -> (u32, u32) {
    (rect.width().max(0.0) as u32, rect.height().max(0.0) as u32)
}
