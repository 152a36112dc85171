// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the pump and the render loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! pump and compositor instrumentation calls at each stage. All method bodies
//! default to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! Timestamps are host-supplied nanoseconds; this crate never reads a clock.
//! [`FrameSummaryBuilder`] collects phase timestamps during a frame and
//! produces a [`FrameSummary`] at the end.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`ElementChange`] and
//!   [`DamageRect`] events plus the corresponding `TraceSink` methods.

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a frame is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Collaborator layout hook, before the downward pump.
    Layout,
    /// Downward pump (visibility, transforms, clips, z-order).
    Down,
    /// Upward pump (bounds and invalidation).
    Up,
    /// Render-list construction.
    Cull,
    /// Executing the render list against the backend.
    Render,
}

impl PhaseKind {
    /// All phases, in frame order.
    pub const ALL: [Self; 5] = [Self::Layout, Self::Down, Self::Up, Self::Cull, Self::Render];

    /// Short lowercase name, as used in logs and exported traces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Layout => "layout",
            Self::Down => "down",
            Self::Up => "up",
            Self::Cull => "cull",
            Self::Render => "render",
        }
    }
}

/// A contract violation or degraded path that processing recovered from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// `CHILDREN_Z_INDICES` was set on a leaf element.
    ZOrderOnLeaf,
    /// A pump pass hit its visit cap and left work enqueued.
    PumpDiverged,
    /// A backend could not apply an effect and blended the input instead.
    EffectFallback,
    /// An offscreen group could not be allocated; only its clip was pushed.
    GroupAllocationFailed,
}

impl DiagnosticKind {
    /// Short name, as used in logs and exported traces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ZOrderOnLeaf => "z_order_on_leaf",
            Self::PumpDiverged => "pump_diverged",
            Self::EffectFallback => "effect_fallback",
            Self::GroupAllocationFailed => "group_allocation_failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Marks the beginning of a frame phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase, in nanoseconds.
    pub timestamp_ns: u64,
}

/// Marks the end of a frame phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase, in nanoseconds.
    pub timestamp_ns: u64,
}

/// Emitted at the end of every pump call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Elements dequeued by the downward pass.
    pub down_visits: u32,
    /// Elements dequeued by the upward pass.
    pub up_visits: u32,
    /// Elements left in the downward list.
    pub residual_down: u32,
    /// Elements left in the upward list.
    pub residual_up: u32,
}

/// Emitted after a render list is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderListEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// Elements the builder looked at.
    pub visited: u32,
    /// `Enter` nodes.
    pub enter: u32,
    /// `Paint` nodes.
    pub paint: u32,
    /// `PaintSubtree` nodes.
    pub paint_subtree: u32,
    /// Visited elements that produced no node (off-region, hidden, or
    /// occluded).
    pub culled: u32,
}

/// Emitted when processing recovers from a contract violation or degrades.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticEvent {
    /// Frame counter.
    pub frame_index: u64,
    /// What happened.
    pub kind: DiagnosticKind,
    /// Raw slot index of the element involved, or `u32::MAX`.
    pub element_index: u32,
}

/// Per-frame timing summary produced by [`FrameSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSummary {
    /// Frame counter.
    pub frame_index: u64,
    /// Layout hook duration in nanoseconds (0 if not measured).
    pub layout_ns: u64,
    /// Downward pump duration in nanoseconds (0 if not measured).
    pub down_ns: u64,
    /// Upward pump duration in nanoseconds (0 if not measured).
    pub up_ns: u64,
    /// Render-list construction duration in nanoseconds (0 if not measured).
    pub cull_ns: u64,
    /// Rendering duration in nanoseconds (0 if not measured).
    pub render_ns: u64,
    /// Number of damage rectangles painted.
    pub damage_rects: u32,
}

/// A per-element record of the dirty bits one pump visit processed.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementChange {
    /// Raw slot index of the element.
    pub element_index: u32,
    /// Bits of [`DirtyFlags`](crate::dirty::DirtyFlags) that were processed.
    pub flags: u16,
}

/// An axis-aligned damage rectangle.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

#[cfg(feature = "trace-rich")]
impl DamageRect {
    /// Converts an integer-aligned rect, saturating out-of-range values.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "damage rects are rounded out and saturate on conversion"
    )]
    #[must_use]
    pub fn from_rect(r: kurbo::Rect) -> Self {
        Self {
            x: r.x0 as i32,
            y: r.y0 as i32,
            width: r.width().max(0.0) as u32,
            height: r.height().max(0.0) as u32,
        }
    }
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the pump and the compositor.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the beginning of a frame phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a frame phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called at the end of every pump call.
    fn on_pump(&mut self, e: &PumpEvent) {
        _ = e;
    }

    /// Called after a render list is built.
    fn on_render_list(&mut self, e: &RenderListEvent) {
        _ = e;
    }

    /// Called when processing recovers from a problem.
    fn on_diagnostic(&mut self, e: &DiagnosticEvent) {
        _ = e;
    }

    /// Called with a per-frame timing summary.
    fn on_frame_summary(&mut self, s: &FrameSummary) {
        _ = s;
    }

    /// Called with per-visit element changes (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_element_changes(&mut self, frame_index: u64, changes: &[ElementChange]) {
        _ = (frame_index, changes);
    }

    /// Called with the frame's damage rectangles (requires `trace-rich`
    /// feature).
    #[cfg(feature = "trace-rich")]
    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        _ = (frame_index, rects);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Whether events are delivered anywhere.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PumpEvent`].
    #[inline]
    pub fn pump(&mut self, e: &PumpEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pump(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`RenderListEvent`].
    #[inline]
    pub fn render_list(&mut self, e: &RenderListEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_render_list(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`DiagnosticEvent`].
    #[inline]
    pub fn diagnostic(&mut self, e: &DiagnosticEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_diagnostic(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameSummary`].
    #[inline]
    pub fn frame_summary(&mut self, s: &FrameSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_frame_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits element changes (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn element_changes(&mut self, frame_index: u64, changes: &[ElementChange]) {
        if let Some(s) = &mut self.sink {
            s.on_element_changes(frame_index, changes);
        }
    }

    /// Emits damage rectangles (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        if let Some(s) = &mut self.sink {
            s.on_damage_rects(frame_index, rects);
        }
    }
}

// ---------------------------------------------------------------------------
// FrameSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects phase timestamps during a frame and produces a [`FrameSummary`].
#[derive(Debug)]
pub struct FrameSummaryBuilder {
    frame_index: u64,
    phase_starts: [Option<u64>; 5],
    phase_ends: [Option<u64>; 5],
    damage_rects: u32,
}

impl FrameSummaryBuilder {
    /// Starts building a summary for the given frame.
    #[must_use]
    pub fn new(frame_index: u64) -> Self {
        Self {
            frame_index,
            phase_starts: [None; 5],
            phase_ends: [None; 5],
            damage_rects: 0,
        }
    }

    /// Records the start of a phase.
    pub fn phase_begin(&mut self, phase: PhaseKind, timestamp_ns: u64) {
        self.phase_starts[phase_index(phase)] = Some(timestamp_ns);
    }

    /// Records the end of a phase.
    pub fn phase_end(&mut self, phase: PhaseKind, timestamp_ns: u64) {
        self.phase_ends[phase_index(phase)] = Some(timestamp_ns);
    }

    /// Sets the number of damage rectangles painted.
    pub fn set_damage_rects(&mut self, count: u32) {
        self.damage_rects = count;
    }

    /// Consumes the builder and produces the final [`FrameSummary`].
    #[must_use]
    pub fn finish(self) -> FrameSummary {
        FrameSummary {
            frame_index: self.frame_index,
            layout_ns: self.phase_duration(PhaseKind::Layout),
            down_ns: self.phase_duration(PhaseKind::Down),
            up_ns: self.phase_duration(PhaseKind::Up),
            cull_ns: self.phase_duration(PhaseKind::Cull),
            render_ns: self.phase_duration(PhaseKind::Render),
            damage_rects: self.damage_rects,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::Layout => 0,
        PhaseKind::Down => 1,
        PhaseKind::Up => 2,
        PhaseKind::Cull => 3,
        PhaseKind::Render => 4,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pump() -> PumpEvent {
        PumpEvent {
            frame_index: 42,
            down_visits: 10,
            up_visits: 12,
            residual_down: 0,
            residual_up: 0,
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_pump(&sample_pump());
        sink.on_diagnostic(&DiagnosticEvent {
            frame_index: 0,
            kind: DiagnosticKind::ZOrderOnLeaf,
            element_index: 3,
        });
        sink.on_frame_summary(&FrameSummary::default());
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        assert!(!tracer.is_enabled());
        tracer.pump(&sample_pump());
        tracer.render_list(&RenderListEvent::default());
    }

    #[test]
    fn phase_names_are_distinct() {
        for (i, a) in PhaseKind::ALL.iter().enumerate() {
            assert_eq!(phase_index(*a), i);
            for b in &PhaseKind::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn summary_builder_computes_durations() {
        let mut builder = FrameSummaryBuilder::new(42);

        builder.phase_begin(PhaseKind::Layout, 1_000_000);
        builder.phase_end(PhaseKind::Layout, 1_000_100);
        builder.phase_begin(PhaseKind::Down, 1_000_100);
        builder.phase_end(PhaseKind::Down, 1_000_500);
        builder.phase_begin(PhaseKind::Up, 1_000_500);
        builder.phase_end(PhaseKind::Up, 1_000_700);
        builder.phase_begin(PhaseKind::Cull, 1_000_700);
        builder.phase_end(PhaseKind::Cull, 1_000_750);
        builder.phase_begin(PhaseKind::Render, 1_000_750);
        builder.phase_end(PhaseKind::Render, 1_002_750);
        builder.set_damage_rects(3);

        let summary = builder.finish();
        assert_eq!(summary.layout_ns, 100);
        assert_eq!(summary.down_ns, 400);
        assert_eq!(summary.up_ns, 200);
        assert_eq!(summary.cull_ns, 50);
        assert_eq!(summary.render_ns, 2000);
        assert_eq!(summary.damage_rects, 3);
        assert_eq!(summary.frame_index, 42);
    }

    #[test]
    fn summary_builder_missing_phases_are_zero() {
        let summary = FrameSummaryBuilder::new(1).finish();
        assert_eq!(summary, FrameSummary {
            frame_index: 1,
            ..FrameSummary::default()
        });
    }

    #[test]
    fn summary_builder_tolerates_reversed_timestamps() {
        let mut builder = FrameSummaryBuilder::new(0);
        builder.phase_begin(PhaseKind::Render, 500);
        builder.phase_end(PhaseKind::Render, 100);
        assert_eq!(builder.finish().render_ns, 0);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            pumps: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_pump(&mut self, e: &PumpEvent) {
                self.pumps.push(e.frame_index);
            }
        }

        let mut sink = RecordingSink { pumps: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        assert!(tracer.is_enabled());
        tracer.pump(&sample_pump());
        // Access sink after tracer is dropped.
        drop(tracer);
        assert_eq!(sink.pumps, &[42]);
    }
}
