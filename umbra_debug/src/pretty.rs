// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`] destination (default: stderr).

use std::io::Write;

use umbra_core::trace::{
    DamageRect, DiagnosticEvent, ElementChange, FrameSummary, PhaseBeginEvent, PhaseEndEvent,
    PumpEvent, RenderListEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`] destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            us(e.timestamp_ns),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] frame={} {} at {:.1}µs",
            e.frame_index,
            e.phase.name(),
            us(e.timestamp_ns),
        );
    }

    fn on_pump(&mut self, e: &PumpEvent) {
        let _ = writeln!(
            self.writer,
            "[pump] frame={} down={} up={} residual={}/{}",
            e.frame_index, e.down_visits, e.up_visits, e.residual_down, e.residual_up,
        );
    }

    fn on_render_list(&mut self, e: &RenderListEvent) {
        let _ = writeln!(
            self.writer,
            "[list] frame={} visited={} enter={} paint={} subtree={} culled={}",
            e.frame_index, e.visited, e.enter, e.paint, e.paint_subtree, e.culled,
        );
    }

    fn on_diagnostic(&mut self, e: &DiagnosticEvent) {
        let _ = writeln!(
            self.writer,
            "[diag] frame={} {} element={}",
            e.frame_index,
            e.kind.name(),
            e.element_index,
        );
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] frame={} layout={:.1}µs down={:.1}µs up={:.1}µs \
             cull={:.1}µs render={:.1}µs damage={}",
            s.frame_index,
            us(s.layout_ns),
            us(s.down_ns),
            us(s.up_ns),
            us(s.cull_ns),
            us(s.render_ns),
            s.damage_rects,
        );
    }

    fn on_element_changes(&mut self, frame_index: u64, changes: &[ElementChange]) {
        let _ = writeln!(
            self.writer,
            "[elements] frame={frame_index} changes={}",
            changes.len(),
        );
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        let _ = writeln!(
            self.writer,
            "[damage] frame={frame_index} rects={}",
            rects.len(),
        );
    }
}
