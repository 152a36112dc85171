// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Rich events ([`on_element_changes`](TraceSink::on_element_changes),
//! [`on_damage_rects`](TraceSink::on_damage_rects)) store only the count.

use umbra_core::trace::{
    DamageRect, DiagnosticEvent, DiagnosticKind, ElementChange, FrameSummary, PhaseBeginEvent,
    PhaseEndEvent, PhaseKind, PumpEvent, RenderListEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PHASE_BEGIN: u8 = 1;
const TAG_PHASE_END: u8 = 2;
const TAG_PUMP: u8 = 3;
const TAG_RENDER_LIST: u8 = 4;
const TAG_DIAGNOSTIC: u8 = 5;
const TAG_FRAME_SUMMARY: u8 = 6;
const TAG_ELEMENT_CHANGES_COUNT: u8 = 7;
const TAG_DAMAGE_RECTS_COUNT: u8 = 8;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_count(&mut self, len: usize) {
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Layout => 0,
            PhaseKind::Down => 1,
            PhaseKind::Up => 2,
            PhaseKind::Cull => 3,
            PhaseKind::Render => 4,
        });
    }

    fn write_diagnostic(&mut self, k: DiagnosticKind) {
        self.write_u8(match k {
            DiagnosticKind::ZOrderOnLeaf => 0,
            DiagnosticKind::PumpDiverged => 1,
            DiagnosticKind::EffectFallback => 2,
            DiagnosticKind::GroupAllocationFailed => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp_ns);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.frame_index);
        self.write_phase(e.phase);
        self.write_u64(e.timestamp_ns);
    }

    fn on_pump(&mut self, e: &PumpEvent) {
        self.write_u8(TAG_PUMP);
        self.write_u64(e.frame_index);
        self.write_u32(e.down_visits);
        self.write_u32(e.up_visits);
        self.write_u32(e.residual_down);
        self.write_u32(e.residual_up);
    }

    fn on_render_list(&mut self, e: &RenderListEvent) {
        self.write_u8(TAG_RENDER_LIST);
        self.write_u64(e.frame_index);
        self.write_u32(e.visited);
        self.write_u32(e.enter);
        self.write_u32(e.paint);
        self.write_u32(e.paint_subtree);
        self.write_u32(e.culled);
    }

    fn on_diagnostic(&mut self, e: &DiagnosticEvent) {
        self.write_u8(TAG_DIAGNOSTIC);
        self.write_u64(e.frame_index);
        self.write_diagnostic(e.kind);
        self.write_u32(e.element_index);
    }

    fn on_frame_summary(&mut self, s: &FrameSummary) {
        self.write_u8(TAG_FRAME_SUMMARY);
        self.write_u64(s.frame_index);
        self.write_u64(s.layout_ns);
        self.write_u64(s.down_ns);
        self.write_u64(s.up_ns);
        self.write_u64(s.cull_ns);
        self.write_u64(s.render_ns);
        self.write_u32(s.damage_rects);
    }

    fn on_element_changes(&mut self, frame_index: u64, changes: &[ElementChange]) {
        self.write_u8(TAG_ELEMENT_CHANGES_COUNT);
        self.write_u64(frame_index);
        self.write_count(changes.len());
    }

    fn on_damage_rects(&mut self, frame_index: u64, rects: &[DamageRect]) {
        self.write_u8(TAG_DAMAGE_RECTS_COUNT);
        self.write_u64(frame_index);
        self.write_count(rects.len());
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// A [`PumpEvent`].
    Pump(PumpEvent),
    /// A [`RenderListEvent`].
    RenderList(RenderListEvent),
    /// A [`DiagnosticEvent`].
    Diagnostic(DiagnosticEvent),
    /// A [`FrameSummary`].
    FrameSummary(FrameSummary),
    /// Element-change count for a frame.
    ElementChangesCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of processed elements.
        count: u32,
    },
    /// Damage-rect count for a frame.
    DamageRectsCount {
        /// Frame counter.
        frame_index: u64,
        /// Number of damage rects.
        count: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?;
        self.pos += N;
        bytes.try_into().ok()
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        PhaseKind::ALL.get(usize::from(self.read_u8()?)).copied()
    }

    fn read_diagnostic(&mut self) -> Option<DiagnosticKind> {
        Some(match self.read_u8()? {
            0 => DiagnosticKind::ZOrderOnLeaf,
            1 => DiagnosticKind::PumpDiverged,
            2 => DiagnosticKind::EffectFallback,
            3 => DiagnosticKind::GroupAllocationFailed,
            _ => return None,
        })
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp_ns: self.read_u64()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            frame_index: self.read_u64()?,
            phase: self.read_phase()?,
            timestamp_ns: self.read_u64()?,
        }))
    }

    fn decode_pump(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Pump(PumpEvent {
            frame_index: self.read_u64()?,
            down_visits: self.read_u32()?,
            up_visits: self.read_u32()?,
            residual_down: self.read_u32()?,
            residual_up: self.read_u32()?,
        }))
    }

    fn decode_render_list(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::RenderList(RenderListEvent {
            frame_index: self.read_u64()?,
            visited: self.read_u32()?,
            enter: self.read_u32()?,
            paint: self.read_u32()?,
            paint_subtree: self.read_u32()?,
            culled: self.read_u32()?,
        }))
    }

    fn decode_diagnostic(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Diagnostic(DiagnosticEvent {
            frame_index: self.read_u64()?,
            kind: self.read_diagnostic()?,
            element_index: self.read_u32()?,
        }))
    }

    fn decode_frame_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameSummary(FrameSummary {
            frame_index: self.read_u64()?,
            layout_ns: self.read_u64()?,
            down_ns: self.read_u64()?,
            up_ns: self.read_u64()?,
            cull_ns: self.read_u64()?,
            render_ns: self.read_u64()?,
            damage_rects: self.read_u32()?,
        }))
    }

    fn decode_count(&mut self) -> Option<(u64, u32)> {
        let frame_index = self.read_u64()?;
        let count = self.read_u32()?;
        Some((frame_index, count))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_PUMP => self.decode_pump(),
            TAG_RENDER_LIST => self.decode_render_list(),
            TAG_DIAGNOSTIC => self.decode_diagnostic(),
            TAG_FRAME_SUMMARY => self.decode_frame_summary(),
            TAG_ELEMENT_CHANGES_COUNT => {
                let (frame_index, count) = self.decode_count()?;
                Some(RecordedEvent::ElementChangesCount { frame_index, count })
            }
            TAG_DAMAGE_RECTS_COUNT => {
                let (frame_index, count) = self.decode_count()?;
                Some(RecordedEvent::DamageRectsCount { frame_index, count })
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_summary() -> FrameSummary {
        FrameSummary {
            frame_index: 7,
            layout_ns: 120,
            down_ns: 0,
            up_ns: 0,
            cull_ns: 0,
            render_ns: 1500,
            damage_rects: 2,
        }
    }

    #[test]
    fn phase_events_keep_their_order_and_fields() {
        let mut rec = RecorderSink::new();
        rec.on_phase_begin(&PhaseBeginEvent {
            frame_index: 5,
            phase: PhaseKind::Render,
            timestamp_ns: 2000,
        });
        rec.on_phase_end(&PhaseEndEvent {
            frame_index: 5,
            phase: PhaseKind::Render,
            timestamp_ns: 3000,
        });

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 2, "two records");
        match &events[0] {
            RecordedEvent::PhaseBegin(e) => {
                assert_eq!(e.frame_index, 5, "frame index");
                assert_eq!(e.phase, PhaseKind::Render, "phase");
                assert_eq!(e.timestamp_ns, 2000, "timestamp");
            }
            other => panic!("expected PhaseBegin, got {other:?}"),
        }
        match &events[1] {
            RecordedEvent::PhaseEnd(e) => {
                assert_eq!(e.phase, PhaseKind::Render, "phase");
                assert_eq!(e.timestamp_ns, 3000, "timestamp");
            }
            other => panic!("expected PhaseEnd, got {other:?}"),
        }
    }

    #[test]
    fn pump_and_render_list_counts() {
        let pump = PumpEvent {
            frame_index: 3,
            down_visits: 12,
            up_visits: 9,
            residual_down: 0,
            residual_up: 1,
        };
        let list = RenderListEvent {
            frame_index: 3,
            visited: 10,
            enter: 4,
            paint: 5,
            paint_subtree: 1,
            culled: 2,
        };
        let mut rec = RecorderSink::new();
        rec.on_pump(&pump);
        rec.on_render_list(&list);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert!(
            matches!(events[0], RecordedEvent::Pump(e) if e == pump),
            "got {:?}",
            events[0]
        );
        assert!(
            matches!(events[1], RecordedEvent::RenderList(e) if e == list),
            "got {:?}",
            events[1]
        );
    }

    #[test]
    fn diagnostics_keep_kind_and_element() {
        let mut rec = RecorderSink::new();
        let diag = DiagnosticEvent {
            frame_index: 9,
            kind: DiagnosticKind::GroupAllocationFailed,
            element_index: 42,
        };
        rec.on_diagnostic(&diag);
        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert!(
            matches!(events.as_slice(), [RecordedEvent::Diagnostic(e)] if *e == diag),
            "got {events:?}"
        );
    }

    #[test]
    fn frame_summary_survives_recording() {
        let mut rec = RecorderSink::new();
        rec.on_frame_summary(&sample_summary());
        let events: Vec<_> = decode(&rec.into_bytes()).collect();
        match events.as_slice() {
            [RecordedEvent::FrameSummary(s)] => assert_eq!(*s, sample_summary(), "summary"),
            other => panic!("expected one FrameSummary, got {other:?}"),
        }
    }

    #[test]
    fn rich_events_record_counts_only() {
        let mut rec = RecorderSink::new();
        rec.on_element_changes(
            42,
            &[
                ElementChange {
                    element_index: 0,
                    flags: 1,
                },
                ElementChange {
                    element_index: 1,
                    flags: 4,
                },
            ],
        );
        rec.on_damage_rects(
            42,
            &[DamageRect {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            }],
        );

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert!(
            matches!(
                events.as_slice(),
                [
                    RecordedEvent::ElementChangesCount {
                        frame_index: 42,
                        count: 2
                    },
                    RecordedEvent::DamageRectsCount {
                        frame_index: 42,
                        count: 1
                    },
                ]
            ),
            "got {events:?}"
        );
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        assert_eq!(decode(&[]).count(), 0, "no events");
    }

    #[test]
    fn truncated_and_unknown_records_stop_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_frame_summary(&sample_summary());
        rec.on_frame_summary(&sample_summary());
        let bytes = rec.into_bytes();

        let truncated = &bytes[..bytes.len() - 3];
        assert_eq!(decode(truncated).count(), 1, "partial record dropped");

        let mut unknown = bytes.clone();
        unknown.insert(0, 0xff);
        assert_eq!(decode(&unknown).count(), 0, "unknown tag stops iteration");
    }
}
