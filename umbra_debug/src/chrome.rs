// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// Phases become duration events. Counters and diagnostics carry no
/// timestamp of their own; they are placed at the most recent phase
/// timestamp seen so they line up with the frame that produced them.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();
    let mut last_ts = 0.0;

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::PhaseBegin(e) => {
                last_ts = ns_to_us(e.timestamp_ns);
                events.push(json!({
                    "ph": "B",
                    "name": e.phase.name(),
                    "cat": "Frame",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                last_ts = ns_to_us(e.timestamp_ns);
                events.push(json!({
                    "ph": "E",
                    "name": e.phase.name(),
                    "cat": "Frame",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "frame_index": e.frame_index,
                    }
                }));
            }
            RecordedEvent::Pump(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "Pump",
                    "cat": "Pump",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "down_visits": e.down_visits,
                        "up_visits": e.up_visits,
                        "residual_down": e.residual_down,
                        "residual_up": e.residual_up,
                    }
                }));
            }
            RecordedEvent::RenderList(e) => {
                events.push(json!({
                    "ph": "C",
                    "name": "RenderList",
                    "cat": "Cull",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "enter": e.enter,
                        "paint": e.paint,
                        "paint_subtree": e.paint_subtree,
                        "culled": e.culled,
                    }
                }));
            }
            RecordedEvent::Diagnostic(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": e.kind.name(),
                    "cat": "Diagnostic",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "frame_index": e.frame_index,
                        "element_index": e.element_index,
                    }
                }));
            }
            RecordedEvent::FrameSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "FrameSummary",
                    "cat": "Summary",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "frame_index": s.frame_index,
                        "layout_us": ns_to_us(s.layout_ns),
                        "down_us": ns_to_us(s.down_ns),
                        "up_us": ns_to_us(s.up_ns),
                        "cull_us": ns_to_us(s.cull_ns),
                        "render_us": ns_to_us(s.render_ns),
                        "damage_rects": s.damage_rects,
                    }
                }));
            }
            RecordedEvent::ElementChangesCount { frame_index, count } => {
                events.push(json!({
                    "ph": "i",
                    "name": "ElementChanges",
                    "cat": "Rich",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": frame_index,
                        "count": count,
                    }
                }));
            }
            RecordedEvent::DamageRectsCount { frame_index, count } => {
                events.push(json!({
                    "ph": "i",
                    "name": "DamageRects",
                    "cat": "Rich",
                    "ts": last_ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "frame_index": frame_index,
                        "count": count,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn ns_to_us(ns: u64) -> f64 {
    ns as f64 / 1000.0
}
