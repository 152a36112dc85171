// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Development sinks for umbra's frame trace.
//!
//! A frame in umbra runs five phases: the layout hook, the downward pump
//! (visibility, transforms, clips, z-order), the upward pump (bounds and
//! invalidation), render-list construction, and painting. A
//! [`Tracer`](umbra_core::trace::Tracer) wrapping one of the sinks here sees
//! phase boundaries, pump visit counts and residuals, render-list op counts,
//! and diagnostics such as a diverged pump or an effect that fell back to a
//! plain blend. Each frame ends with a
//! [`FrameSummary`](umbra_core::trace::FrameSummary).
//!
//! - [`pretty::PrettyPrintSink`] prints one line per event, for watching a
//!   pump or cull live.
//! - [`recorder::RecorderSink`] keeps events as compact bytes. Read them back
//!   with [`recorder::decode`].
//! - [`chrome::export`] turns a recording into Chrome Trace Event JSON, with
//!   phases as duration slices and pump and render-list counts as counters.
//!
//! With the core's `trace-rich` feature the sinks also receive per-element
//! change and damage-rect batches. The recorder and exporter keep only their
//! counts.

pub mod chrome;
pub mod pretty;
pub mod recorder;
