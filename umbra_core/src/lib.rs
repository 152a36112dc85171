// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element tree, dirty propagation, and occlusion-culled render lists for
//! retained-mode compositing.
//!
//! `umbra_core` owns everything between "a property changed" and "here is
//! the ordered list of things to paint". It is `no_std` compatible (with
//! `alloc`) and stores elements in struct-of-arrays form behind generational
//! index handles.
//!
//! # Architecture
//!
//! ```text
//!   collaborator (property set, layout result)
//!       │  notify_*()
//!       ▼
//!   DirtyFlags + DirtyList (down, by level ascending)
//!       │
//!       ▼
//!   process_dirty_elements()
//!       ├── downward pump: visibility, transforms, clips, z-order
//!       └── upward pump:   bounds, invalidation ──► surface damage Region
//!                                                        │
//!                 ┌──────────────────────────────────────┘
//!                 ▼
//!   build_render_list(damage) ──► RenderList (back-to-front)
//! ```
//!
//! **[`element`]**: Struct-of-arrays element tree with generational handles,
//! notify entry points, and the two-phase dirty pump.
//!
//! **[`dirty`]**: Typed dirty bits and the depth-bucketed worklists the pump
//! drains.
//!
//! **[`cull`]**: Front-to-back render-list builder with region-based
//! occlusion culling.
//!
//! **[`region`]**: Sets of non-overlapping rectangles with union,
//! intersection, and subtraction.
//!
//! **[`transform`]**: Column-major 4×4 transform used for local, absolute,
//! and projection matrices.
//!
//! **[`color`]**: Straight-alpha colour values shared with backends.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! pump and render instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-element
//!   change and damage-rect events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod color;
pub mod cull;
pub mod dirty;
pub mod element;
pub mod region;
pub mod trace;
pub mod transform;
