// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element tree data model.
//!
//! An *element* is a node in a retained compositing tree. Each element has:
//!
//! - An identity ([`ElementId`]): a generational handle that becomes stale
//!   when the element is destroyed, preventing use-after-free bugs at the API
//!   level.
//! - Topology: parent, first-child, and sibling links forming an ordered
//!   tree, plus a per-container paint order sorted by z-index.
//! - **Properties** set by collaborators: render transform, transform origin,
//!   layout offset and size, clip, opacity, visibility, hit-test visibility,
//!   z-index, [effect](Effect), projection, [cache mode](CacheMode), opacity
//!   mask, and an opaque-content hint.
//! - **Computed state** produced by the pump: local and absolute transforms,
//!   total opacity and visibility, accumulated clip, and bounds.
//!
//! Elements are stored in struct-of-arrays layout with index-based handles
//! for cache-friendly traversal.
//!
//! # Dirty tracking
//!
//! Property setters call the `notify_*` entry points, which only set
//! [`DirtyFlags`](crate::dirty::DirtyFlags) and enqueue the element; nothing
//! recurses at notify time. [`process_dirty_elements`](ElementTree::process_dirty_elements)
//! later propagates the changes (see [`pump`](self::pump)) and accumulates
//! the surface damage.
//!
//! Only elements reachable from the root are *attached*. Attaching a subtree
//! marks it fully dirty; detaching it damages the area it last covered and
//! removes it from both worklists.

mod clip;
mod effect;
mod id;
pub mod pump;
mod store;
mod traverse;

pub use clip::ClipShape;
pub use effect::{CacheMode, Effect, MAX_BLUR_EXTENT, ShaderEffect, blur_extent};
pub use id::{ElementId, INVALID, MaskId};
pub use pump::{NoHooks, PumpConfig, PumpHooks, PumpReport};
pub use store::{ElementKind, ElementTree, INVISIBLE_OPACITY, is_invisible_opacity};
pub use traverse::{Children, PaintOrder};
