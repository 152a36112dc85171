// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render context, backends, and compositor for [`umbra_core`] element
//! trees.
//!
//! ```text
//!   ElementTree damage
//!       │  Compositor::paint
//!       ▼
//!   RenderList (culled, back to front)
//!       │  pre-render / ElementRenderer::render / post-render
//!       ▼
//!   Context (transform, clip, and group stack)
//!       │
//!       ▼
//!   RenderBackend (SoftwareBackend, or a GPU backend)
//! ```
//!
//! **[`backend`]**: The [`RenderBackend`] trait: surface allocation, fills,
//! blits, blends, and the effect primitives.
//!
//! **[`context`]**: [`Context`], the stack of transforms, clips, and
//! offscreen groups the compositor drives.
//!
//! **[`compositor`]**: [`Compositor`], which executes render lists, and the
//! [`ElementRenderer`] trait element content is painted through.
//!
//! **[`software`]**: [`SoftwareBackend`], a CPU backend over premultiplied
//! BGRA [`Image`]s.
//!
//! **[`shader`]**: ps_2_0 pixel-shader parsing, GLSL generation, and
//! interpretation.
//!
//! **[`surface`]**: [`Surface`], the per-window driver.
//!
//! **[`sync`]**: The deferred cross-thread queue and the window lock.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Forwards to `umbra_core/trace`, enabling
//!   diagnostics for effect fallbacks and failed group allocations.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod backend;
mod blur;
pub mod compositor;
pub mod context;
mod error;
pub mod image;
pub mod shader;
pub mod software;
pub mod surface;
pub mod sync;

pub use backend::RenderBackend;
pub use compositor::{Compositor, CompositorConfig, ElementRenderer, SolidFills};
pub use context::{Context, GroupOutcome};
pub use error::{BackendError, ShaderError};
pub use image::Image;
pub use software::{SoftwareBackend, SoftwareConfig};
pub use surface::Surface;
pub use sync::{DeferredQueue, DeferredSender, WindowSlot};
