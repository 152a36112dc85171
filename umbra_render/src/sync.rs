// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-thread hand-off to the UI thread.
//!
//! The element tree is single-threaded. Background work (decoders, network
//! completions, animation clocks) reaches it in two ways:
//!
//! - [`DeferredSender::post`] queues a mutation that the UI thread runs on
//!   its next [`DeferredQueue::run_pending`].
//! - [`DeferredSender::release`] hands over an object whose destructor must
//!   run on the UI thread; [`DeferredQueue::drain_releases`] drops it there.
//!
//! [`WindowSlot`] guards the host window a surface draws into. Attaching and
//! detaching take the write lock; background completions read the window
//! under the read lock and skip their work once it is gone.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use umbra_core::element::ElementTree;

type Mutation = Box<dyn FnOnce(&mut ElementTree) + Send>;
type Release = Box<dyn Any + Send>;

/// The UI-thread end of the deferred queue.
pub struct DeferredQueue {
    mutations: (Sender<Mutation>, Receiver<Mutation>),
    releases: (Sender<Release>, Receiver<Release>),
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending_mutations", &self.mutations.1.len())
            .field("pending_releases", &self.releases.1.len())
            .finish()
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mutations: crossbeam_channel::unbounded(),
            releases: crossbeam_channel::unbounded(),
        }
    }

    /// Returns a handle other threads post through.
    #[must_use]
    pub fn sender(&self) -> DeferredSender {
        DeferredSender {
            mutations: self.mutations.0.clone(),
            releases: self.releases.0.clone(),
        }
    }

    /// Number of mutations waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.mutations.1.len()
    }

    /// Runs every queued mutation against `tree`, in the order they were
    /// posted. Returns how many ran.
    ///
    /// Mutations posted while this runs, including by the mutations
    /// themselves, are left for the next call.
    pub fn run_pending(&self, tree: &mut ElementTree) -> usize {
        let queued = self.mutations.1.len();
        let mut ran = 0;
        for mutation in self.mutations.1.try_iter().take(queued) {
            mutation(tree);
            ran += 1;
        }
        if ran > 0 {
            log::trace!("ran {ran} deferred mutations");
        }
        ran
    }

    /// Drops every released object on the calling thread. Returns how many
    /// were dropped.
    pub fn drain_releases(&self) -> usize {
        let mut dropped = 0;
        for value in self.releases.1.try_iter() {
            drop(value);
            dropped += 1;
        }
        dropped
    }
}

/// A cloneable, `Send` handle for posting to a [`DeferredQueue`].
#[derive(Clone)]
pub struct DeferredSender {
    mutations: Sender<Mutation>,
    releases: Sender<Release>,
}

impl fmt::Debug for DeferredSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredSender").finish_non_exhaustive()
    }
}

impl DeferredSender {
    /// Queues `f` to run on the UI thread.
    ///
    /// Returns `false`, dropping `f`, when the queue no longer exists.
    pub fn post<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut ElementTree) + Send + 'static,
    {
        if self.mutations.send(Box::new(f)).is_err() {
            log::debug!("deferred queue is gone; dropping a posted mutation");
            return false;
        }
        true
    }

    /// Hands `value` to the UI thread to be dropped there.
    ///
    /// Returns `false` when the queue no longer exists; `value` is then
    /// dropped on the calling thread.
    pub fn release<T: Send + 'static>(&self, value: T) -> bool {
        if self.releases.send(Box::new(value)).is_err() {
            log::warn!("deferred queue is gone; releasing on the calling thread");
            return false;
        }
        true
    }
}

/// A shared, optional host window guarded by a reader-writer lock.
pub struct WindowSlot<W> {
    inner: Arc<RwLock<Option<W>>>,
}

impl<W> Clone for WindowSlot<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W> fmt::Debug for WindowSlot<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl<W> Default for WindowSlot<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> WindowSlot<W> {
    /// Creates a detached slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Attaches `window`, returning the previous one.
    pub fn attach(&self, window: W) -> Option<W> {
        self.inner.write().replace(window)
    }

    /// Detaches and returns the window.
    ///
    /// Waits for readers inside [`with_window`](Self::with_window) to
    /// finish, so no reader sees the window afterwards.
    pub fn detach(&self) -> Option<W> {
        self.inner.write().take()
    }

    /// Whether a window is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Runs `f` with the window under the read lock.
    ///
    /// Returns `None` without calling `f` when detached.
    pub fn with_window<R>(&self, f: impl FnOnce(&W) -> R) -> Option<R> {
        self.inner.read().as_ref().map(f)
    }

    /// Runs `f` with the window under the write lock.
    pub fn with_window_mut<R>(&self, f: impl FnOnce(&mut W) -> R) -> Option<R> {
        self.inner.write().as_mut().map(f)
    }
}
