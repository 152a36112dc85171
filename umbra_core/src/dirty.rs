// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty bits and depth-bucketed worklists.
//!
//! Every element carries a [`DirtyFlags`] set split into two disjoint groups:
//!
//! - **Down** bits describe state that flows from a parent to its children
//!   (visibility, transforms, clips, child paint order). Elements with a down
//!   bit are queued in the downward [`DirtyList`], which is drained
//!   lowest-level first so ancestors are always processed before their
//!   descendants.
//! - **Up** bits describe state that flows from a child to its parent and the
//!   surface (bounds, paint invalidation). Elements with an up bit are queued
//!   in the upward list, drained highest-level first.
//!
//! An element's membership in each list is a slot index stored on the element
//! itself, so removal is O(1) and never requires scanning.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use bitflags::bitflags;

bitflags! {
    /// Per-element dirty bits.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u16 {
        /// Own or inherited render visibility / opacity changed.
        const RENDER_VISIBILITY = 1 << 0;
        /// Own or inherited hit-test visibility changed.
        const HIT_TEST_VISIBILITY = 1 << 1;
        /// The local transform inputs changed (render transform, origin,
        /// layout offset, projection).
        const LOCAL_TRANSFORM = 1 << 2;
        /// The absolute transform must be recomputed.
        const TRANSFORM = 1 << 3;
        /// The clip property changed.
        const LOCAL_CLIP = 1 << 4;
        /// The accumulated clip must be recomputed.
        const CLIP = 1 << 5;
        /// A child's z-index changed; paint order must be re-sorted.
        const CHILDREN_Z_INDICES = 1 << 6;

        /// Bounds must be recomputed.
        const BOUNDS = 1 << 8;
        /// Bounds were replaced; the new area must be repainted.
        const NEW_BOUNDS = 1 << 9;
        /// The local dirty region must be merged into the surface damage.
        const INVALIDATE = 1 << 10;

        /// All bits processed by the downward pump.
        const DOWN = Self::RENDER_VISIBILITY.bits()
            | Self::HIT_TEST_VISIBILITY.bits()
            | Self::LOCAL_TRANSFORM.bits()
            | Self::TRANSFORM.bits()
            | Self::LOCAL_CLIP.bits()
            | Self::CLIP.bits()
            | Self::CHILDREN_Z_INDICES.bits();

        /// All bits processed by the upward pump.
        const UP = Self::BOUNDS.bits() | Self::NEW_BOUNDS.bits() | Self::INVALIDATE.bits();
    }
}

impl DirtyFlags {
    /// Number of distinct down bits.
    pub const DOWN_COUNT: u32 = Self::DOWN.bits().count_ones();

    /// Number of distinct up bits.
    pub const UP_COUNT: u32 = Self::UP.bits().count_ones();

    /// Whether any down bit is set.
    #[inline]
    #[must_use]
    pub const fn needs_down(self) -> bool {
        self.intersects(Self::DOWN)
    }

    /// Whether any up bit is set.
    #[inline]
    #[must_use]
    pub const fn needs_up(self) -> bool {
        self.intersects(Self::UP)
    }

    /// Returns only the down bits.
    #[inline]
    #[must_use]
    pub const fn down(self) -> Self {
        self.intersection(Self::DOWN)
    }

    /// Returns only the up bits.
    #[inline]
    #[must_use]
    pub const fn up(self) -> Self {
        self.intersection(Self::UP)
    }

    /// Adds the bits implied by `self`: `LOCAL_TRANSFORM` implies `TRANSFORM`
    /// and `LOCAL_CLIP` implies `CLIP`.
    #[inline]
    #[must_use]
    pub const fn with_implied(self) -> Self {
        let mut out = self;
        if self.contains(Self::LOCAL_TRANSFORM) {
            out = out.union(Self::TRANSFORM);
        }
        if self.contains(Self::LOCAL_CLIP) {
            out = out.union(Self::CLIP);
        }
        out
    }
}

/// Sentinel for "not in a list".
pub const NO_SLOT: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct Entry {
    element: u32,
    level: u32,
    prev: u32,
    next: u32,
    live: bool,
}

#[derive(Clone, Copy, Debug)]
struct Bucket {
    head: u32,
    tail: u32,
}

/// Slot number for a new entry appended after `len` existing ones.
///
/// # Panics
///
/// Panics when the list already holds every slot a `u32` can name besides
/// [`NO_SLOT`].
fn fresh_slot(len: usize) -> u32 {
    u32::try_from(len)
        .ok()
        .filter(|&slot| slot != NO_SLOT)
        .expect("dirty list slots exhausted")
}

/// A worklist of element slots bucketed by tree level.
///
/// Entries within a level are kept in insertion order. Empty buckets are
/// removed immediately, so the bucket index only ever holds live levels.
#[derive(Clone, Debug, Default)]
pub struct DirtyList {
    entries: Vec<Entry>,
    free: Vec<u32>,
    buckets: BTreeMap<u32, Bucket>,
    len: usize,
}

impl DirtyList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            buckets: BTreeMap::new(),
            len: 0,
        }
    }

    /// Number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of non-empty levels.
    #[inline]
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Appends `element` to the bucket for `level` and returns its slot.
    pub fn insert(&mut self, element: u32, level: u32) -> u32 {
        let entry = Entry {
            element,
            level,
            prev: NO_SLOT,
            next: NO_SLOT,
            live: true,
        };
        let slot = if let Some(slot) = self.free.pop() {
            self.entries[slot as usize] = entry;
            slot
        } else {
            let slot = fresh_slot(self.entries.len());
            self.entries.push(entry);
            slot
        };

        match self.buckets.get_mut(&level) {
            Some(bucket) => {
                self.entries[bucket.tail as usize].next = slot;
                self.entries[slot as usize].prev = bucket.tail;
                bucket.tail = slot;
            }
            None => {
                self.buckets.insert(
                    level,
                    Bucket {
                        head: slot,
                        tail: slot,
                    },
                );
            }
        }
        self.len += 1;
        slot
    }

    /// Removes the entry at `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is not a live entry.
    pub fn remove(&mut self, slot: u32) {
        assert!(
            (slot as usize) < self.entries.len() && self.entries[slot as usize].live,
            "dirty list slot {slot} is not live"
        );
        let Entry {
            level, prev, next, ..
        } = self.entries[slot as usize];

        if prev != NO_SLOT {
            self.entries[prev as usize].next = next;
        }
        if next != NO_SLOT {
            self.entries[next as usize].prev = prev;
        }

        let now_empty = match self.buckets.get_mut(&level) {
            Some(bucket) => {
                if bucket.head == slot {
                    bucket.head = next;
                }
                if bucket.tail == slot {
                    bucket.tail = prev;
                }
                bucket.head == NO_SLOT
            }
            None => false,
        };
        if now_empty {
            self.buckets.remove(&level);
        }

        self.entries[slot as usize].live = false;
        self.free.push(slot);
        self.len -= 1;
    }

    /// Removes and returns the first element of the lowest level.
    pub fn pop_lowest(&mut self) -> Option<u32> {
        let (_, bucket) = self.buckets.first_key_value()?;
        let slot = bucket.head;
        let element = self.entries[slot as usize].element;
        self.remove(slot);
        Some(element)
    }

    /// Removes and returns the first element of the highest level.
    pub fn pop_highest(&mut self) -> Option<u32> {
        let (_, bucket) = self.buckets.last_key_value()?;
        let slot = bucket.head;
        let element = self.entries[slot as usize].element;
        self.remove(slot);
        Some(element)
    }

    /// Iterates queued elements as `(level, element)` in ascending level
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.buckets.iter().flat_map(move |(&level, bucket)| {
            let mut cur = bucket.head;
            core::iter::from_fn(move || {
                if cur == NO_SLOT {
                    return None;
                }
                let e = self.entries[cur as usize];
                cur = e.next;
                Some((level, e.element))
            })
        })
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
        self.buckets.clear();
        self.len = 0;
    }
}
