//! A binary min-heap over objects, keyed by their scheduled wake time.
//!
//! Single-writer by construction: only the expiry actor ever touches a
//! [`TimerHeap`], so unlike [`crate::lru::LruSet`] it carries no mutex
//! of its own. Every swap or move writes the object's new index back
//! through [`ObjectCore::set_timer_idx`], keeping `timer_idx`
//! authoritative for invariant 1 ("`timer_idx == NOIDX` iff the OC is
//! not in the heap").

use std::sync::Arc;

use crate::object::{ObjectCore, NOIDX};

/// A binary min-heap ordered by `timer_when`, with index-callback
/// bookkeeping so an `ObjectCore` always knows its own slot.
#[derive(Default)]
pub struct TimerHeap {
    slots: Vec<Arc<ObjectCore>>,
}

impl TimerHeap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of objects currently heap-resident.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the heap has no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Inserts `oc` and bubbles it up into place. Asserts it was not
    /// already heap-resident.
    pub fn insert(&mut self, oc: Arc<ObjectCore>) {
        debug_assert_eq!(oc.timer_idx(), NOIDX, "object already in heap");
        let idx = self.slots.len();
        oc.set_timer_idx(idx);
        self.slots.push(oc);
        self.sift_up(idx);
    }

    /// Removes the object at `idx`, if any, restoring heap order.
    /// Returns it so the caller can finish processing it (e.g. drop
    /// the actor's reference).
    pub fn delete(&mut self, idx: usize) -> Option<Arc<ObjectCore>> {
        if idx >= self.slots.len() {
            return None;
        }
        let last = self.slots.len() - 1;
        self.slots.swap(idx, last);
        let removed = self.slots.pop()?;
        removed.set_timer_idx(NOIDX);
        if idx < self.slots.len() {
            self.slots[idx].set_timer_idx(idx);
            self.sift_down(idx);
            self.sift_up(idx);
        }
        Some(removed)
    }

    /// Re-establishes heap order for the object currently at `idx`,
    /// after its `timer_when` changed in place (a `Rearm`).
    pub fn reorder(&mut self, idx: usize) {
        if idx >= self.slots.len() {
            return;
        }
        self.sift_down(idx);
        self.sift_up(idx);
    }

    /// Returns a clone of the root (minimum `timer_when`) without
    /// removing it, or `None` if the heap is empty.
    #[must_use]
    pub fn peek_root(&self) -> Option<Arc<ObjectCore>> {
        self.slots.first().cloned()
    }

    /// Removes and returns the root, if any.
    pub fn pop_root(&mut self) -> Option<Arc<ObjectCore>> {
        self.delete(0)
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.slots[idx].timer_when() < self.slots[parent].timer_when() {
                self.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;
            if left < len && self.slots[left].timer_when() < self.slots[smallest].timer_when() {
                smallest = left;
            }
            if right < len && self.slots[right].timer_when() < self.slots[smallest].timer_when() {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.swap(idx, smallest);
            idx = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.slots.swap(a, b);
        self.slots[a].set_timer_idx(a);
        self.slots[b].set_timer_idx(b);
    }
}
