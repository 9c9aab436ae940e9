//! Engine-wide counters.
//!
//! A snapshot-over-atomics design, the same shape as the teacher's
//! cache hit/miss/eviction counters: cheap, lock-free increments from
//! any thread, and a consistent-enough point-in-time snapshot for
//! monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the actor and the public operations.
#[derive(Debug, Default)]
pub struct Stats {
    n_expired: AtomicU64,
    n_lru_moved: AtomicU64,
    n_lru_nuked: AtomicU64,
    n_kills: AtomicU64,
}

/// A point-in-time copy of [`Stats`]'s counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Objects the actor expired via their own timer.
    pub n_expired: u64,
    /// `Touch` calls that actually moved an object to MRU position.
    pub n_lru_moved: u64,
    /// Objects evicted by `NukeOne` to reclaim LRU space.
    pub n_lru_nuked: u64,
    /// Objects torn down (the sum of expiry and `NukeOne` outcomes).
    pub n_kills: u64,
}

impl Stats {
    /// Creates a zeroed counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an object expired via its own timer.
    pub fn record_expired(&self) {
        self.n_expired.fetch_add(1, Ordering::Relaxed);
        self.n_kills.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a `Touch` that moved an object to MRU position.
    pub fn record_lru_moved(&self) {
        self.n_lru_moved.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an object evicted by `NukeOne`.
    pub fn record_lru_nuked(&self) {
        self.n_lru_nuked.fetch_add(1, Ordering::Relaxed);
        self.n_kills.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            n_expired: self.n_expired.load(Ordering::Relaxed),
            n_lru_moved: self.n_lru_moved.load(Ordering::Relaxed),
            n_lru_nuked: self.n_lru_nuked.load(Ordering::Relaxed),
            n_kills: self.n_kills.load(Ordering::Relaxed),
        }
    }
}
