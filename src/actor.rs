//! The expiry actor: a dedicated thread owning the heap and draining
//! the mailbox.
//!
//! Everything here runs on exactly one thread. Workers never touch the
//! heap directly (§5: "The heap is therefore touched by exactly one
//! thread and needs no synchronization internally") — they only ever
//! mail an `ObjectCore` via [`crate::mailbox::Mailbox::mail`] and wait
//! for this loop to notice it.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::heap::TimerHeap;
use crate::lru::Domains;
use crate::mailbox::Mailbox;
use crate::metrics::Stats;
use crate::object::{Flags, ObjectCore};

/// Owns the heap, drains the mailbox, and fires expiries.
///
/// Constructed by [`crate::engine::Engine`] and driven on its own
/// thread by [`ExpiryActor::run`]; every method besides `run` is
/// exposed mainly so tests can single-step the loop deterministically
/// against a [`crate::clock::FakeClock`] instead of racing real time.
pub struct ExpiryActor {
    heap: TimerHeap,
    mailbox: Arc<Mailbox>,
    domains: Arc<Domains>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    stats: Arc<Stats>,
}

impl ExpiryActor {
    /// Upper bound on how long a single `recv_timeout` call blocks,
    /// regardless of `tnext`. Keeps `Engine::shutdown`'s stop flag
    /// check responsive without requiring a wakeup signal of its own.
    const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(200);

    /// Builds a new actor. Not runnable on its own thread until
    /// [`ExpiryActor::run`] (or, in tests, repeated calls to
    /// [`ExpiryActor::tick`]) drives it.
    #[must_use]
    pub fn new(
        mailbox: Arc<Mailbox>,
        domains: Arc<Domains>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            heap: TimerHeap::new(),
            mailbox,
            domains,
            clock,
            config,
            stats,
        }
    }

    /// Number of objects currently heap-resident. Exposed for tests and
    /// diagnostics only; production code has no legitimate reason to
    /// peek at actor-internal state.
    #[must_use]
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// Runs the main loop until `stop` is observed set. Intended to be
    /// the body of the dedicated expiry thread spawned by
    /// [`crate::engine::Engine::new`].
    pub fn run(&mut self, stop: &std::sync::atomic::AtomicBool) {
        use std::sync::atomic::Ordering;
        let mut tnext = None;
        while !stop.load(Ordering::Acquire) {
            tnext = self.tick(tnext);
        }
        // Drain remaining mail so any pending teardown runs before the
        // thread exits, matching Engine::shutdown's "drain the mailbox
        // and join it" contract (SPEC_FULL.md §4.6).
        while let Some(oc) = self.mailbox.try_recv() {
            let now = self.clock.now();
            self.inbox(&oc, now);
        }
    }

    /// One iteration of §4.4's loop, parameterized by the previous
    /// `tnext` so tests can step it by hand. Returns the new `tnext`.
    ///
    /// `tnext` of `None` means "no scheduled wake, nap the configured
    /// empty-heap duration"; §4.4 spells this `tnext := 0` after taking
    /// mail, and `Expire`'s `0` return ("retry immediately") maps to
    /// `Some(now)` here so the next iteration polls without waiting.
    pub fn tick(&mut self, tnext: Option<SystemTime>) -> Option<SystemTime> {
        let now_before = self.clock.now();
        let wait = match tnext {
            Some(deadline) => deadline
                .duration_since(now_before)
                .unwrap_or(Duration::ZERO),
            None => self.config.empty_heap_nap(),
        };
        // Capped so `run`'s stop flag is re-checked promptly even while
        // napping through an empty heap; §5 leaves shutdown unspecified
        // ("termination is process-scoped"), so this bound doesn't
        // violate any ordering guarantee — it only makes the optional
        // `Engine::shutdown` join point responsive.
        let wait = wait.min(Self::SHUTDOWN_POLL_INTERVAL);
        match self.mailbox.recv_timeout(wait) {
            Some(oc) => {
                let now = self.clock.now();
                self.inbox(&oc, now);
                None
            }
            None => {
                let now = self.clock.now();
                Some(self.expire(now))
            }
        }
    }

    /// `Inbox(oc, now)` (§4.4): applies the pending mail's effect under
    /// the owning LRU mutex, then updates the heap.
    fn inbox(&mut self, oc: &Arc<ObjectCore>, now: SystemTime) {
        let lru = self.domains.resolve(oc);
        let snapshot = {
            let mut guard = lru.lock();
            let snapshot = *oc.flags();
            oc.flags().remove(Flags::INSERT | Flags::MOVE);
            oc.set_last_lru(now);
            if !snapshot.contains(Flags::DYING) {
                guard.link(oc);
            } else {
                oc.flags().remove(Flags::OFFLRU);
            }
            snapshot
        };

        if snapshot.contains(Flags::DYING) {
            if let Some(idx) = Self::heap_idx(oc) {
                self.heap.delete(idx);
            }
            trace!(object = %oc.id(), "actor dropping DYING object's reference");
            return;
        }

        if snapshot.contains(Flags::INSERT) {
            oc.set_timer_when(oc.timer_when());
            self.heap.insert(Arc::clone(oc));
            debug_assert_ne!(oc.timer_idx(), crate::object::NOIDX, "INSERT must heap-insert");
            debug!(object = %oc.id(), when = ?oc.timer_when(), "inserted into heap");
        } else if snapshot.contains(Flags::MOVE) {
            let when = oc.effective_deadline();
            oc.set_timer_when(when);
            if let Some(idx) = Self::heap_idx(oc) {
                self.heap.reorder(idx);
            } else {
                // Rearm raced an Inbox that hadn't heap-inserted yet;
                // the object isn't heap-resident to reorder. Nothing
                // further to do — its new `timer_when` is already
                // recorded and will be honored on the next insert.
                warn!(object = %oc.id(), "MOVE mail for object not currently heap-resident");
            }
            debug!(object = %oc.id(), when = ?when, "rearmed");
        } else {
            panic!(
                "{}",
                crate::error::Error::malformed(
                    "mail carried neither INSERT, MOVE, nor DYING (invariant 3)"
                )
            );
        }
    }

    fn heap_idx(oc: &Arc<ObjectCore>) -> Option<usize> {
        let idx = oc.timer_idx();
        (idx != crate::object::NOIDX).then_some(idx)
    }

    /// `Expire(now)` (§4.4): fires due expiries and reports the next
    /// wake time as an absolute [`SystemTime`].
    fn expire(&mut self, now: SystemTime) -> SystemTime {
        let Some(root) = self.heap.peek_root() else {
            return now + self.config.empty_heap_nap();
        };

        if root.timer_when() > now {
            return root.timer_when();
        }

        if root.flags().contains(Flags::BUSY) {
            return now + self.config.busy_retry_delay();
        }

        let lru = self.domains.resolve(&root);
        let already_claimed = {
            let mut guard = lru.lock();
            if root.flags().contains(Flags::OFFLRU) {
                true
            } else {
                guard.unlink(root.id());
                root.flags().insert(Flags::OFFLRU);
                false
            }
        };

        if already_claimed {
            // Another agent (a Rearm, or a parallel NukeOne) already
            // pulled this object off the LRU toward the mailbox; its
            // pending mail will resolve the heap entry. We back off
            // rather than race it (§4.4's "yield" step).
            return now + self.config.lost_race_retry_delay();
        }

        root.flags().insert(Flags::DYING);
        if let Some(idx) = Self::heap_idx(&root) {
            self.heap.delete(idx);
        }
        self.stats.record_expired();
        debug!(object = %root.id(), when = ?root.timer_when(), "expired");
        now
    }
}
