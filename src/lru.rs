//! Per-domain recency lists.
//!
//! Each [`LruSet`] is a recency-ordered map guarded by its own mutex —
//! `IndexMap` gives us O(1)-amortized "move to tail" via
//! `shift_remove` + reinsert, the same trick the teacher's
//! `cache::lru::LruCache` uses for its recency ordering, just without
//! the bounded-capacity eviction that cache serves (eviction here is
//! driven by [`LruSet::nuke_one`], called on demand rather than on
//! every insert).
//!
//! Membership here is a back-reference, not ownership (§9's "Cyclic
//! ownership" note): the canonical, owning `Arc` lives in
//! [`crate::heap::TimerHeap`], which is the actor's single heap-resident
//! reference (invariant 4). This set stores only [`Weak`] handles, so
//! `Arc::strong_count` on a linked object reflects external callers
//! plus the heap's one reference, never an extra clone contributed by
//! LRU membership itself — which is what makes `NukeOne`'s `refcnt == 1`
//! eligibility check (§4.1/§8 scenario 5) meaningful.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use indexmap::IndexMap;
use parking_lot::MutexGuard;

use crate::error::Error;
use crate::metrics::Stats;
use crate::object::{Flags, ObjectCore, ObjectId};
use crate::sync::Mutex;

type Order = IndexMap<ObjectId, Weak<ObjectCore>>;

/// A held lock on an [`LruSet`], letting a caller combine several
/// operations (e.g. clearing flags and linking) into one critical
/// section, the way the actor's `Inbox` step must (§4.4).
pub struct LruGuard<'a> {
    order: MutexGuard<'a, Order>,
}

impl LruGuard<'_> {
    /// Appends `oc` to the tail (most-recently-used end). Requires
    /// `OFFLRU` set on entry; clears it on exit. Stores only a `Weak`
    /// handle — the caller's own `Arc` (or the heap's) remains the sole
    /// owning reference.
    pub fn link(&mut self, oc: &Arc<ObjectCore>) {
        debug_assert!(
            oc.flags().contains(Flags::OFFLRU),
            "Link requires OFFLRU set on entry"
        );
        oc.flags().remove(Flags::OFFLRU);
        self.order.insert(oc.id(), Arc::downgrade(oc));
    }

    /// Removes `id` from wherever it is in this set, if present, and
    /// sets `OFFLRU`. Returns the removed object, upgraded from its
    /// `Weak` handle.
    pub fn unlink(&mut self, id: ObjectId) -> Option<Arc<ObjectCore>> {
        let weak = self.order.shift_remove(&id)?;
        let oc = weak.upgrade()?;
        oc.flags().insert(Flags::OFFLRU);
        Some(oc)
    }
}

/// A per-storage-domain recency list.
pub struct LruSet {
    order: Mutex<Order>,
    dontmove: bool,
    stats: Arc<Stats>,
}

impl LruSet {
    /// Creates an empty set. `dontmove` freezes recency reordering for
    /// domains where it's pointless (§4.1's `DONTMOVE`).
    #[must_use]
    pub fn new(dontmove: bool, stats: Arc<Stats>) -> Self {
        Self {
            order: Mutex::new(IndexMap::new()),
            dontmove,
            stats,
        }
    }

    /// Whether recency reordering is frozen for this domain.
    #[must_use]
    pub fn dontmove(&self) -> bool {
        self.dontmove
    }

    /// Number of objects currently linked into this set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.lock().len()
    }

    /// Whether this set currently holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.lock().is_empty()
    }

    /// Locks this set for a caller that needs several link/unlink
    /// operations done atomically.
    pub fn lock(&self) -> LruGuard<'_> {
        LruGuard {
            order: self.order.lock(),
        }
    }

    /// `Touch(oc, now)`: moves `oc` to the tail if it's currently
    /// linked, reporting whether a move happened. A no-op under
    /// `dontmove`, and a no-op (never blocking) if the set's mutex is
    /// currently held by someone else — Touch trades strict ordering
    /// for never becoming a contention point.
    pub fn touch(&self, oc: &Arc<ObjectCore>, now: SystemTime) -> bool {
        if self.dontmove {
            return false;
        }
        let Some(mut order) = self.order.try_lock() else {
            return false;
        };
        if oc.flags().contains(Flags::OFFLRU) {
            return false;
        }
        if order.shift_remove(&oc.id()).is_none() {
            return false;
        }
        order.insert(oc.id(), Arc::downgrade(oc));
        oc.set_last_lru(now);
        self.stats.record_lru_moved();
        true
    }

    /// `NukeOne`: scans head-to-tail for the first evictable object —
    /// not `BUSY`, `refcnt == 1` (nothing outside this set still holds
    /// it), and whose object-head mutex is currently free — marks it
    /// `DYING | OFFLRU`, unlinks it, and hands it back to the caller to
    /// mail to the actor.
    ///
    /// `refcnt` is read via [`Weak::strong_count`] before upgrading, so
    /// the scan's own temporary `Arc` (needed to inspect flags and
    /// try-lock the object-head mutex) never inflates the count being
    /// checked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CannotReclaim`] if no object in this domain is
    /// currently evictable.
    pub fn nuke_one(&self) -> Result<Arc<ObjectCore>, Error> {
        let mut order = self.order.lock();

        let mut candidate: Option<(ObjectId, Arc<ObjectCore>)> = None;
        for (id, weak) in order.iter() {
            if Weak::strong_count(weak) != 1 {
                continue;
            }
            let Some(oc) = weak.upgrade() else {
                continue;
            };
            if oc.flags().contains(Flags::BUSY) {
                continue;
            }
            if oc.try_lock_head().is_none() {
                continue;
            }
            candidate = Some((*id, oc));
            break;
        }

        let (id, oc) = candidate.ok_or(Error::CannotReclaim)?;
        order
            .shift_remove(&id)
            .ok_or_else(|| Error::malformed("NukeOne candidate vanished under the LRU mutex"))?;
        oc.flags().insert(Flags::DYING | Flags::OFFLRU);
        self.stats.record_lru_nuked();
        Ok(oc)
    }
}

/// The named per-domain registry ("storage domain lookup" collaborator,
/// §6): resolves or lazily creates the [`LruSet`] for a domain name.
pub struct Domains {
    sets: parking_lot::RwLock<HashMap<String, Arc<LruSet>>>,
    dontmove_default: bool,
    stats: Arc<Stats>,
}

impl Domains {
    /// Creates an empty registry. New domains created through
    /// [`Domains::get_or_create`] start with `dontmove_default`.
    #[must_use]
    pub fn new(dontmove_default: bool, stats: Arc<Stats>) -> Self {
        Self {
            sets: parking_lot::RwLock::new(HashMap::new()),
            dontmove_default,
            stats,
        }
    }

    /// Resolves `name`'s `LruSet`, creating it on first use. Idempotent.
    pub fn get_or_create(&self, name: &str) -> Arc<LruSet> {
        if let Some(set) = self.sets.read().get(name) {
            return Arc::clone(set);
        }
        let mut sets = self.sets.write();
        Arc::clone(
            sets.entry(name.to_string())
                .or_insert_with(|| Arc::new(LruSet::new(self.dontmove_default, Arc::clone(&self.stats)))),
        )
    }

    /// The "storage domain lookup" collaborator (§6): resolves `oc`'s
    /// owning `LruSet` by the domain name it was assigned at
    /// Inject/Insert time. Idempotent; panics if called before the
    /// object has ever been assigned a domain, which would itself be a
    /// caller bug (every public operation assigns one first).
    pub fn resolve(&self, oc: &Arc<ObjectCore>) -> Arc<LruSet> {
        let name = oc
            .domain_name()
            .expect("ObjectCore has no domain; Inject/Insert must assign one before mailing");
        self.get_or_create(&name)
    }
}
