//! The always-resident handle for a cached object.
//!
//! [`ObjectCore`] is deliberately small: it carries only the fields the
//! expiry/LRU core needs (timers, flags, heap/LRU bookkeeping), never
//! the cached response itself. The full object lives behind the
//! [`ObjectTimers`] collaborator, which this crate treats as an opaque
//! external resource.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::sync::{AtomicU64, AtomicUsize, Mutex, Ordering, RwLock};

/// Sentinel value of [`ObjectCore::timer_idx`] meaning "not in the heap".
pub const NOIDX: usize = usize::MAX;

/// Opaque identity for an [`ObjectCore`], generated once at creation and
/// stable for its lifetime. Used only for logging and the [`Teardown`]
/// / [`MetadataSink`] callbacks — the core never looks objects up by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        // A real atomic, not the loom-swappable alias: loom's mocked
        // atomics carry runtime state and aren't const-constructible,
        // so they can't back a `static`. Identity generation has no
        // bearing on the interleavings loom explores here.
        static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oc#{}", self.0)
    }
}

/// The object accessor collaborator (§6): given an `ObjectCore`, the
/// timer fields of the full cached response it fronts.
pub trait ObjectTimers: Send + Sync {
    /// Time the object was fetched/created.
    fn t_origin(&self) -> SystemTime;
    /// Time-to-live from `t_origin`.
    fn ttl(&self) -> std::time::Duration;
    /// Additional window during which a stale object may still be served.
    fn grace(&self) -> std::time::Duration;
    /// Additional window during which a stale object is retained for
    /// revalidation but not served.
    fn keep(&self) -> std::time::Duration;

    /// Whether this object's effective wake time is currently negative
    /// — e.g. a VCL ban or a negative computed TTL — and it must be
    /// killed rather than rescheduled. `Duration` cannot represent
    /// negative spans, so a rearm-to-negative-deadline (§3's invariant
    /// 6) is signaled through this flag instead of through
    /// `effective_deadline`'s arithmetic going negative.
    fn kill_now(&self) -> bool {
        false
    }
}

/// Invoked exactly once, when an `ObjectCore`'s last reference drops —
/// "`deref` returning true triggers object teardown" (§6).
pub trait Teardown: Send + Sync {
    /// Tears down the full object fronted by `id`.
    fn teardown(&self, id: ObjectId);
}

/// The metadata persistence callback (§6): invoked whenever
/// `timer_when` changes so an external persistence layer can record it.
pub trait MetadataSink: Send + Sync {
    /// Called when `id`'s scheduled wake time changes to `when`.
    fn on_timer_changed(&self, id: ObjectId, when: SystemTime);
}

/// Bitset of the five states an `ObjectCore` can be in at once, per the
/// data model's `flags` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// Not linked into its LRU list (it is either in the mailbox or was
    /// never linked yet).
    pub const OFFLRU: Self = Self(0b0000_0001);
    /// Pending mail represents a fresh insertion.
    pub const INSERT: Self = Self(0b0000_0010);
    /// Pending mail represents a rearm (timer recompute).
    pub const MOVE: Self = Self(0b0000_0100);
    /// Scheduled for destruction; any heap presence must be cleaned up
    /// by the actor.
    pub const DYING: Self = Self(0b0000_1000);
    /// Currently being written to by a fetch; must not expire.
    pub const BUSY: Self = Self(0b0001_0000);
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Returns true if `self` contains every bit in `other`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if `self` and `other` share any bit.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Sets every bit in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears every bit in `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for Flags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// The always-resident handle for a cached object.
pub struct ObjectCore {
    id: ObjectId,
    /// `OFFLRU | INSERT | MOVE | DYING | BUSY`, mutated only while the
    /// caller already holds the owning `LruSet`'s mutex (or is the
    /// actor, which has exclusive access by construction). The mutex
    /// here exists for `Sync`, not as an extra contention point.
    flags: Mutex<Flags>,
    /// Absolute wake time, milliseconds since the Unix epoch. Atomic so
    /// `Rearm`'s "if unchanged, return" fast path can read it without
    /// taking `flags`'s lock.
    timer_when_millis: AtomicU64,
    /// Current index inside the actor's heap, or [`NOIDX`]. Written
    /// only by the heap's index callback.
    timer_idx: AtomicUsize,
    /// Wall-clock time of the last LRU position update, milliseconds
    /// since the Unix epoch.
    last_lru_millis: AtomicU64,
    /// Stands in for the "owning object-head mutex" collaborator (§6):
    /// `NukeOne` try-locks this before marking an object `DYING`,
    /// representing exclusion from a concurrent writer mutating the
    /// full object this core fronts.
    head_lock: Mutex<()>,
    /// Which storage domain's `LruSet` this object belongs to.
    /// Resolved by name through [`crate::lru::Domains`] rather than
    /// held as a direct reference, per the data model's "`lru_domain`
    /// ... resolved via a lookup, not stored directly" (§3) — this is
    /// the key the lookup is keyed on, not the `LruSet` itself.
    domain: RwLock<Option<String>>,
    timers: Box<dyn ObjectTimers>,
    teardown: Option<Arc<dyn Teardown>>,
    metadata_sink: Option<Arc<dyn MetadataSink>>,
}

impl fmt::Debug for ObjectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectCore")
            .field("id", &self.id)
            .field("flags", &*self.flags.lock())
            .field("timer_idx", &self.timer_idx.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ObjectCore {
    /// Creates a new, unlinked `ObjectCore` with `OFFLRU` set and no
    /// heap presence. Callers link it into an `LruSet` and mail it to
    /// the actor via `Inject`/`Insert`.
    pub fn new(
        timers: Box<dyn ObjectTimers>,
        teardown: Option<Arc<dyn Teardown>>,
        metadata_sink: Option<Arc<dyn MetadataSink>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::next(),
            flags: Mutex::new(Flags::OFFLRU),
            timer_when_millis: AtomicU64::new(0),
            timer_idx: AtomicUsize::new(NOIDX),
            last_lru_millis: AtomicU64::new(0),
            head_lock: Mutex::new(()),
            domain: RwLock::new(None),
            timers,
            teardown,
            metadata_sink,
        })
    }

    /// This object's identity.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The object accessor collaborator for this core.
    #[must_use]
    pub fn timers(&self) -> &dyn ObjectTimers {
        self.timers.as_ref()
    }

    /// Locks `flags` for inspection or mutation. Callers must already
    /// hold the owning `LruSet`'s mutex, or be the actor thread.
    pub(crate) fn flags(&self) -> parking_lot::MutexGuard<'_, Flags> {
        self.flags.lock()
    }

    /// Attempts to acquire the object-head mutex without blocking,
    /// returning `None` if it is currently held by a concurrent writer.
    pub(crate) fn try_lock_head(&self) -> Option<parking_lot::MutexGuard<'_, ()>> {
        self.head_lock.try_lock()
    }

    /// Current scheduled wake time.
    #[must_use]
    pub fn timer_when(&self) -> SystemTime {
        crate::clock::from_millis(self.timer_when_millis.load(Ordering::Acquire))
    }

    /// Sets the scheduled wake time, notifying the metadata sink if one
    /// is configured.
    pub(crate) fn set_timer_when(&self, when: SystemTime) {
        self.timer_when_millis
            .store(crate::clock::to_millis(when), Ordering::Release);
        if let Some(sink) = &self.metadata_sink {
            sink.on_timer_changed(self.id, when);
        }
    }

    /// Current heap index, or [`NOIDX`] if not heap-resident.
    #[must_use]
    pub(crate) fn timer_idx(&self) -> usize {
        self.timer_idx.load(Ordering::Acquire)
    }

    /// Heap index callback: records this object's new position.
    pub(crate) fn set_timer_idx(&self, idx: usize) {
        self.timer_idx.store(idx, Ordering::Release);
    }

    /// Time of the last LRU position update.
    #[must_use]
    pub fn last_lru(&self) -> SystemTime {
        crate::clock::from_millis(self.last_lru_millis.load(Ordering::Acquire))
    }

    /// Records `now` as the last LRU position update time.
    pub(crate) fn set_last_lru(&self, now: SystemTime) {
        self.last_lru_millis
            .store(crate::clock::to_millis(now), Ordering::Release);
    }

    /// The name of the storage domain this object currently belongs
    /// to, if it has been assigned one yet (Inject/Insert assign it
    /// before the first mail).
    #[must_use]
    pub fn domain_name(&self) -> Option<String> {
        self.domain.read().clone()
    }

    /// Records which storage domain this object belongs to. Called
    /// once, by Inject/Insert, before the object is first mailed.
    pub(crate) fn set_domain_name(&self, name: &str) {
        *self.domain.write() = Some(name.to_string());
    }

    /// The effective wake time: `t_origin + ttl + grace + keep`.
    #[must_use]
    pub fn effective_deadline(&self) -> SystemTime {
        self.timers.t_origin() + self.timers.ttl() + self.timers.grace() + self.timers.keep()
    }

    /// Whether this object's collaborator currently reports a negative
    /// effective wake (§3 invariant 6) and must be killed rather than
    /// rescheduled.
    #[must_use]
    pub fn kill_now(&self) -> bool {
        self.timers.kill_now()
    }
}

impl Drop for ObjectCore {
    fn drop(&mut self) {
        if let Some(teardown) = &self.teardown {
            teardown.teardown(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct FixedTimers {
        t_origin: SystemTime,
        ttl: Duration,
        grace: Duration,
        keep: Duration,
    }

    impl ObjectTimers for FixedTimers {
        fn t_origin(&self) -> SystemTime {
            self.t_origin
        }
        fn ttl(&self) -> Duration {
            self.ttl
        }
        fn grace(&self) -> Duration {
            self.grace
        }
        fn keep(&self) -> Duration {
            self.keep
        }
    }

    fn fixed_core(t_origin: SystemTime, ttl: Duration) -> Arc<ObjectCore> {
        ObjectCore::new(
            Box::new(FixedTimers {
                t_origin,
                ttl,
                grace: Duration::ZERO,
                keep: Duration::ZERO,
            }),
            None,
            None,
        )
    }

    #[test]
    fn new_object_starts_offlru_and_not_in_heap() {
        let core = fixed_core(SystemTime::UNIX_EPOCH, Duration::from_secs(1));
        assert!(core.flags().contains(Flags::OFFLRU));
        assert_eq!(core.timer_idx(), NOIDX);
    }

    #[test]
    fn effective_deadline_sums_all_windows() {
        let origin = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let core = ObjectCore::new(
            Box::new(FixedTimers {
                t_origin: origin,
                ttl: Duration::from_secs(10),
                grace: Duration::from_secs(2),
                keep: Duration::from_secs(3),
            }),
            None,
            None,
        );
        assert_eq!(core.effective_deadline(), origin + Duration::from_secs(15));
    }

    #[test]
    fn distinct_objects_get_distinct_ids() {
        let a = fixed_core(SystemTime::UNIX_EPOCH, Duration::from_secs(1));
        let b = fixed_core(SystemTime::UNIX_EPOCH, Duration::from_secs(1));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn flags_bitset_insert_and_remove() {
        let mut flags = Flags::OFFLRU;
        flags.insert(Flags::DYING);
        assert!(flags.contains(Flags::OFFLRU));
        assert!(flags.contains(Flags::DYING));
        flags.remove(Flags::OFFLRU);
        assert!(!flags.contains(Flags::OFFLRU));
        assert!(flags.contains(Flags::DYING));
    }

    #[test]
    fn teardown_runs_on_last_drop() {
        use std::sync::atomic::AtomicBool;

        struct Flag(Arc<AtomicBool>);
        impl Teardown for Flag {
            fn teardown(&self, _id: ObjectId) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let torn_down = Arc::new(AtomicBool::new(false));
        let core = ObjectCore::new(
            Box::new(FixedTimers {
                t_origin: SystemTime::UNIX_EPOCH,
                ttl: Duration::from_secs(1),
                grace: Duration::ZERO,
                keep: Duration::ZERO,
            }),
            Some(Arc::new(Flag(torn_down.clone()))),
            None,
        );
        let second = Arc::clone(&core);
        drop(core);
        assert!(!torn_down.load(Ordering::SeqCst));
        drop(second);
        assert!(torn_down.load(Ordering::SeqCst));
    }
}
