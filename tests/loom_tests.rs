//! Loom concurrency tests for the LRU set's `Touch`/`NukeOne` paths.
//!
//! These explore thread interleavings exhaustively rather than relying
//! on chance scheduling the way `tests/scenarios.rs`'s concurrent case
//! does.
//!
//! # Running
//!
//! ```bash
//! cargo +nightly test --features loom --test loom_tests
//! ```

#![cfg(loom)]

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use cache_expiry::lru::LruSet;
use cache_expiry::metrics::Stats;
use cache_expiry::object::{ObjectCore, ObjectTimers};

struct NoTimers;
impl ObjectTimers for NoTimers {
    fn t_origin(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH
    }
    fn ttl(&self) -> Duration {
        Duration::ZERO
    }
    fn grace(&self) -> Duration {
        Duration::ZERO
    }
    fn keep(&self) -> Duration {
        Duration::ZERO
    }
}

/// Two threads touching the same linked object concurrently must never
/// panic and must leave the set at exactly one entry — `Touch` is
/// defined to drop silently under contention (§4.1) rather than block.
#[test]
fn concurrent_touch_never_duplicates_or_drops_the_entry() {
    loom::model(|| {
        let set = Arc::new(LruSet::new(false, Arc::new(Stats::new())));
        let oc = ObjectCore::new(Box::new(NoTimers), None, None);
        set.lock().link(&oc);

        let set_a = Arc::clone(&set);
        let oc_a = Arc::clone(&oc);
        let t1 = loom::thread::spawn(move || {
            set_a.touch(&oc_a, SystemTime::UNIX_EPOCH);
        });
        let set_b = Arc::clone(&set);
        let oc_b = Arc::clone(&oc);
        let t2 = loom::thread::spawn(move || {
            set_b.touch(&oc_b, SystemTime::UNIX_EPOCH);
        });

        t1.join().unwrap();
        t2.join().unwrap();
        assert_eq!(set.len(), 1);
    });
}

/// A `Touch` racing a `NukeOne` on the same object must never leave the
/// set in a state where the object is both evicted and still linked.
#[test]
fn touch_racing_nuke_one_settles_on_one_outcome() {
    loom::model(|| {
        let set = Arc::new(LruSet::new(false, Arc::new(Stats::new())));
        let oc = ObjectCore::new(Box::new(NoTimers), None, None);
        set.lock().link(&oc);

        let set_touch = Arc::clone(&set);
        let oc_touch = Arc::clone(&oc);
        drop(oc); // the set holds only a Weak; oc_touch is now the sole strong owner
        let toucher = loom::thread::spawn(move || {
            set_touch.touch(&oc_touch, SystemTime::UNIX_EPOCH);
        });
        let set_nuke = Arc::clone(&set);
        let nuker = loom::thread::spawn(move || set_nuke.nuke_one().is_ok());

        toucher.join().unwrap();
        let nuked = nuker.join().unwrap();
        assert_eq!(set.len(), usize::from(!nuked));
    });
}
