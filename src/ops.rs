//! The five public operations workers call to mutate LRU/heap state:
//! Inject, Insert, Touch, Rearm, and `NukeOne` (§4.5).
//!
//! Each function here takes the collaborators it needs explicitly
//! rather than reaching for a global — [`crate::engine::Engine`] is the
//! thin façade that holds those collaborators and forwards to these.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::trace;

use crate::error::{Error, Result};
use crate::lru::{Domains, LruSet};
use crate::mailbox::Mailbox;
use crate::object::{Flags, ObjectCore};

/// `Inject(oc, lru, when)` (§4.5): records a pre-computed wake time and
/// hands the object to the actor. The caller's reference transfers in
/// — the `Arc` passed here becomes the actor's. Linking onto the LRU
/// itself happens later, when the actor's `Inbox` step drains the
/// `INSERT` mail (§4.4) — Inject only marks the object and hands it
/// off.
pub fn inject(mailbox: &Mailbox, domain: &str, lru: &LruSet, oc: Arc<ObjectCore>, when: SystemTime) {
    oc.set_domain_name(domain);
    {
        // Held only to serialize with concurrent Touch/NukeOne on this
        // domain while the flags transition, matching §4.5's "under
        // lru.mtx, increment count, set OFFLRU | INSERT".
        let _guard = lru.lock();
        oc.flags().insert(Flags::OFFLRU | Flags::INSERT);
    }
    oc.set_timer_when(when);
    trace!(object = %oc.id(), domain = %domain, when = ?when, "inject");
    mailbox.mail(oc, false);
}

/// `Insert(object, now)` (§4.5): like `inject`, but derives `when` from
/// the object's own timers and records `last_lru`.
pub fn insert(mailbox: &Mailbox, domain: &str, lru: &LruSet, oc: Arc<ObjectCore>, now: SystemTime) {
    let when = oc.effective_deadline();
    oc.set_last_lru(now);
    inject(mailbox, domain, lru, oc, when);
}

/// `Touch(oc, now)` (§4.1/§4.5): moves `oc` to the tail of its LRU set
/// if it's currently linked, trading strict ordering for never blocking
/// on contention. Returns whether a move happened.
pub fn touch(lru: &LruSet, oc: &Arc<ObjectCore>, now: SystemTime) -> bool {
    lru.touch(oc, now)
}

/// `Rearm(object)` (§4.5): recomputes the effective wake time and, if
/// it changed, mails a `MOVE` (or `DYING`, for a negative effective
/// wake) to the actor — unless the object is already `OFFLRU`, in which
/// case a mail is already in flight and will pick up the new timers
/// itself on arrival.
pub fn rearm(mailbox: &Mailbox, domains: &Domains, oc: &Arc<ObjectCore>) {
    let dying = oc.kill_now();
    let when = oc.effective_deadline();
    if !dying && when == oc.timer_when() {
        return;
    }

    let lru = domains.resolve(oc);

    let already_mailed = {
        let mut guard = lru.lock();
        let mut flags = oc.flags();
        if flags.contains(Flags::OFFLRU) {
            true
        } else {
            flags.insert(if dying { Flags::DYING } else { Flags::MOVE });
            flags.insert(Flags::OFFLRU);
            drop(flags);
            guard.unlink(oc.id());
            false
        }
    };

    if !already_mailed {
        mailbox.mail(Arc::clone(oc), dying);
    }
}

/// `NukeOne(domain)` (§4.1/§4.5): the only space-pressure entry point.
/// Scans `lru` head-to-tail for the first evictable object, mails it to
/// the actor, and reports success — or [`Error::CannotReclaim`] if
/// nothing in the domain is currently evictable.
///
/// # Errors
///
/// Returns [`Error::CannotReclaim`] if no object in `lru` is currently
/// evictable (every candidate is `BUSY`, externally referenced, or its
/// object-head lock is contended).
pub fn nuke_one(mailbox: &Mailbox, lru: &LruSet) -> Result<()> {
    let oc = lru.nuke_one()?;
    mailbox.mail(oc, true);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Stats;
    use crate::object::ObjectTimers;
    use std::time::Duration;

    struct MutableTimers {
        t_origin: std::sync::Mutex<SystemTime>,
        ttl: std::sync::Mutex<Duration>,
    }

    impl ObjectTimers for MutableTimers {
        fn t_origin(&self) -> SystemTime {
            *self.t_origin.lock().unwrap()
        }
        fn ttl(&self) -> Duration {
            *self.ttl.lock().unwrap()
        }
        fn grace(&self) -> Duration {
            Duration::ZERO
        }
        fn keep(&self) -> Duration {
            Duration::ZERO
        }
    }

    fn harness() -> (Arc<Mailbox>, Arc<Domains>, Arc<LruSet>) {
        let mailbox = Arc::new(Mailbox::new());
        let stats = Arc::new(Stats::new());
        let domains = Arc::new(Domains::new(false, Arc::clone(&stats)));
        let lru = domains.get_or_create("images");
        (mailbox, domains, lru)
    }

    #[test]
    fn insert_derives_when_from_timers_and_mails_insert() {
        let (mailbox, _domains, lru) = harness();
        let origin = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let oc = ObjectCore::new(
            Box::new(MutableTimers {
                t_origin: std::sync::Mutex::new(origin),
                ttl: std::sync::Mutex::new(Duration::from_secs(10)),
            }),
            None,
            None,
        );

        insert(&mailbox, "images", &lru, Arc::clone(&oc), origin);

        assert_eq!(oc.timer_when(), origin + Duration::from_secs(10));
        assert!(oc.flags().contains(Flags::INSERT));
        assert!(oc.flags().contains(Flags::OFFLRU));
        assert!(!mailbox.is_empty());
    }

    #[test]
    fn rearm_is_noop_when_deadline_unchanged() {
        let (mailbox, domains, lru) = harness();
        let origin = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let oc = ObjectCore::new(
            Box::new(MutableTimers {
                t_origin: std::sync::Mutex::new(origin),
                ttl: std::sync::Mutex::new(Duration::from_secs(10)),
            }),
            None,
            None,
        );
        insert(&mailbox, "images", &lru, Arc::clone(&oc), origin);
        mailbox.try_recv(); // drain the insert mail as the actor would

        rearm(&mailbox, &domains, &oc);
        assert!(mailbox.is_empty(), "unchanged deadline must not re-mail");
    }

    #[test]
    fn rearm_to_earlier_deadline_mails_move() {
        let (mailbox, domains, lru) = harness();
        let origin = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let timers = Arc::new(MutableTimers {
            t_origin: std::sync::Mutex::new(origin),
            ttl: std::sync::Mutex::new(Duration::from_secs(400)),
        });
        let oc = ObjectCore::new(Box::new(SharedTimers(Arc::clone(&timers))), None, None);
        insert(&mailbox, "images", &lru, Arc::clone(&oc), origin);
        mailbox.try_recv();
        // actor's Inbox would have linked it onto the LRU and cleared OFFLRU
        lru.lock().link(&oc);

        *timers.ttl.lock().unwrap() = Duration::from_secs(200);
        rearm(&mailbox, &domains, &oc);

        assert!(oc.flags().contains(Flags::MOVE));
        assert!(!mailbox.is_empty());
    }

    #[test]
    fn nuke_one_reports_cannot_reclaim_on_empty_domain() {
        let (mailbox, _domains, lru) = harness();
        assert!(matches!(nuke_one(&mailbox, &lru), Err(Error::CannotReclaim)));
    }

    #[test]
    fn nuke_one_mails_the_evicted_object() {
        let (mailbox, _domains, lru) = harness();
        let oc = ObjectCore::new(
            Box::new(MutableTimers {
                t_origin: std::sync::Mutex::new(SystemTime::UNIX_EPOCH),
                ttl: std::sync::Mutex::new(Duration::ZERO),
            }),
            None,
            None,
        );
        lru.lock().link(&oc);

        nuke_one(&mailbox, &lru).unwrap();
        assert!(!mailbox.is_empty());
    }

    struct SharedTimers(Arc<MutableTimers>);
    impl ObjectTimers for SharedTimers {
        fn t_origin(&self) -> SystemTime {
            self.0.t_origin()
        }
        fn ttl(&self) -> Duration {
            self.0.ttl()
        }
        fn grace(&self) -> Duration {
            Duration::ZERO
        }
        fn keep(&self) -> Duration {
            Duration::ZERO
        }
    }
}
