//! `Engine`: the process-scoped handle wiring the LRU sets, the
//! mailbox, and the dedicated expiry thread together.
//!
//! §9's "Process-wide handle" design note recommends passing this
//! handle explicitly to collaborators' constructors (or encapsulating
//! it as a process-scoped singleton with an explicit init/teardown
//! lifecycle) rather than keeping a bare global pointer the way the
//! spec's source does; `Engine` is that explicit handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::SystemTime;

use tracing::info;

use crate::actor::ExpiryActor;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::lru::{Domains, LruSet};
use crate::mailbox::Mailbox;
use crate::metrics::{Stats, StatsSnapshot};
use crate::object::ObjectCore;
use crate::ops;

/// A resolved per-domain handle, returned by [`Engine::domain`]. Bundles
/// the domain's name (for Inject/Insert/Rearm, which mail by name) with
/// its `LruSet`, so callers don't have to thread both through
/// separately.
#[derive(Clone)]
pub struct DomainHandle {
    name: Arc<str>,
    lru: Arc<LruSet>,
    mailbox: Arc<Mailbox>,
    domains: Arc<Domains>,
}

impl DomainHandle {
    /// This domain's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Inject(oc, lru, when)`.
    pub fn inject(&self, oc: Arc<ObjectCore>, when: SystemTime) {
        ops::inject(&self.mailbox, &self.name, &self.lru, oc, when);
    }

    /// `Insert(object, now)`.
    pub fn insert(&self, oc: Arc<ObjectCore>, now: SystemTime) {
        ops::insert(&self.mailbox, &self.name, &self.lru, oc, now);
    }

    /// `Touch(oc, now)`. Returns whether the object actually moved.
    pub fn touch(&self, oc: &Arc<ObjectCore>, now: SystemTime) -> bool {
        ops::touch(&self.lru, oc, now)
    }

    /// `Rearm(object)`.
    pub fn rearm(&self, oc: &Arc<ObjectCore>) {
        ops::rearm(&self.mailbox, &self.domains, oc);
    }

    /// `NukeOne(domain)`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::CannotReclaim`] if this domain
    /// currently has no evictable object.
    pub fn nuke_one(&self) -> Result<()> {
        ops::nuke_one(&self.mailbox, &self.lru)
    }

    /// Number of objects currently linked into this domain's LRU set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lru.len()
    }

    /// Whether this domain currently holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lru.is_empty()
    }
}

/// The expiry/LRU engine: owns the domain registry, the mailbox, and
/// the dedicated expiry thread.
pub struct Engine {
    domains: Arc<Domains>,
    mailbox: Arc<Mailbox>,
    stats: Arc<Stats>,
    stop: Arc<AtomicBool>,
    actor_thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// `Init` (§6): constructs the domain registry, heap, and mailbox,
    /// and spawns the dedicated expiry thread (named `expiry-actor`,
    /// per §4.6).
    ///
    /// # Panics
    ///
    /// Panics if the underlying OS thread cannot be spawned.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// As [`Engine::new`], but with an explicit [`Clock`] — used by
    /// tests that need to drive the actor against a
    /// [`crate::clock::FakeClock`] instead of real wall-clock time.
    ///
    /// # Panics
    ///
    /// Panics if the underlying OS thread cannot be spawned.
    #[must_use]
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let stats = Arc::new(Stats::new());
        let domains = Arc::new(Domains::new(config.dontmove_default, Arc::clone(&stats)));
        let mailbox = Arc::new(Mailbox::new());
        let stop = Arc::new(AtomicBool::new(false));

        let mut actor = ExpiryActor::new(
            Arc::clone(&mailbox),
            Arc::clone(&domains),
            clock,
            config,
            Arc::clone(&stats),
        );
        let actor_stop = Arc::clone(&stop);
        let actor_thread = std::thread::Builder::new()
            .name("expiry-actor".to_string())
            .spawn(move || actor.run(&actor_stop))
            .expect("failed to spawn expiry-actor thread");

        info!("expiry engine started");
        Self {
            domains,
            mailbox,
            stats,
            stop,
            actor_thread: Some(actor_thread),
        }
    }

    /// Resolves (creating on first use) the named domain's handle —
    /// the "storage domain lookup" collaborator (§6), realized here as
    /// an in-process registry rather than caller-supplied state.
    #[must_use]
    pub fn domain(&self, name: &str) -> DomainHandle {
        DomainHandle {
            name: Arc::from(name),
            lru: self.domains.get_or_create(name),
            mailbox: Arc::clone(&self.mailbox),
            domains: Arc::clone(&self.domains),
        }
    }

    /// A point-in-time snapshot of the engine's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Signals the actor thread to stop after draining its mailbox, and
    /// joins it.
    ///
    /// The spec explicitly does not require this of the core ("Graceful
    /// shutdown is not required of the core — termination is
    /// process-scoped", §5); we still provide it as an optional clean
    /// join point for embedders like test harnesses and short-lived
    /// processes.
    ///
    /// # Panics
    ///
    /// Panics if the actor thread panicked.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        // Wake the actor if it's parked in `recv_timeout`; an empty
        // mail is not sent — the actor re-checks `stop` on every loop
        // iteration regardless of why it woke.
        if let Some(handle) = self.actor_thread.take() {
            handle.join().expect("expiry-actor thread panicked");
        }
        info!("expiry engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.actor_thread.is_some() {
            self.stop.store(true, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::object::ObjectTimers;
    use std::time::Duration;

    struct FixedTimers {
        t_origin: SystemTime,
        ttl: Duration,
    }
    impl ObjectTimers for FixedTimers {
        fn t_origin(&self) -> SystemTime {
            self.t_origin
        }
        fn ttl(&self) -> Duration {
            self.ttl
        }
        fn grace(&self) -> Duration {
            Duration::ZERO
        }
        fn keep(&self) -> Duration {
            Duration::ZERO
        }
    }

    #[test]
    fn insert_then_nuke_one_reports_cannot_reclaim_on_empty_domain() {
        let clock = Arc::new(FakeClock::new());
        let engine = Engine::with_clock(EngineConfig::default(), clock.clone() as Arc<dyn Clock>);
        let domain = engine.domain("images");
        assert!(domain.nuke_one().is_err());
        engine.shutdown();
    }

    #[test]
    fn insert_and_wait_eventually_expires() {
        let clock = Arc::new(FakeClock::at(SystemTime::UNIX_EPOCH + Duration::from_secs(100)));
        let engine = Engine::with_clock(EngineConfig::default(), clock.clone() as Arc<dyn Clock>);
        let domain = engine.domain("images");

        let oc = ObjectCore::new(
            Box::new(FixedTimers {
                t_origin: clock.now(),
                ttl: Duration::from_millis(10),
            }),
            None,
            None,
        );
        domain.insert(Arc::clone(&oc), clock.now());

        // Give the actor thread a moment to drain the INSERT mail and
        // move past the deadline; the clock itself only advances when
        // we call `advance`, so this is deterministic modulo scheduling.
        std::thread::sleep(Duration::from_millis(20));
        clock.advance(Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(50));

        let snap = engine.stats();
        assert_eq!(snap.n_expired, 1);
        engine.shutdown();
    }
}
