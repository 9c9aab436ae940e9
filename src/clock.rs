//! Time source abstraction.
//!
//! The actor's main loop needs two very different notions of "now":
//! real wall-clock time in production, and a precisely steppable virtual
//! clock in tests that assert behavior at specific instants (e.g.
//! "advance to 109.999s, then to 110.001s"). [`Clock`] lets `actor.rs`
//! stay ignorant of which one it's driven by.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::sync::Mutex;

/// A source of the current time, abstracted so tests can drive the
/// actor deterministically instead of racing real wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// Converts a [`SystemTime`] to milliseconds since the Unix epoch,
/// saturating at the boundaries instead of panicking. This is the unit
/// [`crate::object::ObjectCore`] stores its timer deadline in, since an
/// atomic field needs a plain integer, not a `SystemTime`.
#[must_use]
pub fn to_millis(t: SystemTime) -> u64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => u64::try_from(d.as_millis()).unwrap_or(u64::MAX),
        Err(_) => 0,
    }
}

/// Converts milliseconds since the Unix epoch back to a [`SystemTime`].
#[must_use]
pub fn from_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}

/// The real system clock, used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A manually advanced clock for deterministic tests.
///
/// Starts at the Unix epoch unless constructed with [`FakeClock::at`].
/// Tests call [`FakeClock::advance`] or [`FakeClock::set`] between
/// assertions instead of sleeping.
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<SystemTime>,
}

impl FakeClock {
    /// Creates a clock starting at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::at(UNIX_EPOCH)
    }

    /// Creates a clock starting at a specific time.
    #[must_use]
    pub fn at(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, t: SystemTime) {
        *self.now.lock() = t;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }
}
