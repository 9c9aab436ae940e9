//! Error types for the expiry engine.
//!
//! The engine only has two user-visible failure modes: a reclaim attempt
//! that finds nothing evictable, and an invariant violation. Everything
//! else (contended `Touch`, a busy object, a lost race) is a normal,
//! expected outcome and is reported through plain return values instead
//! of this type.

use thiserror::Error;

/// Result type alias for expiry-engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while operating the expiry engine.
#[derive(Error, Debug)]
pub enum Error {
    /// `NukeOne` scanned the domain's LRU set and found no evictable
    /// candidate (every object is pinned, dying, or otherwise unfit).
    #[error("[EXPIRY-001] no evictable object in domain")]
    CannotReclaim,

    /// An invariant from the data model was violated. This indicates a
    /// bug in the engine or a caller misusing the API, not a transient
    /// condition; callers should not retry.
    #[error("[EXPIRY-002] invariant violation: {0}")]
    Malformed(&'static str),

    /// Catch-all for failures outside the two cases above (e.g. a
    /// collaborator trait returning an unexpected value).
    #[error("[EXPIRY-003] internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g. `"EXPIRY-001"`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CannotReclaim => "EXPIRY-001",
            Self::Malformed(_) => "EXPIRY-002",
            Self::Internal(_) => "EXPIRY-003",
        }
    }

    /// Returns true if a caller can reasonably retry after this error.
    ///
    /// `CannotReclaim` is recoverable (the domain may free up candidates
    /// later); `Malformed` and `Internal` indicate a bug and are not.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::CannotReclaim)
    }

    /// Builds a [`Error::Malformed`] and, in debug builds, also panics via
    /// `debug_assert!`, matching a condition that should be statically
    /// impossible.
    #[must_use]
    pub fn malformed(msg: &'static str) -> Self {
        debug_assert!(false, "invariant violation: {msg}");
        Self::Malformed(msg)
    }
}
