//! # `cache-expiry`
//!
//! The object expiry and LRU engine of an HTTP caching reverse proxy.
//!
//! Cached response objects each carry a time-of-origin, a time-to-live,
//! a grace window, and a keep window. This crate decides **when** each
//! cached object must be retired, maintains a **least-recently-used**
//! ordering per storage domain so space can be reclaimed on demand, and
//! coordinates those decisions — insert, touch, rearm, forced eviction
//! — across many worker threads with a single dedicated expiry thread.
//!
//! The surrounding HTTP fetch/forward machinery, routing policy,
//! storage backends, hashing, and session management are out of scope;
//! this crate accepts timers as inputs and enforces them. There is no
//! wire protocol or persistence format at this layer — it is an
//! in-process library.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::{Duration, SystemTime};
//!
//! use cache_expiry::{Engine, EngineConfig, ObjectCore, ObjectTimers};
//!
//! struct ResponseTimers {
//!     t_origin: SystemTime,
//!     ttl: Duration,
//! }
//!
//! impl ObjectTimers for ResponseTimers {
//!     fn t_origin(&self) -> SystemTime { self.t_origin }
//!     fn ttl(&self) -> Duration { self.ttl }
//!     fn grace(&self) -> Duration { Duration::ZERO }
//!     fn keep(&self) -> Duration { Duration::ZERO }
//! }
//!
//! let engine = Engine::new(EngineConfig::default());
//! let images = engine.domain("images");
//!
//! let object = ObjectCore::new(
//!     Box::new(ResponseTimers { t_origin: SystemTime::now(), ttl: Duration::from_secs(120) }),
//!     None,
//!     None,
//! );
//! images.insert(Arc::clone(&object), SystemTime::now());
//!
//! // Reorder on a cache hit:
//! images.touch(&object, SystemTime::now());
//!
//! // Reclaim space for a new fetch when the domain is full:
//! match images.nuke_one() {
//!     Ok(()) => {}
//!     Err(_) => { /* nothing evictable right now */ }
//! }
//!
//! engine.shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actor;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod heap;
pub mod lru;
pub mod mailbox;
pub mod metrics;
pub mod object;
pub mod ops;
pub(crate) mod sync;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::{DomainHandle, Engine};
pub use error::{Error, Result};
pub use lru::{Domains, LruSet};
pub use metrics::{Stats, StatsSnapshot};
pub use object::{Flags, MetadataSink, ObjectCore, ObjectId, ObjectTimers, Teardown, NOIDX};
