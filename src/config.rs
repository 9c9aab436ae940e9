//! Engine configuration.
//!
//! Covers the tunables spec.md leaves as "cosmetic constants": how long
//! the actor naps when the heap is empty, how long it backs off when it
//! finds a busy object or loses a race, and whether a domain's LRU
//! ordering is frozen (`dontmove`). Loaded from a TOML file, environment
//! variables, or defaults, layered the same way as the rest of this
//! crate's ambient configuration.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`EXPIRY_*`)
//! 2. Configuration file
//! 3. Default values

use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to parse configuration from a file, string, or environment.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue {
        /// Configuration key that failed validation.
        key: String,
        /// Validation error message.
        message: String,
    },
}

/// Tunables for the expiry engine.
///
/// `#[serde(default)]` lets a configuration file override only the
/// fields it mentions; unmentioned fields keep [`EngineConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long the actor sleeps when the heap is empty, in
    /// milliseconds. Spec.md's `Expire` contract calls this `π_approx`:
    /// a long nap that is still finite, so a freshly inserted object
    /// never waits longer than this for the actor to notice it.
    pub empty_heap_nap_ms: u64,

    /// How long the actor backs off after `Expire` finds the root
    /// object `BUSY` (its flags mutex contended), in milliseconds.
    pub busy_retry_delay_ms: u64,

    /// How long the actor backs off after losing a race to another
    /// agent that rearmed or unlinked the object first, in
    /// milliseconds.
    pub lost_race_retry_delay_ms: u64,

    /// Default value of a newly created domain's `dontmove` flag. When
    /// set, `Touch` on that domain is always a no-op, matching
    /// spec.md's per-domain LRU freeze.
    pub dontmove_default: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            empty_heap_nap_ms: 30_000,
            busy_retry_delay_ms: 10,
            lost_race_retry_delay_ms: 1,
            dontmove_default: false,
        }
    }
}

impl EngineConfig {
    /// Nap duration when the heap is empty.
    #[must_use]
    pub fn empty_heap_nap(&self) -> Duration {
        Duration::from_millis(self.empty_heap_nap_ms)
    }

    /// Retry delay after finding the root object busy.
    #[must_use]
    pub fn busy_retry_delay(&self) -> Duration {
        Duration::from_millis(self.busy_retry_delay_ms)
    }

    /// Retry delay after losing a race to another agent.
    #[must_use]
    pub fn lost_race_retry_delay(&self) -> Duration {
        Duration::from_millis(self.lost_race_retry_delay_ms)
    }

    /// Loads configuration layering defaults, an optional file at
    /// `path`, and `EXPIRY_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but fails to parse, or if an
    /// environment variable can't be coerced into its field's type.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("EXPIRY_"));

        figment.extract().map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Builds configuration from a TOML string, layered over defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the string fails to parse as TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str));

        figment.extract().map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any delay is configured to zero, which would
    /// turn the actor's backoff into a busy-spin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.empty_heap_nap_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "empty_heap_nap_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.busy_retry_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "busy_retry_delay_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.lost_race_retry_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "lost_race_retry_delay_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
