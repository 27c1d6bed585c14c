//! Runtime configuration for the hierarchy engine
//!
//! `HierarchyConfig` is built once at startup, either from defaults or from
//! environment variables, and handed to `HierarchyService`.
//!
//! # Environment Variables
//!
//! - `ORGTREE_STORE_TIMEOUT_MS`: per-call store timeout (default: 5000)
//! - `ORGTREE_EVENT_CAPACITY`: domain event channel capacity (default: 128)

use std::env;
use std::time::Duration;

/// Default store timeout before a call surfaces as `Unavailable`
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Broadcast channel capacity for domain events
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

pub const STORE_TIMEOUT_ENV: &str = "ORGTREE_STORE_TIMEOUT_MS";
pub const EVENT_CAPACITY_ENV: &str = "ORGTREE_EVENT_CAPACITY";

/// Engine configuration. Immutable once the service is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyConfig {
    /// Upper bound for every individual store call
    pub store_timeout: Duration,

    /// Capacity of the domain event broadcast channel (must be > 0)
    pub event_channel_capacity: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl HierarchyConfig {
    /// Build config from the process environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup
    ///
    /// Unparseable or zero values are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(STORE_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.store_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(
                    "Ignoring invalid {}={:?}, using {:?}",
                    STORE_TIMEOUT_ENV,
                    raw,
                    config.store_timeout
                ),
            }
        }

        if let Some(raw) = lookup(EVENT_CAPACITY_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => config.event_channel_capacity = capacity,
                _ => tracing::warn!(
                    "Ignoring invalid {}={:?}, using {}",
                    EVENT_CAPACITY_ENV,
                    raw,
                    config.event_channel_capacity
                ),
            }
        }

        config
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}
