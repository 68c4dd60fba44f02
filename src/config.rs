//! # Registry configuration.
//!
//! Provides [`Config`] centralized settings for registries built through
//! [`Builder`](crate::Builder) or [`Simple::with_config`](crate::Simple::with_config).
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1 by [`Bus`](crate::Bus)

use crate::policies::ReplacePolicy;

/// Configuration shared by the in-memory and durable registries.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `replace`: What a second `start` for a pending identifier does with the old timer
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Policy applied when an identifier is started while still pending.
    pub replace: ReplacePolicy,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `replace = ReplacePolicy::StopPrevious`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            replace: ReplacePolicy::default(),
        }
    }
}
