//! # Replacement policy for colliding identifiers.
//!
//! [`ReplacePolicy`] decides what happens to a pending registration when `start`
//! is called again with the same identifier.
//!
//! - [`ReplacePolicy::StopPrevious`] the prior timer is stopped and its callback never runs (default).
//! - [`ReplacePolicy::Detach`] the prior timer keeps running and still fires its own callback,
//!   but it is no longer reachable through `cancel`.
//!
//! ## Behavior on collision
//! ```text
//! start(id, e1, cb1)  ──► record#1
//! start(id, e2, cb2)  ──► record#2 replaces record#1 in the map
//!
//! StopPrevious:  record#1 claimed + stopped  → cb1 never runs, Replaced published
//! Detach:        record#1 left running       → cb1 runs at e1.expire_at(),
//!                                              record#2 is untouched by it
//! ```
//!
//! In both cases the newer registration owns the identifier from then on.

/// Policy controlling how a second `start` treats a still-pending registration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Stop the prior timer; its callback is dropped without running (default).
    #[default]
    StopPrevious,
    /// Leave the prior timer running as an orphan: it fires its own callback
    /// but cannot be cancelled and never removes the newer record.
    Detach,
}

impl ReplacePolicy {
    /// Returns `true` when the prior registration must be stopped.
    #[inline]
    pub fn stops_previous(self) -> bool {
        matches!(self, ReplacePolicy::StopPrevious)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stops_previous() {
        assert_eq!(ReplacePolicy::default(), ReplacePolicy::StopPrevious);
        assert!(ReplacePolicy::default().stops_previous());
        assert!(!ReplacePolicy::Detach.stops_previous());
    }
}
