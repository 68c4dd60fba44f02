//! # Expiring events.
//!
//! [`Expiring`] is the only capability a registry requires from the events it
//! holds: an absolute expiration timestamp. Event content is otherwise opaque.
//!
//! ## Example
//! ```
//! use std::time::{Duration, SystemTime};
//! use timervisor::Expiring;
//!
//! struct Lease { until: SystemTime }
//!
//! impl Expiring for Lease {
//!     fn expire_at(&self) -> SystemTime { self.until }
//! }
//!
//! let lease = Lease { until: SystemTime::now() + Duration::from_secs(60) };
//! assert!(timervisor::delay_until(lease.expire_at()) <= Duration::from_secs(60));
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// A value that knows when it expires.
pub trait Expiring {
    /// Wall-clock instant at which the event expires.
    fn expire_at(&self) -> SystemTime;
}

impl Expiring for SystemTime {
    fn expire_at(&self) -> SystemTime {
        *self
    }
}

impl<T: Expiring + ?Sized> Expiring for Arc<T> {
    fn expire_at(&self) -> SystemTime {
        (**self).expire_at()
    }
}

impl<T: Expiring + ?Sized> Expiring for Box<T> {
    fn expire_at(&self) -> SystemTime {
        (**self).expire_at()
    }
}

/// Time left until `at`, saturating to zero for timestamps in the past.
#[inline]
pub fn delay_until(at: SystemTime) -> Duration {
    at.duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn past_timestamp_has_zero_delay() {
        let past = SystemTime::now() - Duration::from_secs(10);
        assert_eq!(delay_until(past), Duration::ZERO);
        assert_eq!(delay_until(SystemTime::UNIX_EPOCH), Duration::ZERO);
    }

    #[test]
    fn future_timestamp_is_bounded_by_distance() {
        let delay = delay_until(SystemTime::now() + Duration::from_secs(60));
        assert!(delay <= Duration::from_secs(60));
        assert!(delay > Duration::from_secs(59));
    }

    #[test]
    fn wrappers_delegate() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
        assert_eq!(Arc::new(at).expire_at(), at);
        assert_eq!(Box::new(at).expire_at(), at);
    }
}
