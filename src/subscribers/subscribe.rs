//! # Subscribe: hook for observing registry events.
//!
//! A [`Subscribe`] implementation receives every [`Event`] a registry publishes:
//! registrations starting or resuming, timers expiring, cancellations, and failures
//! such as a rejected store write or a panicking callback.
//!
//! Each subscriber gets its own bounded queue and worker task inside a
//! [`SubscriberSet`](crate::SubscriberSet), so a slow subscriber only delays itself.
//! When its queue is full, events for that subscriber are dropped and a
//! `SubscriberOverflow` event is published instead.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use timervisor::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct ExpiryCounter(AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for ExpiryCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::Expired {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "expiry-counter" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Receiver of registry events.
///
/// `on_event` runs on the subscriber's worker task, never on the caller of
/// `start`/`cancel` and never on a timer task.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    async fn on_event(&self, event: &Event);

    /// Name reported in `SubscriberOverflow`/`SubscriberPanicked` events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Bound of this subscriber's queue (clamped to at least 1).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
