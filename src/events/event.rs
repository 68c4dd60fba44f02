//! # Runtime events emitted by the registries.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Registration events**: a registration begins or is re-armed (started, resumed, replaced)
//! - **Terminal events**: a registration ends (expired, cancelled, stopped on shutdown)
//! - **Failure events**: persist failures, callback and subscriber problems
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! identifier label, reasons, and scheduled delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use timervisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::Started)
//!     .with_id("session-42")
//!     .with_delay(Duration::from_secs(30));
//!
//! assert_eq!(ev.kind, EventKind::Started);
//! assert_eq!(ev.id.as_deref(), Some("session-42"));
//! assert_eq!(ev.delay_ms, Some(30_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `id`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `id`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Registration events ===
    /// A registration was created and its timer scheduled.
    ///
    /// Sets:
    /// - `id`: identifier label
    /// - `delay_ms`: delay until expiration (ms, `0` for past timestamps)
    /// - `expire_at`: expiration timestamp of the event
    Started,

    /// A persisted registration was re-armed without a new store write.
    ///
    /// Sets the same fields as [`EventKind::Started`].
    Resumed,

    /// A pending registration was displaced by a new `start` for the same identifier.
    ///
    /// Sets:
    /// - `id`: identifier label
    /// - `reason`: `"stopped"` or `"detached"` depending on the replace policy
    Replaced,

    // === Terminal events ===
    /// The timer fired and won arbitration; the callback is about to run.
    ///
    /// Sets:
    /// - `id`: identifier label
    /// - `expire_at`: expiration timestamp of the event
    Expired,

    /// A pending registration was cancelled before it fired.
    ///
    /// Sets:
    /// - `id`: identifier label
    Cancelled,

    /// A pending registration was stopped by a shutdown without being cancelled
    /// in the persistent store.
    ///
    /// Sets:
    /// - `id`: identifier label
    Stopped,

    // === Failure events ===
    /// The persistent store rejected a write; the registration was not created.
    ///
    /// Sets:
    /// - `id`: identifier label
    /// - `reason`: store error message
    PersistFailed,

    /// The expiration callback panicked; the registry remains usable.
    ///
    /// Sets:
    /// - `id`: identifier label
    /// - `reason`: panic info/message
    CallbackPanicked,

    /// The timer won its claim but the runtime shut down before the callback ran.
    ///
    /// Sets:
    /// - `id`: identifier label
    /// - `reason`: `"runtime shutting down"`
    CallbackAborted,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,

    /// Scheduled delay until expiration in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Expiration timestamp of the registered event.
    pub expire_at: Option<SystemTime>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Identifier label (the `Debug` form of the registration id), or subscriber name.
    pub id: Option<Arc<str>>,
    /// Event classification.
    pub kind: EventKind,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
            at: SystemTime::now(),
            delay_ms: None,
            expire_at: None,
            reason: None,
            id: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an identifier label.
    #[inline]
    pub fn with_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attaches a scheduled delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches the expiration timestamp.
    #[inline]
    pub fn with_expire_at(mut self, at: SystemTime) -> Self {
        self.expire_at = Some(at);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_id(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_id(subscriber)
            .with_reason(info)
    }

    /// Returns `true` for [`EventKind::SubscriberOverflow`].
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

/// Renders a registration identifier as an event label.
pub(crate) fn label<Id: std::fmt::Debug>(id: &Id) -> Arc<str> {
    Arc::from(format!("{id:?}"))
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_info(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
