//! Registries: the `Store` contract and its two implementations.
//!
//! ## Contents
//! - [`Store`] start/cancel contract shared by both registries (object-safe)
//! - [`Simple`] in-memory registry; owns the expire-vs-cancel arbitration
//! - [`Persistent`] durable registry; mirrors registrations into a [`Db`]
//! - [`Builder`] wires [`Config`](crate::Config), bus and subscribers
//!
//! ## Lifecycle
//! ```text
//! start(id, event, on_expire)
//!   └─► record inserted ──► timer task sleeps until event.expire_at()
//!                               │
//!           cancel(id) ─────────┤  both race for the record's claim flag
//!                               │
//!         ┌─────────────────────┴─────────────────────┐
//!         ▼                                           ▼
//!   cancel claims first                       timer claims first
//!   → timer stopped, Some(event)              → record removed (compare-and-delete)
//!   → on_expire never runs                    → on_expire runs once
//!                                             → cancel(id) returns None
//! ```

mod builder;
mod persistent;
mod simple;

pub use builder::Builder;
pub use persistent::{Db, Persistent};
pub use simple::Simple;

use std::sync::Arc;

use crate::error::StoreError;

/// Boxed expiration callback, as accepted by the object-safe [`Store`] trait.
pub type OnExpire = Box<dyn FnOnce() + Send + 'static>;

/// Shared handle to any registry.
pub type StoreRef<Id, E> = Arc<dyn Store<Id, E>>;

/// # Keyed expiring-event registry.
///
/// Implemented by [`Simple`] and [`Persistent`]. Both also expose generic
/// inherent `start` methods that take any `FnOnce() + Send + 'static`, so
/// boxing is only needed when going through this trait.
///
/// For every successful `start`, exactly one of the following is observed,
/// exactly once: `on_expire` runs, or `cancel` returns `Some(event)`.
pub trait Store<Id, E>: Send + Sync {
    /// Registers `event` under `id` and schedules `on_expire` at `event.expire_at()`.
    ///
    /// # Errors
    /// - [`StoreError::NoRuntime`] when called outside a Tokio runtime
    /// - [`StoreError::Persist`] when a durable registry's store rejects the write
    fn start(&self, id: Id, event: E, on_expire: OnExpire) -> Result<(), StoreError>;

    /// Cancels the pending registration for `id`.
    ///
    /// Returns the event when this call stopped it, `None` when nothing was pending
    /// (never registered, already expired, or already cancelled).
    fn cancel(&self, id: &Id) -> Option<E>;
}
