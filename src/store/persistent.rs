//! # Persistent: durable wrapper around [`Simple`].
//!
//! Mirrors the lifetime of every registration into an external [`Db`], so a
//! restarted process can recover pending events from it.
//!
//! ## Flow
//! ```text
//! start(id, e, cb)
//!   ├─► runtime present?            no  → Err(NoRuntime), store untouched
//!   ├─► db.put(id, e)               err → publish PersistFailed, Err(..), no record
//!   ├─► stopped a pending (id, old)? yes → db.delete(id, old); db.put(id, e)
//!   │                                      err → db.delete(id, e), PersistFailed, Err(..), no record
//!   └─► Simple timer armed with || { db.delete(id, e); cb() }
//!
//! cancel(id)
//!   ├─► Simple::cancel(id)          None → return None, store untouched
//!   └─► db.delete(id, e)            → Some(e)
//!
//! shutdown()  → timers stopped, store untouched (entries survive the restart)
//! resume(..)  → like start, but without db.put (entry is already persisted)
//! ```
//!
//! ## Rules
//! - `put` failures abort the registration; `delete` failures are never observed
//! - The expiry delete always runs **before** the caller's callback
//! - A registration stopped by a replacement never runs its cleanup, so the
//!   replacing call deletes the old pair itself and then rewrites the new one
//!   (the two pairs may share a row)
//! - Store and map are never wrapped in a shared transaction

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crate::{
    config::Config,
    error::StoreError,
    events::{Bus, Event, EventKind, label},
    expiring::Expiring,
    store::{OnExpire, Store, simple::current_runtime},
};

use super::Simple;

/// # Persistent storage consumed by [`Persistent`].
///
/// ### Contract
/// - `put` must be safe to call concurrently for distinct identifiers.
///   An error aborts the corresponding `start`.
/// - `delete` must be idempotent: it may be called for an entry that was already
///   deleted. It runs on Tokio's blocking pool when an event expires.
/// - A replacing `start` calls `put(id, new)`, then `delete(id, old)`, then
///   `put(id, new)` again, so the newest pair is stored whatever `delete` matched.
/// - When replacements are detached (see [`ReplacePolicy::Detach`](crate::ReplacePolicy)),
///   an orphaned timer deletes `(id, old_event)`. Stores keyed only by `id` should
///   compare the event before deleting.
pub trait Db<Id, E>: Send + Sync + 'static {
    /// Persists `(id, event)`.
    ///
    /// # Errors
    /// Any [`StoreError`]; conventionally [`StoreError::Persist`].
    fn put(&self, id: &Id, event: &E) -> Result<(), StoreError>;

    /// Removes `(id, event)`. Failures are swallowed by the implementation.
    fn delete(&self, id: &Id, event: &E);
}

/// Durable registry: a [`Simple`] whose registrations are mirrored into `D`.
pub struct Persistent<Id, E, D> {
    db: Arc<D>,
    mem: Simple<Id, E>,
}

impl<Id, E, D> Clone for Persistent<Id, E, D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            mem: self.mem.clone(),
        }
    }
}

impl<Id, E, D> Persistent<Id, E, D>
where
    Id: Eq + Hash,
{
    /// Creates a durable registry over `db` with [`Config::default`].
    pub fn new(db: D) -> Self {
        Self::with_config(db, Config::default())
    }

    /// Creates a durable registry over `db`.
    pub fn with_config(db: D, cfg: Config) -> Self {
        Self::from_parts(Arc::new(db), Simple::with_config(cfg))
    }

    pub(crate) fn from_parts(db: Arc<D>, mem: Simple<Id, E>) -> Self {
        Self { db, mem }
    }

    /// The underlying store.
    pub fn db(&self) -> &D {
        &self.db
    }

    /// Event bus this registry publishes to.
    pub fn bus(&self) -> &Bus {
        self.mem.bus()
    }

    /// Returns `true` if `id` has a pending registration in memory.
    pub fn contains(&self, id: &Id) -> bool {
        self.mem.contains(id)
    }

    /// Number of pending in-memory registrations.
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    /// Returns `true` if nothing is pending in memory.
    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }
}

impl<Id, E, D> Persistent<Id, E, D>
where
    Id: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    E: Expiring + Clone + Send + Sync + 'static,
    D: Db<Id, E>,
{
    /// Persists `(id, event)`, then registers it in memory.
    ///
    /// When the event expires, `(id, event)` is deleted from the store and then
    /// `on_expire` runs. If this stops a pending registration for `id`
    /// ([`ReplacePolicy::StopPrevious`](crate::ReplacePolicy)), that pair is deleted
    /// and `(id, event)` is written once more.
    ///
    /// # Errors
    /// - [`StoreError::NoRuntime`] outside a Tokio runtime (the store is not written)
    /// - whatever [`Db::put`] returned; no registration is created. When the
    ///   rewrite after a replacement fails, neither registration survives.
    pub fn start<F>(&self, id: Id, event: E, on_expire: F) -> Result<(), StoreError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.persist_and_arm(id, event, Box::new(on_expire))
    }

    /// Re-arms an entry that is already in the store, without writing it again.
    ///
    /// Intended for recovery after a restart: load pending entries from the store
    /// and resume each one. Past expirations fire almost immediately. The entry is
    /// only rewritten when resuming stops a pending registration for the same `id`.
    ///
    /// # Errors
    /// - [`StoreError::NoRuntime`] outside a Tokio runtime
    /// - a [`Db::put`] error from that rewrite; the resumed registration is then dropped
    pub fn resume<F>(&self, id: Id, event: E, on_expire: F) -> Result<(), StoreError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.arm_mirrored(id, event, Box::new(on_expire), EventKind::Resumed)
    }

    /// Cancels the pending registration for `id` and deletes it from the store.
    ///
    /// Returns `None` without touching the store when nothing was pending.
    pub fn cancel(&self, id: &Id) -> Option<E> {
        let event = self.mem.cancel(id)?;
        self.db.delete(id, &event);
        Some(event)
    }

    /// Unordered snapshot of pending identifiers.
    pub fn ids(&self) -> Vec<Id> {
        self.mem.ids()
    }

    /// Cancels every pending registration, deleting each from the store.
    pub fn cancel_all(&self) -> Vec<(Id, E)> {
        let cancelled = self.mem.cancel_all();
        for (id, event) in &cancelled {
            self.db.delete(id, event);
        }
        cancelled
    }

    /// Stops every pending timer but keeps the store intact.
    ///
    /// Use before process exit: the persisted entries can be handed to
    /// [`resume`](Self::resume) by the next process. Returns how many were stopped.
    pub fn shutdown(&self) -> usize {
        self.mem.shutdown()
    }

    fn persist_and_arm(&self, id: Id, event: E, on_expire: OnExpire) -> Result<(), StoreError> {
        current_runtime()?;
        self.write(&id, &event)?;
        self.arm_mirrored(id, event, on_expire, EventKind::Started)
    }

    /// Arms `(id, event)` in memory; a registration it stops has its pair deleted
    /// and `(id, event)` rewritten before the new timer is scheduled.
    fn arm_mirrored(
        &self,
        id: Id,
        event: E,
        on_expire: OnExpire,
        kind: EventKind,
    ) -> Result<(), StoreError> {
        let wrapped = self.with_cleanup(id.clone(), event.clone(), on_expire);
        self.mem
            .arm_with(id.clone(), event.clone(), wrapped, kind, |displaced| {
                self.db.delete(&id, displaced);
                self.write(&id, &event)
                    .inspect_err(|_| self.db.delete(&id, &event))
            })
    }

    /// `db.put`, publishing [`EventKind::PersistFailed`] on rejection.
    fn write(&self, id: &Id, event: &E) -> Result<(), StoreError> {
        self.db.put(id, event).inspect_err(|err| {
            self.mem.bus().publish(
                Event::new(EventKind::PersistFailed)
                    .with_id(label(id))
                    .with_reason(err.to_string()),
            );
        })
    }

    /// Wraps `on_expire` so the store entry is deleted first.
    fn with_cleanup(&self, id: Id, event: E, on_expire: OnExpire) -> OnExpire {
        let db = Arc::clone(&self.db);
        Box::new(move || {
            db.delete(&id, &event);
            on_expire();
        })
    }
}

impl<Id, E, D> Store<Id, E> for Persistent<Id, E, D>
where
    Id: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    E: Expiring + Clone + Send + Sync + 'static,
    D: Db<Id, E>,
{
    fn start(&self, id: Id, event: E, on_expire: OnExpire) -> Result<(), StoreError> {
        self.persist_and_arm(id, event, on_expire)
    }

    fn cancel(&self, id: &Id) -> Option<E> {
        Persistent::cancel(self, id)
    }
}
