//! # Simple: in-memory expiring-event registry.
//!
//! Maps identifiers to registration records in a sharded [`DashMap`] and runs one
//! Tokio timer task per registration.
//!
//! ## Arbitration
//! Every registration owns a `Claim`: an atomic flag plus the timer's stop token.
//! The timer task, `cancel`, and a stopping replacement all race to take the flag;
//! only the winner acts.
//!
//! ```text
//! timer task:  sleep(delay) ─► take claim? ─ no ──► exit silently
//!                                  │ yes
//!                                  ├─► remove_if(id, same claim)   (never touches a newer record)
//!                                  ├─► publish Expired
//!                                  └─► spawn_blocking(on_expire)   (panic → CallbackPanicked,
//!                                                                   runtime gone → CallbackAborted)
//!
//! cancel(id):  remove(id) ─► take claim? ─ no ──► None  (timer already won)
//!                                │ yes
//!                                ├─► stop token cancelled (timer wakes and exits)
//!                                └─► Some(event), publish Cancelled
//! ```
//!
//! ## Rules
//! - The record is inserted **before** its timer is spawned
//! - Map guards are never held across `.await` or across user callbacks
//! - Callbacks run on the blocking pool so a synchronous store delete never stalls a worker
//! - Dropping the last handle stops every pending timer without running callbacks

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use tokio::{runtime::Handle, select, task::JoinError, time};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::StoreError,
    events::{Bus, Event, EventKind, label, panic_info},
    expiring::{Expiring, delay_until},
    policies::ReplacePolicy,
    store::{OnExpire, Store},
};

/// Arbitration point shared by a record and its timer task.
struct Claim {
    taken: AtomicBool,
    stop: CancellationToken,
}

impl Claim {
    fn new(stop: CancellationToken) -> Self {
        Self {
            taken: AtomicBool::new(false),
            stop,
        }
    }

    /// Returns `true` for exactly one caller over the claim's lifetime.
    fn take(&self) -> bool {
        !self.taken.swap(true, Ordering::AcqRel)
    }

    fn is_taken(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }
}

struct Record<E> {
    event: E,
    claim: Arc<Claim>,
}

struct Inner<Id, E> {
    records: DashMap<Id, Record<E>>,
    replace: ReplacePolicy,
    bus: Bus,
    /// Parent of every record's stop token.
    root: CancellationToken,
}

impl<Id, E> Drop for Inner<Id, E> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// In-memory registry of expiring events.
///
/// Cheap to clone; clones share the same records.
///
/// # Example
/// ```
/// use std::time::{Duration, SystemTime};
/// use timervisor::Simple;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), timervisor::StoreError> {
///     let store: Simple<&str, SystemTime> = Simple::new();
///     let (tx, rx) = tokio::sync::oneshot::channel();
///
///     store.start("job", SystemTime::now() + Duration::from_millis(10), move || {
///         let _ = tx.send(());
///     })?;
///
///     rx.await.ok();
///     assert!(store.cancel(&"job").is_none());
///     Ok(())
/// }
/// ```
pub struct Simple<Id, E> {
    inner: Arc<Inner<Id, E>>,
}

impl<Id, E> Clone for Simple<Id, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Id, E> Default for Simple<Id, E>
where
    Id: Eq + Hash,
{
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl<Id, E> Simple<Id, E>
where
    Id: Eq + Hash,
{
    /// Creates a registry with [`Config::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with its own bus sized from `cfg`.
    pub fn with_config(cfg: Config) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self::from_parts(&cfg, bus, CancellationToken::new())
    }

    /// `root` is cancelled when the last handle is dropped; anything tied to the
    /// registry's lifetime (timers, the subscriber listener) should watch it.
    pub(crate) fn from_parts(cfg: &Config, bus: Bus, root: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                records: DashMap::new(),
                replace: cfg.replace,
                bus,
                root,
            }),
        }
    }

    /// Event bus this registry publishes to.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Returns `true` if `id` has a pending registration.
    pub fn contains(&self, id: &Id) -> bool {
        self.inner.records.contains_key(id)
    }

    /// Number of pending registrations.
    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }
}

impl<Id, E> Simple<Id, E>
where
    Id: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    E: Expiring + Send + Sync + 'static,
{
    /// Registers `event` under `id`; `on_expire` runs once the event expires.
    ///
    /// A timestamp in the past is legal and fires almost immediately.
    /// A still-pending registration for the same `id` is displaced according
    /// to [`Config::replace`].
    ///
    /// # Errors
    /// [`StoreError::NoRuntime`] if called outside a Tokio runtime.
    pub fn start<F>(&self, id: Id, event: E, on_expire: F) -> Result<(), StoreError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.arm(id, event, Box::new(on_expire), EventKind::Started)
    }

    /// Cancels the pending registration for `id`.
    ///
    /// Returns `Some(event)` only if this call stopped the registration before its
    /// timer claimed it; `on_expire` will then never run. Never blocks on a running callback.
    pub fn cancel(&self, id: &Id) -> Option<E> {
        self.take(id, EventKind::Cancelled)
    }

    /// Unordered snapshot of pending identifiers.
    pub fn ids(&self) -> Vec<Id> {
        self.inner
            .records
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Cancels every pending registration and returns what was cancelled.
    pub fn cancel_all(&self) -> Vec<(Id, E)> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.cancel(&id).map(|event| (id, event)))
            .collect()
    }

    /// Stops every pending timer without running callbacks.
    ///
    /// Publishes [`EventKind::Stopped`] (not `Cancelled`) per registration and
    /// returns how many were stopped. The registry stays usable afterwards.
    pub fn shutdown(&self) -> usize {
        self.ids()
            .into_iter()
            .filter(|id| self.take(id, EventKind::Stopped).is_some())
            .count()
    }

    /// Inserts the record, displaces any previous one, then spawns its timer.
    pub(crate) fn arm(
        &self,
        id: Id,
        event: E,
        on_expire: OnExpire,
        kind: EventKind,
    ) -> Result<(), StoreError> {
        self.arm_with(id, event, on_expire, kind, |_| Ok(()))
    }

    /// Like [`arm`](Self::arm), but hands a displaced event that this call stopped
    /// to `on_displaced` before the new timer exists.
    ///
    /// The stopped callback never runs, so `on_displaced` owns whatever cleanup it
    /// carried. If `on_displaced` fails, the new record is withdrawn and nothing is
    /// scheduled.
    pub(crate) fn arm_with<H>(
        &self,
        id: Id,
        event: E,
        on_expire: OnExpire,
        kind: EventKind,
        on_displaced: H,
    ) -> Result<(), StoreError>
    where
        H: FnOnce(&E) -> Result<(), StoreError>,
    {
        let runtime = current_runtime()?;
        let expire_at = event.expire_at();
        let delay = delay_until(expire_at);
        let claim = Arc::new(Claim::new(self.inner.root.child_token()));
        let name = label(&id);

        let record = Record {
            event,
            claim: Arc::clone(&claim),
        };
        let displaced = self
            .inner
            .records
            .insert(id.clone(), record)
            .and_then(|prev| self.displace(&name, prev));

        if let Some(prev) = displaced {
            if let Err(err) = on_displaced(&prev) {
                if claim.take() {
                    self.inner
                        .records
                        .remove_if(&id, |_, rec| Arc::ptr_eq(&rec.claim, &claim));
                }
                return Err(err);
            }
        }

        self.inner.bus.publish(
            Event::new(kind)
                .with_id(Arc::clone(&name))
                .with_delay(delay)
                .with_expire_at(expire_at),
        );

        runtime.spawn(run_timer(
            Arc::downgrade(&self.inner),
            Timer {
                id,
                claim,
                delay,
                expire_at,
                name,
            },
            on_expire,
        ));
        Ok(())
    }

    fn displace(&self, name: &Arc<str>, prev: Record<E>) -> Option<E> {
        if self.inner.replace.stops_previous() {
            if prev.claim.take() {
                prev.claim.stop.cancel();
                self.publish_replaced(name, "stopped");
                return Some(prev.event);
            }
        } else if !prev.claim.is_taken() {
            self.publish_replaced(name, "detached");
        }
        None
    }

    fn publish_replaced(&self, name: &Arc<str>, how: &'static str) {
        self.inner.bus.publish(
            Event::new(EventKind::Replaced)
                .with_id(Arc::clone(name))
                .with_reason(how),
        );
    }

    fn take(&self, id: &Id, kind: EventKind) -> Option<E> {
        let (_, record) = self.inner.records.remove(id)?;
        if !record.claim.take() {
            return None;
        }
        record.claim.stop.cancel();
        self.inner
            .bus
            .publish(Event::new(kind).with_id(label(id)));
        Some(record.event)
    }
}

impl<Id, E> Store<Id, E> for Simple<Id, E>
where
    Id: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    E: Expiring + Send + Sync + 'static,
{
    fn start(&self, id: Id, event: E, on_expire: OnExpire) -> Result<(), StoreError> {
        self.arm(id, event, on_expire, EventKind::Started)
    }

    fn cancel(&self, id: &Id) -> Option<E> {
        Simple::cancel(self, id)
    }
}

/// Returns the ambient Tokio runtime, or [`StoreError::NoRuntime`].
pub(crate) fn current_runtime() -> Result<Handle, StoreError> {
    Handle::try_current().map_err(|_| StoreError::NoRuntime)
}

/// Everything a timer task needs besides the callback.
struct Timer<Id> {
    id: Id,
    claim: Arc<Claim>,
    delay: Duration,
    expire_at: SystemTime,
    name: Arc<str>,
}

/// One registration's timer: sleep, arbitrate, clean up, then run the callback.
async fn run_timer<Id, E>(inner: Weak<Inner<Id, E>>, timer: Timer<Id>, on_expire: OnExpire)
where
    Id: Eq + Hash,
{
    select! {
        biased;
        _ = timer.claim.stop.cancelled() => return,
        _ = time::sleep(timer.delay) => {}
    }

    let Some(inner) = inner.upgrade() else {
        return;
    };
    if !timer.claim.take() {
        return;
    }
    inner
        .records
        .remove_if(&timer.id, |_, rec| Arc::ptr_eq(&rec.claim, &timer.claim));
    let bus = inner.bus.clone();
    drop(inner);

    bus.publish(
        Event::new(EventKind::Expired)
            .with_id(Arc::clone(&timer.name))
            .with_expire_at(timer.expire_at),
    );

    if let Err(err) = tokio::task::spawn_blocking(on_expire).await {
        bus.publish(callback_failure(timer.name, err));
    }
}

/// Classifies a callback that won its claim but did not complete.
///
/// A non-panic `JoinError` means the runtime shut down before the blocking
/// pool ran the callback.
fn callback_failure(name: Arc<str>, err: JoinError) -> Event {
    if err.is_panic() {
        Event::new(EventKind::CallbackPanicked)
            .with_id(name)
            .with_reason(panic_info(&*err.into_panic()))
    } else {
        Event::new(EventKind::CallbackAborted)
            .with_id(name)
            .with_reason("runtime shutting down")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn in_ms(ms: u64) -> SystemTime {
        SystemTime::now() + Duration::from_millis(ms)
    }

    fn an_hour() -> SystemTime {
        SystemTime::now() + Duration::from_secs(3600)
    }

    fn counting(hits: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let hits = Arc::clone(hits);
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn wait(rx: oneshot::Receiver<()>) {
        tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("callback did not fire")
            .expect("sender dropped");
    }

    #[tokio::test]
    async fn past_expiry_fires_exactly_once() {
        let store: Simple<u32, SystemTime> = Simple::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        let h = Arc::clone(&hits);

        let past = SystemTime::now() - Duration::from_secs(5);
        store
            .start(1, past, move || {
                h.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            })
            .unwrap();

        wait(rx).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!store.contains(&1));
        assert!(store.cancel(&1).is_none());
    }

    #[tokio::test]
    async fn cancel_returns_event_and_second_cancel_is_none() {
        let store: Simple<&str, SystemTime> = Simple::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let at = an_hour();

        store.start("a", at, counting(&hits)).unwrap();
        assert!(store.contains(&"a"));

        assert_eq!(store.cancel(&"a"), Some(at));
        assert_eq!(store.cancel(&"a"), None);
        assert!(store.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires_even_after_deadline() {
        let store: Simple<&str, SystemTime> = Simple::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        store.start("cancelled", an_hour(), counting(&hits)).unwrap();
        store
            .start("control", an_hour(), move || {
                let _ = tx.send(());
            })
            .unwrap();
        assert!(store.cancel(&"cancelled").is_some());

        time::advance(Duration::from_secs(7200)).await;
        rx.await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn cancel_after_expiry_reports_nothing() {
        let store: Simple<&str, SystemTime> = Simple::new();
        let (tx, rx) = oneshot::channel();

        store
            .start("late", in_ms(10), move || {
                let _ = tx.send(());
            })
            .unwrap();
        wait(rx).await;

        assert_eq!(store.cancel(&"late"), None);
    }

    #[tokio::test]
    async fn replace_stops_previous_by_default() {
        let store: Simple<&str, SystemTime> = Simple::new();
        let mut events = store.bus().subscribe();
        let first = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();

        store.start("k", in_ms(20), counting(&first)).unwrap();
        store
            .start("k", in_ms(20), move || {
                let _ = tx.send(());
            })
            .unwrap();

        wait(rx).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);

        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::Replaced));
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::Expired).count(),
            1
        );
    }

    #[tokio::test]
    async fn detached_timer_fires_without_touching_newer_record() {
        let store: Simple<&str, SystemTime> = Simple::with_config(Config {
            replace: ReplacePolicy::Detach,
            ..Config::default()
        });
        let (tx, rx) = oneshot::channel();
        let newer = an_hour();

        store
            .start("k", in_ms(10), move || {
                let _ = tx.send(());
            })
            .unwrap();
        store.start("k", newer, || {}).unwrap();

        wait(rx).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.contains(&"k"));
        assert_eq!(store.cancel(&"k"), Some(newer));
    }

    #[test]
    fn start_outside_runtime_is_rejected() {
        let store: Simple<u8, SystemTime> = Simple::new();
        let err = store.start(1, SystemTime::now(), || {}).unwrap_err();

        assert_eq!(err, StoreError::NoRuntime);
        assert!(store.is_empty());
        assert!(store.cancel(&1).is_none());
    }

    #[tokio::test]
    async fn panicking_callback_is_reported_and_registry_survives() {
        let store: Simple<u8, SystemTime> = Simple::new();
        let mut events = store.bus().subscribe();

        store
            .start(1, SystemTime::now(), || panic!("callback exploded"))
            .unwrap();

        let panicked = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let ev = events.recv().await.unwrap();
                if ev.kind == EventKind::CallbackPanicked {
                    return ev;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(panicked.id.as_deref(), Some("1"));
        assert_eq!(panicked.reason.as_deref(), Some("callback exploded"));

        let (tx, rx) = oneshot::channel();
        store
            .start(2, SystemTime::now(), move || {
                let _ = tx.send(());
            })
            .unwrap();
        wait(rx).await;
    }

    #[tokio::test]
    async fn dropping_registry_stops_pending_timers() {
        let store: Simple<u8, SystemTime> = Simple::new();
        let hits = Arc::new(AtomicUsize::new(0));

        store.start(1, in_ms(20), counting(&hits)).unwrap();
        drop(store);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_all_and_shutdown_drain_everything() {
        let store: Simple<u8, SystemTime> = Simple::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for id in 0..3 {
            store.start(id, an_hour(), counting(&hits)).unwrap();
        }
        let mut cancelled: Vec<u8> = store.cancel_all().into_iter().map(|(id, _)| id).collect();
        cancelled.sort_unstable();
        assert_eq!(cancelled, vec![0, 1, 2]);
        assert!(store.is_empty());

        for id in 0..4 {
            store.start(id, an_hour(), counting(&hits)).unwrap();
        }
        assert_eq!(store.len(), 4);
        assert_eq!(store.shutdown(), 4);
        assert!(store.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn displaced_hook_sees_only_events_it_stopped() {
        let noop = || -> OnExpire { Box::new(|| {}) };
        let (first, second) = (an_hour(), an_hour() + Duration::from_secs(1));
        let seen = std::sync::Mutex::new(Vec::new());
        let record = |e: &SystemTime| {
            seen.lock().unwrap().push(*e);
            Ok(())
        };

        let stopping: Simple<u8, SystemTime> = Simple::new();
        stopping.arm_with(1, first, noop(), EventKind::Started, record).unwrap();
        stopping.arm_with(1, second, noop(), EventKind::Started, record).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![first]);
        assert_eq!(stopping.cancel(&1), Some(second));

        let detaching: Simple<u8, SystemTime> = Simple::with_config(Config {
            replace: ReplacePolicy::Detach,
            ..Config::default()
        });
        detaching.arm_with(2, first, noop(), EventKind::Started, record).unwrap();
        detaching.arm_with(2, second, noop(), EventKind::Started, record).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![first]);
        detaching.shutdown();
    }

    #[tokio::test]
    async fn failed_displaced_hook_schedules_nothing() {
        let store: Simple<u8, SystemTime> = Simple::new();
        let hits = Arc::new(AtomicUsize::new(0));

        store.start(1, in_ms(10), counting(&hits)).unwrap();
        let err = store
            .arm_with(1, in_ms(10), Box::new(counting(&hits)), EventKind::Started, |_| {
                Err(StoreError::persist("rejected"))
            })
            .unwrap_err();

        assert_eq!(err, StoreError::persist("rejected"));
        assert!(store.is_empty());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_failures_are_classified() {
        let aborted = tokio::spawn(std::future::pending::<()>());
        aborted.abort();
        let err = aborted.await.unwrap_err();
        let ev = callback_failure(Arc::from("7"), err);
        assert_eq!(ev.kind, EventKind::CallbackAborted);
        assert_eq!(ev.id.as_deref(), Some("7"));

        let err = tokio::task::spawn_blocking(|| panic!("boom"))
            .await
            .unwrap_err();
        let ev = callback_failure(Arc::from("8"), err);
        assert_eq!(ev.kind, EventKind::CallbackPanicked);
        assert_eq!(ev.reason.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn usable_through_trait_object() {
        let store: crate::StoreRef<u8, SystemTime> = Arc::new(Simple::new());
        let (tx, rx) = oneshot::channel();

        store
            .start(
                9,
                SystemTime::now(),
                Box::new(move || {
                    let _ = tx.send(());
                }),
            )
            .unwrap();
        wait(rx).await;
        assert!(store.cancel(&9).is_none());
    }
}
