//! # SubscriberSet: per-subscriber queues for registry events.
//!
//! The listener spawned by [`Builder`](crate::Builder) hands every bus event to
//! [`SubscriberSet::emit`], which copies it into one bounded queue per subscriber.
//! A worker task per subscriber drains its queue in order.
//!
//! ```text
//! Builder listener ── emit(ev) ──┬──► queue "audit"   ──► worker ──► audit.on_event(ev)
//!                                ├──► queue "metrics" ──► worker ──► metrics.on_event(ev)
//!                                └──► queue "log"     ──► worker ──► log.on_event(ev)
//!
//! queue full / worker gone  → event dropped for that subscriber, SubscriberOverflow on the bus
//! on_event panics           → SubscriberPanicked on the bus, worker keeps going
//! registry dropped          → listener calls shutdown(): queues close, workers finish backlog
//! ```
//!
//! Timer tasks and `start`/`cancel` callers never wait on a subscriber; the only
//! cost on their side is one `broadcast` send.
//!
//! Panics are caught with `AssertUnwindSafe`: a subscriber that panics while
//! holding its own lock may leave that state poisoned.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};

use crate::events::{Bus, Event, panic_info};
use crate::subscribers::Subscribe;

/// Sending half of one subscriber's queue.
struct Queue {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Fan-out of registry events to a fixed set of subscribers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called inside a Tokio runtime.
    ///
    /// `bus` receives the set's own overflow and panic reports.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (queues, workers): (Vec<_>, Vec<_>) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let queue = Queue {
                    name: sub.name(),
                    tx,
                };
                (queue, tokio::spawn(drain(sub, rx, bus.clone())))
            })
            .unzip();
        Self {
            queues,
            workers,
            bus,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Returns `true` if there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Queues a copy of `event` for every subscriber.
    pub fn emit(&self, event: &Event) {
        self.emit_arc(Arc::new(event.clone()));
    }

    /// Queues `event` for every subscriber without blocking.
    ///
    /// A subscriber whose queue is full (or whose worker is gone) misses the event
    /// and a `SubscriberOverflow` is published, unless `event` is itself an
    /// overflow report.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let report = !event.is_subscriber_overflow();
        for queue in &self.queues {
            let reason = match queue.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if report {
                self.bus
                    .publish(Event::subscriber_overflow(queue.name, reason));
            }
        }
    }

    /// Closes every queue and waits until each worker has handled its backlog.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Worker loop for one subscriber; ends when its queue is closed and empty.
async fn drain(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        if let Err(payload) = AssertUnwindSafe(sub.on_event(&ev)).catch_unwind().await {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_info(&*payload)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _event: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    struct Panicky;

    #[async_trait::async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber exploded");
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl Subscribe for Slow {
        async fn on_event(&self, _event: &Event) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        fn name(&self) -> &'static str {
            "slow"
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn delivers_every_event_before_shutdown_returns() {
        let hits = Arc::new(AtomicUsize::new(0));
        let set = SubscriberSet::new(vec![Arc::new(Counter(hits.clone()))], Bus::new(16));

        for _ in 0..5 {
            set.emit(&Event::new(EventKind::Started));
        }
        set.shutdown().await;

        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn panic_is_reported_on_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Panicky)], bus.clone());

        set.emit(&Event::new(EventKind::Expired));

        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev.kind, EventKind::SubscriberPanicked);
        assert_eq!(ev.id.as_deref(), Some("panicky"));
        assert_eq!(ev.reason.as_deref(), Some("subscriber exploded"));
    }

    #[tokio::test]
    async fn overflow_is_reported_on_bus() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(vec![Arc::new(Slow)], bus.clone());

        // Queue capacity is 1 and the worker blocks on the first event.
        for _ in 0..4 {
            set.emit(&Event::new(EventKind::Started));
            tokio::task::yield_now().await;
        }

        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(ev.is_subscriber_overflow());
        assert_eq!(ev.id.as_deref(), Some("slow"));
    }
}
