use std::hash::Hash;
use std::sync::Arc;

use tokio::select;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::StoreError,
    events::{Bus, Event},
    store::{Db, Persistent, Simple, simple::current_runtime},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing registries with optional subscribers.
///
/// # Example
/// ```
/// use std::time::SystemTime;
/// use timervisor::{Builder, Config, Simple};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), timervisor::StoreError> {
///     let store: Simple<u64, SystemTime> = Builder::new(Config::default())
///         .with_subscribers(Vec::new())
///         .build()?;
///     assert!(store.is_empty());
///     Ok(())
/// }
/// ```
pub struct Builder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl Builder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive registry events (started, expired, cancelled, failures)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds a single subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds an in-memory registry.
    ///
    /// # Errors
    /// [`StoreError::NoRuntime`] if subscribers are configured and no Tokio
    /// runtime is available to drive their workers.
    pub fn build<Id, E>(self) -> Result<Simple<Id, E>, StoreError>
    where
        Id: Eq + Hash,
    {
        let (bus, root) = self.wire()?;
        Ok(Simple::from_parts(&self.cfg, bus, root))
    }

    /// Builds a durable registry over `db`.
    ///
    /// # Errors
    /// Same as [`Builder::build`].
    pub fn build_persistent<Id, E, D>(self, db: D) -> Result<Persistent<Id, E, D>, StoreError>
    where
        Id: Eq + Hash,
        D: Db<Id, E>,
    {
        let (bus, root) = self.wire()?;
        let mem = Simple::from_parts(&self.cfg, bus, root);
        Ok(Persistent::from_parts(Arc::new(db), mem))
    }

    /// Creates the bus and the registry's root token, plus the subscriber
    /// fan-out listener when subscribers are configured.
    ///
    /// The listener lives until the root token is cancelled (the registry is
    /// dropped), then forwards what is still buffered and drains the workers.
    fn wire(&self) -> Result<(Bus, CancellationToken), StoreError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let root = CancellationToken::new();
        if self.subscribers.is_empty() {
            return Ok((bus, root));
        }

        let runtime = current_runtime()?;
        let set = SubscriberSet::new(self.subscribers.clone(), bus.clone());
        runtime.spawn(listen(bus.subscribe(), set, root.clone()));
        Ok((bus, root))
    }
}

/// Forwards bus events to `set` until `stop` fires.
async fn listen(mut rx: broadcast::Receiver<Event>, set: SubscriberSet, stop: CancellationToken) {
    loop {
        select! {
            biased;
            msg = rx.recv() => match msg {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            _ = stop.cancelled() => break,
        }
    }

    loop {
        match rx.try_recv() {
            Ok(ev) => set.emit(&ev),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    set.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    #[derive(Default)]
    struct Recorder(Mutex<Vec<EventKind>>);

    #[async_trait::async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.0.lock().unwrap().push(event.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test]
    async fn subscribers_observe_lifecycle() {
        let rec = Arc::new(Recorder::default());
        let store: Simple<&str, SystemTime> = Builder::new(Config::default())
            .with_subscriber(rec.clone())
            .build()
            .unwrap();

        store.start("a", SystemTime::now(), || {}).unwrap();
        store
            .start("b", SystemTime::now() + Duration::from_secs(60), || {})
            .unwrap();
        assert!(store.cancel(&"b").is_some());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let kinds = rec.0.lock().unwrap().clone();
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::Started).count(), 2);
        assert!(kinds.contains(&EventKind::Cancelled));
        assert!(kinds.contains(&EventKind::Expired));
    }

    #[tokio::test]
    async fn dropping_registry_drains_and_releases_subscribers() {
        let rec = Arc::new(Recorder::default());
        let store: Simple<u8, SystemTime> = Builder::new(Config::default())
            .with_subscriber(rec.clone())
            .build()
            .unwrap();
        store
            .start(1, SystemTime::now() + Duration::from_secs(60), || {})
            .unwrap();
        drop(store);

        let released = tokio::time::timeout(Duration::from_secs(2), async {
            while Arc::strong_count(&rec) > 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(released.is_ok());
        assert_eq!(*rec.0.lock().unwrap(), vec![EventKind::Started]);
    }

    #[test]
    fn subscribers_need_a_runtime() {
        let res = Builder::new(Config::default())
            .with_subscriber(Arc::new(Recorder::default()))
            .build::<u8, SystemTime>();
        assert!(matches!(res, Err(StoreError::NoRuntime)));
    }

    #[test]
    fn no_subscribers_builds_anywhere() {
        let store = Builder::new(Config::default())
            .build::<u8, SystemTime>()
            .unwrap();
        assert!(store.is_empty());
    }
}
