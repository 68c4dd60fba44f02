//! # timervisor
//!
//! **Timervisor** is a keyed expiring-event registry for Tokio.
//!
//! Register an identifier with an event that knows when it expires, plus a
//! callback. The callback fires at (or shortly after) expiration unless the
//! registration is cancelled first. A durable variant mirrors every registration
//! into an external store so pending events survive a process restart.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   caller
//!     │ start(id, event, on_expire) / cancel(id)
//!     ▼
//! ┌──────────────────────────────┐      put / delete      ┌──────────────┐
//! │  Persistent (optional)       │ ─────────────────────► │  Db (yours)  │
//! └──────────────┬───────────────┘                        └──────────────┘
//!                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Simple (in-memory registry)                                      │
//! │  - DashMap<Id, Record{ event, claim }>                            │
//! │  - one timer task per registration (sleep ∥ stop token)           │
//! │  - claim flag arbitrates timer vs cancel vs replacement           │
//! └──────┬────────────────────────────────────────────────────┬───────┘
//!        ▼                                                    │ publish
//!   timer wins claim ─► remove record ─► on_expire()          ▼
//!                                          ┌──────────────────────────────┐
//!                                          │ Bus (broadcast) ─► listener  │
//!                                          │   ─► SubscriberSet ─► subs   │
//!                                          └──────────────────────────────┘
//! ```
//!
//! ### Guarantees
//! For every successful `start`, exactly one of these is observed, exactly once:
//! - `on_expire` runs, or
//! - `cancel` returns `Some(event)`.
//!
//! `cancel` never waits for an in-flight callback. Callbacks of different
//! identifiers are unordered.
//!
//! ## Features
//! | Area              | Description                                                      | Key types / traits                         |
//! |-------------------|------------------------------------------------------------------|--------------------------------------------|
//! | **Registries**    | In-memory and durable expiring-event registries.                 | [`Simple`], [`Persistent`], [`Store`]      |
//! | **Events**        | Capability required from registered values.                      | [`Expiring`]                               |
//! | **Persistence**   | Store interface for the durable registry.                        | [`Db`]                                     |
//! | **Policies**      | What a reused identifier does to a pending registration.         | [`ReplacePolicy`]                          |
//! | **Subscriber API**| Hook into registry events (logging, metrics, audit).              | [`Subscribe`], [`SubscriberSet`], [`Bus`]  |
//! | **Errors**        | Typed registration errors.                                       | [`StoreError`]                             |
//! | **Configuration** | Centralized settings and wiring.                                 | [`Config`], [`Builder`]                    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::{Duration, SystemTime};
//! use timervisor::{Builder, Config, Simple};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store: Simple<String, SystemTime> = Builder::new(Config::default()).build()?;
//!
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!     let soon = SystemTime::now() + Duration::from_millis(20);
//!     store.start("session-1".to_string(), soon, move || {
//!         let _ = tx.send("expired");
//!     })?;
//!
//!     // Cancelled before its deadline: the callback never runs.
//!     let later = SystemTime::now() + Duration::from_secs(3600);
//!     store.start("session-2".to_string(), later, || unreachable!())?;
//!     assert_eq!(store.cancel(&"session-2".to_string()), Some(later));
//!
//!     assert_eq!(rx.await?, "expired");
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod events;
mod expiring;
mod policies;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use error::StoreError;
pub use events::{Bus, Event, EventKind};
pub use expiring::{Expiring, delay_until};
pub use policies::ReplacePolicy;
pub use store::{Builder, Db, OnExpire, Persistent, Simple, Store, StoreRef};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
