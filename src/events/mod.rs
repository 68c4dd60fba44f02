//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the registries, their timer tasks
//! and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Simple` (start/cancel/replace), timer tasks (expired, callback panic),
//!   `Persistent` (persist failures, resume, shutdown), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the listener spawned by [`Builder`](crate::Builder) (fans out to
//!   `SubscriberSet`), or any receiver obtained from [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};

pub(crate) use event::{label, panic_info};
