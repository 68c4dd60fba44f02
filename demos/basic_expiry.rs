//! # Example: basic_expiry
//!
//! Registers a few short-lived sessions, cancels one, and lets the others expire.
//!
//! Demonstrates how to:
//! - Build a [`Simple`] registry with a [`LogWriter`] subscriber.
//! - Register events with [`Simple::start`].
//! - Cancel a pending registration with [`Simple::cancel`].
//!
//! ## Flow
//! ```text
//! start("alpha", +200ms)  ──► publish(Started)
//! start("beta",  +400ms)  ──► publish(Started)
//! start("gamma", +1h)     ──► publish(Started)
//! cancel("gamma")         ──► publish(Cancelled)  → callback never runs
//! ... 200ms               ──► publish(Expired)    → "alpha" callback
//! ... 400ms               ──► publish(Expired)    → "beta" callback
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example basic_expiry --features logging
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use timervisor::{Builder, Config, Expiring, LogWriter, Simple};

#[derive(Debug)]
struct Session {
    user: &'static str,
    until: SystemTime,
}

impl Expiring for Session {
    fn expire_at(&self) -> SystemTime {
        self.until
    }
}

fn session(user: &'static str, ttl: Duration) -> Session {
    Session {
        user,
        until: SystemTime::now() + ttl,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store: Simple<&'static str, Session> = Builder::new(Config::default())
        .with_subscriber(Arc::new(LogWriter::new()))
        .build()?;

    for (id, ttl) in [
        ("alpha", Duration::from_millis(200)),
        ("beta", Duration::from_millis(400)),
        ("gamma", Duration::from_secs(3600)),
    ] {
        store.start(id, session(id, ttl), move || {
            println!("[callback] session {id} timed out");
        })?;
    }

    if let Some(s) = store.cancel(&"gamma") {
        println!("[main] cancelled session of {}", s.user);
    }

    tokio::time::sleep(Duration::from_millis(600)).await;
    println!("[main] pending={}", store.len());
    Ok(())
}
