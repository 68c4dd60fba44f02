//! # Example: durable_restart
//!
//! Simulates a process restart with a [`Persistent`] registry.
//!
//! Demonstrates how to:
//! - Implement [`Db`] over an in-memory table.
//! - Stop timers with [`Persistent::shutdown`] while keeping stored rows.
//! - Re-arm stored rows in a fresh registry with [`Persistent::resume`].
//!
//! ## Flow
//! ```text
//! "process 1":  start(1, +300ms) start(2, +10s) ──► table = {1, 2}
//!               shutdown()                      ──► timers stopped, table = {1, 2}
//! "process 2":  resume every row                ──► 1 expires → table = {2}
//!               cancel(2)                       ──► table = {}
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example durable_restart
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use timervisor::{Db, Persistent, StoreError};

/// Shared table standing in for a real database.
#[derive(Clone, Default)]
struct Table(Arc<Mutex<HashMap<u32, SystemTime>>>);

impl Table {
    fn rows(&self) -> Vec<(u32, SystemTime)> {
        match self.0.lock() {
            Ok(rows) => rows.iter().map(|(k, v)| (*k, *v)).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Db<u32, SystemTime> for Table {
    fn put(&self, id: &u32, event: &SystemTime) -> Result<(), StoreError> {
        let mut rows = self.0.lock().map_err(StoreError::persist)?;
        rows.insert(*id, *event);
        Ok(())
    }

    fn delete(&self, id: &u32, _event: &SystemTime) {
        if let Ok(mut rows) = self.0.lock() {
            rows.remove(id);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let table = Table::default();

    // 1. First "process": register and shut down before anything expires.
    let first: Persistent<u32, SystemTime, Table> = Persistent::new(table.clone());
    first.start(1, SystemTime::now() + Duration::from_millis(300), || {})?;
    first.start(2, SystemTime::now() + Duration::from_secs(10), || {})?;
    println!("[process-1] stored={} stopped={}", table.rows().len(), first.shutdown());
    drop(first);

    // 2. Second "process": recover every stored row.
    let second: Persistent<u32, SystemTime, Table> = Persistent::new(table.clone());
    for (id, at) in table.rows() {
        second.resume(id, at, move || println!("[process-2] {id} expired"))?;
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    println!("[process-2] stored after expiry={}", table.rows().len());

    if second.cancel(&2).is_some() {
        println!("[process-2] cancelled 2, stored={}", table.rows().len());
    }
    Ok(())
}
