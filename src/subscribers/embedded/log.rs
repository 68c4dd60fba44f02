//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [started] id="session-1" delay_ms=30000
//! [replaced] id="session-1" how=stopped
//! [expired] id="session-1"
//! [cancelled] id="session-2"
//! [persist-failed] id="session-3" err="persist failed: disk full"
//! [callback-panicked] id="session-4" info=boom
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn or_unknown(v: Option<&str>) -> &str {
    v.unwrap_or("unknown")
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let id = or_unknown(e.id.as_deref());
        match e.kind {
            EventKind::Started => {
                println!("[started] id={id} delay_ms={:?}", e.delay_ms);
            }
            EventKind::Resumed => {
                println!("[resumed] id={id} delay_ms={:?}", e.delay_ms);
            }
            EventKind::Replaced => {
                println!("[replaced] id={id} how={}", or_unknown(e.reason.as_deref()));
            }
            EventKind::Expired => {
                println!("[expired] id={id}");
            }
            EventKind::Cancelled => {
                println!("[cancelled] id={id}");
            }
            EventKind::Stopped => {
                println!("[stopped] id={id}");
            }
            EventKind::PersistFailed => {
                println!("[persist-failed] id={id} err={:?}", e.reason);
            }
            EventKind::CallbackPanicked => {
                println!(
                    "[callback-panicked] id={id} info={}",
                    or_unknown(e.reason.as_deref())
                );
            }
            EventKind::CallbackAborted => {
                println!("[callback-aborted] id={id}");
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={id} reason={:?}", e.reason);
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] subscriber={id} info={}",
                    or_unknown(e.reason.as_deref())
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
