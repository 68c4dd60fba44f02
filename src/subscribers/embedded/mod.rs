//! Built-in subscribers, compiled only with the `logging` feature.
//!
//! - [`LogWriter`] prints one line per registry event to stdout.

mod log;

pub use log::LogWriter;
