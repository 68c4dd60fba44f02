//! Registry policies.
//!
//! This module groups the knobs that control how a registry resolves
//! conflicting registrations.
//!
//! ## Contents
//! - [`ReplacePolicy`] what to do with a pending registration when its identifier is reused
//!
//! ## Quick wiring
//! ```text
//! Config { replace: ReplacePolicy, .. }
//!      └─► Simple::start, when an identifier is reused:
//!           - StopPrevious: claim + stop the displaced record
//!           - Detach:       leave the displaced timer running
//! ```
//!
//! ## Defaults
//! - `ReplacePolicy::StopPrevious` (a reused identifier never leaks a running timer).

mod replace;

pub use replace::ReplacePolicy;
