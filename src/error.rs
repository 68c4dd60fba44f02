//! Error types used by the timervisor registries.
//!
//! This module defines a single error enum, [`StoreError`], raised by
//! [`Store::start`](crate::Store::start) implementations and by [`Db::put`](crate::Db::put).
//!
//! Cancelling an unknown identifier is **not** an error: it is reported as `None`
//! by [`Store::cancel`](crate::Store::cancel). Store delete failures are never surfaced.
//!
//! Like the other error types in this family, [`StoreError`] provides helper methods
//! (`as_label`, `as_message`) for logging/metrics.

use thiserror::Error;

/// # Errors produced by registry operations.
///
/// These represent failures that abort a registration attempt.
/// When `start` returns any of them, no registration was created.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The persistent store rejected the write.
    #[error("persist failed: {error}")]
    Persist {
        /// The underlying error message.
        error: String,
    },

    /// `start` was called outside a Tokio runtime, so no timer could be scheduled.
    #[error("no tokio runtime available to schedule the timer")]
    NoRuntime,
}

impl StoreError {
    /// Builds a [`StoreError::Persist`] from anything displayable.
    ///
    /// # Example
    /// ```
    /// use timervisor::StoreError;
    ///
    /// let err = StoreError::persist("disk full");
    /// assert_eq!(err.to_string(), "persist failed: disk full");
    /// ```
    pub fn persist(error: impl std::fmt::Display) -> Self {
        StoreError::Persist {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use timervisor::StoreError;
    ///
    /// assert_eq!(StoreError::NoRuntime.as_label(), "store_no_runtime");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Persist { .. } => "store_persist_failed",
            StoreError::NoRuntime => "store_no_runtime",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StoreError::Persist { error } => format!("persist: {error}"),
            StoreError::NoRuntime => "no runtime".to_string(),
        }
    }

    /// Indicates whether retrying the same `start` may succeed.
    ///
    /// Returns `true` for [`StoreError::Persist`], `false` otherwise.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Persist { .. })
    }
}
