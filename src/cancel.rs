//! Cooperative cancellation
//!
//! Long-running scans take a [`CancellationToken`] and poll it at bounded intervals.
//! A cancelled computation returns [`Outcome::Cancelled`] and discards everything it
//! computed so far, so callers only ever see a whole result or nothing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Iterations between cancellation checks in per-sample scans
pub const CHECK_INTERVAL: usize = 4096;

/// Shared cancellation flag
///
/// Cloning the token shares the flag: cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Poll the flag every `interval` iterations
    ///
    /// Returns `true` when `iteration` falls on a check boundary and the token has
    /// been cancelled.
    #[inline]
    pub fn should_stop(&self, iteration: usize, interval: usize) -> bool {
        iteration % interval.max(1) == 0 && self.is_cancelled()
    }
}

/// Result of a cancelable computation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// Computation ran to completion
    Completed(T),
    /// Computation was cancelled; no partial output is exposed
    Cancelled,
}

impl<T> Outcome<T> {
    /// Whether the computation was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Completed value, if any
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }

    /// Map the completed value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Cancelled => Outcome::Cancelled,
        }
    }
}

/// Unwrap a completed outcome or return `Ok(Outcome::Cancelled)` from the caller
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::cancel::Outcome::Completed(value) => value,
            $crate::cancel::Outcome::Cancelled => return Ok($crate::cancel::Outcome::Cancelled),
        }
    };
}

pub(crate) use try_outcome;
