//! # Runtime
//!
//! Watch-layer support around the reconciler: the error-retry backoff and
//! the error policy handed to the controller loop.

mod backoff;
mod error_policy;

pub use backoff::FibonacciBackoff;
pub use error_policy::{error_policy, reset_backoff, BackoffTracker};
