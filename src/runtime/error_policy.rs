//! # Error Policy
//!
//! Retry decision for dispatcher errors. The watch layer calls this when the
//! dispatcher returns an error; the delay comes from a per-resource
//! Fibonacci backoff that the dispatcher drops after any successful cycle.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::App;
use crate::runtime::FibonacciBackoff;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::warn;

/// Per-resource error backoff states keyed by "namespace/name". Holds state
/// only for resources that are currently failing; a successful cycle removes
/// the entry, so deleted resources leave nothing behind.
#[derive(Debug, Default)]
pub struct BackoffTracker {
    states: Mutex<HashMap<String, FibonacciBackoff>>,
}

impl BackoffTracker {
    /// Current delay for the resource, creating and advancing its sequence
    pub fn next_delay(&self, key: &str, min: Duration, max: Duration) -> Duration {
        self.lock()
            .entry(key.to_string())
            .or_insert_with(|| FibonacciBackoff::new(min, max))
            .next_backoff()
    }

    /// Drop the resource's state after a successful cycle
    pub fn clear(&self, key: &str) {
        self.lock().remove(key);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, FibonacciBackoff>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.lock().len()
    }
}

pub fn error_policy(app: Arc<App>, error: &ReconcilerError, ctx: Arc<Reconciler>) -> Action {
    let key = backoff_key(&app);
    let delay = ctx.backoff_states.next_delay(
        &key,
        ctx.config.minimum_sync_period(),
        ctx.config.default_sync_period(),
    );

    warn!(
        resource = %key,
        error = %error,
        retry_in_secs = delay.as_secs(),
        "Reconcile failed, backing off"
    );

    Action::requeue(delay)
}

/// Drop a resource's error backoff after a successful cycle. Runs on every
/// successful dispatch, including delete completion, so the tracker never
/// accumulates state for resources that recovered or no longer exist.
pub fn reset_backoff(ctx: &Reconciler, app: &App) {
    ctx.backoff_states.clear(&backoff_key(app));
}

fn backoff_key(app: &App) -> String {
    format!(
        "{}/{}",
        app.namespace().unwrap_or_else(|| "default".to_string()),
        app.name_any()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_next_delay_advances_per_resource() {
        let tracker = BackoffTracker::default();
        assert_eq!(tracker.next_delay("default/a", secs(30), secs(600)), secs(30));
        assert_eq!(tracker.next_delay("default/a", secs(30), secs(600)), secs(30));
        assert_eq!(tracker.next_delay("default/a", secs(30), secs(600)), secs(60));

        // Other resources keep their own sequence
        assert_eq!(tracker.next_delay("default/b", secs(30), secs(600)), secs(30));
    }

    #[test]
    fn test_clear_drops_the_resource_entry() {
        let tracker = BackoffTracker::default();
        tracker.next_delay("default/gone", secs(30), secs(600));
        tracker.next_delay("default/gone", secs(30), secs(600));
        assert_eq!(tracker.tracked(), 1);

        tracker.clear("default/gone");

        assert_eq!(tracker.tracked(), 0);
        // A later error starts a fresh sequence
        assert_eq!(
            tracker.next_delay("default/gone", secs(30), secs(600)),
            secs(30)
        );
    }

    #[test]
    fn test_clear_unknown_key_is_a_noop() {
        let tracker = BackoffTracker::default();
        tracker.clear("default/never-seen");
        assert_eq!(tracker.tracked(), 0);
    }
}
