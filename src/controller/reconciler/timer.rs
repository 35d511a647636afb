//! # Reconcile Timer
//!
//! Decides when a resource is due for a scheduled deploy and computes the
//! requeue delay after an attempt. Healthy resources settle at their sync
//! period; failing resources retry on a shorter cadence that starts at the
//! configured minimum and backs off exponentially, never exceeding the sync
//! period.

use crate::config::parse_kubernetes_duration;
use crate::controller::reconciler::app::parse_rfc3339;
use crate::crd::App;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Sync period bounds supplied by controller configuration
#[derive(Debug, Clone, Copy)]
pub struct ReconcileTimerOpts {
    /// Steady-state interval when healthy and `spec.syncPeriod` is unset
    pub default_sync_period: Duration,
    /// Floor interval used while retrying failures
    pub minimum_sync_period: Duration,
}

/// Snapshot of the scheduling inputs for one resource
#[derive(Debug, Clone)]
pub struct ReconcileTimer {
    sync_period: Duration,
    minimum_sync_period: Duration,
    consecutive_failures: u32,
    generation: Option<i64>,
    observed_generation: Option<i64>,
    last_reconcile_time: Option<DateTime<Utc>>,
}

impl ReconcileTimer {
    pub fn new(app: &App, opts: ReconcileTimerOpts) -> Self {
        let requested = app
            .spec
            .sync_period
            .as_deref()
            .and_then(|s| parse_kubernetes_duration(s).ok())
            .unwrap_or(opts.default_sync_period);

        let status = app.status.as_ref();

        Self {
            sync_period: requested.max(opts.minimum_sync_period),
            minimum_sync_period: opts.minimum_sync_period,
            consecutive_failures: status.map_or(0, |s| s.consecutive_reconcile_failures),
            generation: app.metadata.generation,
            observed_generation: status.and_then(|s| s.observed_generation),
            last_reconcile_time: status.and_then(last_reconcile_time),
        }
    }

    /// True when `now` is at or past the next deadline: spec changes are
    /// always due, failing resources follow the retry cadence, healthy ones
    /// the sync period, and a resource that has never reconciled is due
    /// immediately
    pub fn is_ready_at(&self, now: DateTime<Utc>) -> bool {
        if self.generation != self.observed_generation {
            return true;
        }

        let Some(last) = self.last_reconcile_time else {
            return true;
        };
        let elapsed = (now - last)
            .to_std()
            .unwrap_or(Duration::ZERO);

        if self.has_failing_streak() && elapsed >= self.failure_period() {
            return true;
        }

        elapsed >= self.sync_period
    }

    /// Delay until the next attempt, chosen from the outcome of the attempt
    /// that just completed. Always within `[minimum, sync period]`.
    pub fn duration_until_ready(&self, attempt_failed: bool) -> Duration {
        if attempt_failed || self.has_failing_streak() {
            self.failure_period()
        } else {
            self.sync_period
        }
    }

    fn has_failing_streak(&self) -> bool {
        self.consecutive_failures > 0
    }

    /// Retry cadence while failing: 2^failures seconds clamped into
    /// `[minimum, sync period]`, so short streaks sit at the floor and long
    /// streaks drift toward the steady-state interval
    fn failure_period(&self) -> Duration {
        let exp = self.consecutive_failures.min(30);
        let backoff = Duration::from_secs(1 << exp);
        backoff.clamp(self.minimum_sync_period, self.sync_period)
    }
}

/// Most recent stage-completion timestamp recorded in status, taken as the
/// last reconcile time. Fetch and deploy both stamp `updatedAt`.
fn last_reconcile_time(status: &crate::crd::AppStatus) -> Option<DateTime<Utc>> {
    let fetch = status
        .fetch
        .as_ref()
        .and_then(|f| f.updated_at.as_deref())
        .and_then(parse_rfc3339);
    let deploy = status
        .deploy
        .as_ref()
        .and_then(|d| d.updated_at.as_deref())
        .and_then(parse_rfc3339);

    match (fetch, deploy) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
