//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `app_reconcile_attempts_total` - Reconcile attempts per resource
//! - `app_reconcile_successes_total` - Successful reconciles per resource
//! - `app_reconcile_failures_total` - Failed reconciles per resource
//! - `app_reconcile_delete_attempts_total` - Delete attempts per resource
//! - `app_reconcile_delete_failures_total` - Failed deletes per resource
//! - `app_reconcile_duration_seconds` - Overall reconcile duration
//! - `app_fetch_duration_seconds` - Fetch stage duration
//! - `app_template_duration_seconds` - Template stage duration
//! - `app_deploy_duration_seconds` - Deploy stage duration
//!
//! Counters are keyed by (kind, name, namespace); histograms are split by a
//! `first_reconcile` label distinguishing a resource's first reconcile from
//! subsequent ones.

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, Registry};
use std::sync::LazyLock;
use std::time::Duration;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

const RESOURCE_LABELS: &[&str] = &["kind", "name", "namespace"];

static RECONCILE_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "app_reconcile_attempts_total",
            "Total number of reconcile attempts",
        ),
        RESOURCE_LABELS,
    )
    .expect("Failed to create RECONCILE_ATTEMPTS metric - this should never happen")
});

static RECONCILE_SUCCESSES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "app_reconcile_successes_total",
            "Total number of successful reconciles",
        ),
        RESOURCE_LABELS,
    )
    .expect("Failed to create RECONCILE_SUCCESSES metric - this should never happen")
});

static RECONCILE_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "app_reconcile_failures_total",
            "Total number of failed reconciles",
        ),
        RESOURCE_LABELS,
    )
    .expect("Failed to create RECONCILE_FAILURES metric - this should never happen")
});

static DELETE_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "app_reconcile_delete_attempts_total",
            "Total number of delete attempts",
        ),
        RESOURCE_LABELS,
    )
    .expect("Failed to create DELETE_ATTEMPTS metric - this should never happen")
});

static DELETE_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "app_reconcile_delete_failures_total",
            "Total number of failed deletes",
        ),
        RESOURCE_LABELS,
    )
    .expect("Failed to create DELETE_FAILURES metric - this should never happen")
});

const DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

fn stage_histogram(name: &str, help: &str) -> HistogramVec {
    HistogramVec::new(
        prometheus::HistogramOpts::new(name, help).buckets(DURATION_BUCKETS.to_vec()),
        &["first_reconcile"],
    )
    .expect("Failed to create stage duration metric - this should never happen")
}

static RECONCILE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    stage_histogram(
        "app_reconcile_duration_seconds",
        "Overall duration of the deploy pipeline in seconds",
    )
});

static FETCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    stage_histogram(
        "app_fetch_duration_seconds",
        "Duration of the fetch stage in seconds",
    )
});

static TEMPLATE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    stage_histogram(
        "app_template_duration_seconds",
        "Duration of the template stage in seconds",
    )
});

static DEPLOY_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    stage_histogram(
        "app_deploy_duration_seconds",
        "Duration of the deploy stage in seconds",
    )
});

/// Register all metrics with the shared registry. Call once at startup.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILE_ATTEMPTS.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_SUCCESSES.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(DELETE_ATTEMPTS.clone()))?;
    REGISTRY.register(Box::new(DELETE_FAILURES.clone()))?;
    REGISTRY.register(Box::new(RECONCILE_DURATION.clone()))?;
    REGISTRY.register(Box::new(FETCH_DURATION.clone()))?;
    REGISTRY.register(Box::new(TEMPLATE_DURATION.clone()))?;
    REGISTRY.register(Box::new(DEPLOY_DURATION.clone()))?;
    Ok(())
}

/// Gather all registered metric families for the /metrics endpoint
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}

pub fn register_reconcile_attempt(kind: &str, name: &str, namespace: &str) {
    RECONCILE_ATTEMPTS
        .with_label_values(&[kind, name, namespace])
        .inc();
}

pub fn register_reconcile_success(kind: &str, name: &str, namespace: &str) {
    RECONCILE_SUCCESSES
        .with_label_values(&[kind, name, namespace])
        .inc();
}

pub fn register_reconcile_failure(kind: &str, name: &str, namespace: &str) {
    RECONCILE_FAILURES
        .with_label_values(&[kind, name, namespace])
        .inc();
}

pub fn register_delete_attempt(kind: &str, name: &str, namespace: &str) {
    DELETE_ATTEMPTS
        .with_label_values(&[kind, name, namespace])
        .inc();
}

pub fn register_delete_failure(kind: &str, name: &str, namespace: &str) {
    DELETE_FAILURES
        .with_label_values(&[kind, name, namespace])
        .inc();
}

/// Reconcile attempt count for one resource, used to detect its first
/// reconcile for duration-metric labeling
pub fn reconcile_attempt_count(kind: &str, name: &str, namespace: &str) -> u64 {
    RECONCILE_ATTEMPTS
        .with_label_values(&[kind, name, namespace])
        .get()
}

/// Drop per-resource counter series after a successful delete so metrics do
/// not accumulate for resources that no longer exist
pub fn remove_resource_metrics(kind: &str, name: &str, namespace: &str) {
    let labels = [kind, name, namespace];
    let _ = RECONCILE_ATTEMPTS.remove_label_values(&labels);
    let _ = RECONCILE_SUCCESSES.remove_label_values(&labels);
    let _ = RECONCILE_FAILURES.remove_label_values(&labels);
    let _ = DELETE_ATTEMPTS.remove_label_values(&labels);
    let _ = DELETE_FAILURES.remove_label_values(&labels);
}

fn first_reconcile_label(is_first: bool) -> &'static str {
    if is_first {
        "true"
    } else {
        "false"
    }
}

pub fn register_overall_time(is_first: bool, elapsed: Duration) {
    RECONCILE_DURATION
        .with_label_values(&[first_reconcile_label(is_first)])
        .observe(elapsed.as_secs_f64());
}

pub fn register_fetch_time(is_first: bool, elapsed: Duration) {
    FETCH_DURATION
        .with_label_values(&[first_reconcile_label(is_first)])
        .observe(elapsed.as_secs_f64());
}

pub fn register_template_time(is_first: bool, elapsed: Duration) {
    TEMPLATE_DURATION
        .with_label_values(&[first_reconcile_label(is_first)])
        .observe(elapsed.as_secs_f64());
}

pub fn register_deploy_time(is_first: bool, elapsed: Duration) {
    DEPLOY_DURATION
        .with_label_values(&[first_reconcile_label(is_first)])
        .observe(elapsed.as_secs_f64());
}
