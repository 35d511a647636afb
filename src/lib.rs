//! # App Deploy Controller
//!
//! A Kubernetes controller that reconciles `App` custom resources. An `App`
//! declares "fetch source X, render it with templating engine Y, apply it to
//! the cluster, then inspect the result", and the controller drives the
//! resource's live state toward that declaration, repeatedly, while the
//! source repositories and cluster objects keep changing underneath it.
//!
//! ## Reconciliation Flow
//!
//! 1. The watch layer delivers an `App` to the dispatcher
//! 2. The dispatcher picks a branch: delete / canceled-or-paused / deploy / noop
//! 3. The deploy pipeline runs fetch → template → deploy → inspect, recording
//!    a per-stage result into status after every stage
//! 4. The status state machine folds the outcome into conditions and
//!    consecutive success/failure counters
//! 5. The reconcile timer computes the requeue delay from past outcomes
//!
//! ## Features
//!
//! - **Pluggable backends**: vendir for fetch, helm/kustomize for template,
//!   kapp for deploy, each behind a narrow trait selected from the spec
//! - **Bounded retry cadence**: failing resources retry at the configured
//!   minimum sync period, healthy resources settle at the default period
//! - **Prometheus metrics**: reconcile counts and per-stage durations
//! - **Health probes**: HTTP endpoints for liveness and readiness checks

pub mod config;
pub mod controller;
pub mod crd;
pub mod deploy;
pub mod exec;
pub mod fetch;
pub mod observability;
pub mod runtime;
pub mod server;
pub mod template;
pub mod workdir;
