//! # Reconciler
//!
//! Core reconciliation logic for `App` resources.
//!
//! The reconciler:
//! - Classifies each delivered `App` into a branch: delete, canceled/paused,
//!   scheduled deploy, or noop
//! - Runs the deploy pipeline (fetch → template → deploy → inspect) or the
//!   delete pipeline, recording a per-stage result into status
//! - Folds outcomes into the status state machine (conditions, consecutive
//!   success/failure counters, friendly description, useful error message)
//! - Computes the requeue delay from past outcomes via the reconcile timer
//!
//! A single resource is reconciled by at most one worker at a time; the
//! kube-runtime Controller serializes reconciles per object key, so no
//! internal locking is needed.

mod app;
mod delete;
mod deploy;
mod dispatch;
mod status;
mod timer;
mod types;

pub use app::AppHandle;
pub use dispatch::reconcile;
pub use timer::{ReconcileTimer, ReconcileTimerOpts};
pub use types::{KubeStatusPublisher, Reconciler, ReconcilerError, StatusPublisher};
