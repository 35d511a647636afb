//! # Controller
//!
//! Reconciliation core for `App` resources: the dispatcher, the deploy and
//! delete pipelines, the status state machine, and the reconcile timer.

pub mod reconciler;
