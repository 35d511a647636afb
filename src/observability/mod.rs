//! # Observability
//!
//! Prometheus metrics for monitoring the controller.

pub mod metrics;
