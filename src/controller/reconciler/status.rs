//! # Status State Machine
//!
//! Condition transitions for the deploy and delete pipelines. Each
//! transition replaces the whole condition set so exactly one condition is
//! active at any time, and keeps the consecutive success/failure counters
//! and the friendly description in lockstep.

use crate::controller::reconciler::app::AppHandle;
use crate::crd::{Condition, ConditionType};
use crate::exec::CmdRunResult;
use crate::observability::metrics;

impl AppHandle {
    /// Enter the deploy pipeline: Reconciling becomes the sole condition and
    /// the attempt is counted
    pub fn set_reconciling(&mut self) {
        let (kind, name, namespace) = (self.kind(), self.name(), self.namespace());
        metrics::register_reconcile_attempt(kind, &name, &namespace);

        let status = self.status_mut();
        status.conditions.clear();
        status
            .conditions
            .push(Condition::active(ConditionType::Reconciling));
        status.friendly_description = Some("Reconciling".to_string());
    }

    /// Fold the deploy pipeline outcome into status: terminal condition,
    /// counters, friendly description, and the useful error message
    pub fn set_reconcile_completed(&mut self, result: &CmdRunResult) {
        let (kind, name, namespace) = (self.kind(), self.name(), self.namespace());

        if result.succeeded() {
            metrics::register_reconcile_success(kind, &name, &namespace);

            let status = self.status_mut();
            status.conditions.clear();
            status
                .conditions
                .push(Condition::active(ConditionType::ReconcileSucceeded));
            status.consecutive_reconcile_successes =
                status.consecutive_reconcile_successes.saturating_add(1);
            status.consecutive_reconcile_failures = 0;
            status.friendly_description = Some("Reconcile succeeded".to_string());
            status.useful_error_message = None;
        } else {
            metrics::register_reconcile_failure(kind, &name, &namespace);

            let err = result.error_str();
            let useful = useful_error_message(result);

            let status = self.status_mut();
            status.conditions.clear();
            status.conditions.push(Condition::active_with_message(
                ConditionType::ReconcileFailed,
                err.clone(),
            ));
            status.consecutive_reconcile_failures =
                status.consecutive_reconcile_failures.saturating_add(1);
            status.consecutive_reconcile_successes = 0;
            status.friendly_description = Some(format!("Reconcile failed: {err}"));
            status.useful_error_message = Some(useful);
        }
    }

    /// Enter the delete pipeline
    pub fn set_deleting(&mut self) {
        let (kind, name, namespace) = (self.kind(), self.name(), self.namespace());
        metrics::register_delete_attempt(kind, &name, &namespace);

        let status = self.status_mut();
        status.conditions.clear();
        status
            .conditions
            .push(Condition::active(ConditionType::Deleting));
        status.friendly_description = Some("Deleting".to_string());
    }

    /// Fold the delete pipeline outcome into status. Success leaves no
    /// condition behind (the resource is about to disappear) and drops the
    /// resource's metric series.
    pub fn set_delete_completed(&mut self, result: &CmdRunResult) {
        let (kind, name, namespace) = (self.kind(), self.name(), self.namespace());

        if result.succeeded() {
            self.status_mut().conditions.clear();
            metrics::remove_resource_metrics(kind, &name, &namespace);
        } else {
            metrics::register_delete_failure(kind, &name, &namespace);

            let err = result.error_str();
            let useful = useful_error_message(result);

            let status = self.status_mut();
            status.conditions.clear();
            status.conditions.push(Condition::active_with_message(
                ConditionType::DeleteFailed,
                err.clone(),
            ));
            status.consecutive_reconcile_failures =
                status.consecutive_reconcile_failures.saturating_add(1);
            status.consecutive_reconcile_successes = 0;
            status.friendly_description = Some(format!("Delete failed: {err}"));
            status.useful_error_message = Some(useful);
        }
    }
}

/// Best available diagnostic for operators: stderr copied verbatim when the
/// tool produced any, otherwise the structured error text
pub(crate) fn useful_error_message(result: &CmdRunResult) -> String {
    if result.stderr.is_empty() {
        result.error_str()
    } else {
        result.stderr.clone()
    }
}
