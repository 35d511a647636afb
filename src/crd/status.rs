//! # App Status
//!
//! Status types for tracking reconciliation state: the per-stage records,
//! the mutually-exclusive condition set, and the consecutive success/failure
//! counters that feed the reconcile timer.

use serde::{Deserialize, Serialize};

/// Status of the App resource
///
/// Every condition transition replaces the whole condition set, so exactly
/// the conditions relevant to the last action taken are present.
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    /// Last spec generation the controller has reconciled against
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Outcome of the last fetch stage (None means not yet run)
    #[serde(default)]
    pub fetch: Option<AppStatusFetch>,
    /// Outcome of the last template stage
    #[serde(default)]
    pub template: Option<AppStatusTemplate>,
    /// Outcome of the last deploy stage
    #[serde(default)]
    pub deploy: Option<AppStatusDeploy>,
    /// Outcome of the last inspect stage
    #[serde(default)]
    pub inspect: Option<AppStatusInspect>,
    /// Consecutive reconcile failures; reset to 0 on success
    #[serde(default)]
    pub consecutive_reconcile_failures: u32,
    /// Consecutive reconcile successes; reset to 0 on failure
    #[serde(default)]
    pub consecutive_reconcile_successes: u32,
    /// Human-readable summary of the resource's state
    #[serde(default)]
    pub friendly_description: Option<String>,
    /// Best available diagnostic: stderr if present, else the error text
    #[serde(default)]
    pub useful_error_message: Option<String>,
}

/// Condition type; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionType {
    /// A deploy pipeline is in progress
    Reconciling,
    /// The last deploy pipeline succeeded
    ReconcileSucceeded,
    /// The last deploy pipeline failed
    ReconcileFailed,
    /// A delete pipeline is in progress
    Deleting,
    /// The last delete pipeline failed
    DeleteFailed,
}

/// A status condition
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: ConditionType,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    /// A condition of the given type with status True
    pub fn active(r#type: ConditionType) -> Self {
        Self {
            r#type,
            status: "True".to_string(),
            message: None,
        }
    }

    /// A condition of the given type with status True and a message
    pub fn active_with_message(r#type: ConditionType, message: impl Into<String>) -> Self {
        Self {
            r#type,
            status: "True".to_string(),
            message: Some(message.into()),
        }
    }
}

/// Outcome of the fetch stage
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppStatusFetch {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub error: Option<String>,
    /// RFC3339 timestamp when the stage started
    #[serde(default)]
    pub started_at: Option<String>,
    /// RFC3339 timestamp of the last record update
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Outcome of the template stage
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppStatusTemplate {
    /// Rendered manifests are not recorded; only diagnostics are kept
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Outcome of the deploy stage
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppStatusDeploy {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    /// False means the deploy was still running when last observed
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Cluster objects last touched by the deploy backend
    #[serde(default)]
    pub kapp_deploy_status: Option<KappDeployStatus>,
}

/// Outcome of the inspect stage
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppStatusInspect {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Deploy-backend ownership metadata recorded in status
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KappDeployStatus {
    /// Resources associated with the last deploy
    #[serde(default)]
    pub associated_resources: AssociatedResources,
}

/// Label, namespaces, and group-kinds last touched by the deploy backend
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedResources {
    /// Ownership label in "key=value" form
    #[serde(default)]
    pub label: Option<String>,
    /// Namespaces touched by the last change
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Group-kinds touched by the last change
    #[serde(default)]
    pub group_kinds: Vec<GroupKind>,
}

/// A Kubernetes API group and kind pair
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupKind {
    #[serde(default)]
    pub group: String,
    pub kind: String,
}
