//! # Custom Resource Definitions
//!
//! CRD types for the App Deploy Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - The `App` resource, fetch/template/deploy backend selection
//! - `status.rs` - Status types: conditions, per-stage records, counters

mod spec;
mod status;

pub use spec::{
    App, AppSpec, DeploySpec, FetchSource, GitFetch, HelmTemplateSpec, HelmValuesSource,
    HttpFetch, InlineFetch, KappDeploySpec, KustomizeTemplateSpec, TemplateSpec,
};
pub use status::{
    AppStatus, AppStatusDeploy, AppStatusFetch, AppStatusInspect, AppStatusTemplate,
    AssociatedResources, Condition, ConditionType, GroupKind, KappDeployStatus,
};
