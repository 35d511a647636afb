//! # Deploy Backends
//!
//! Pluggable deploy strategies behind the [`Deployer`] contract. The kapp
//! backend is the reference implementation. Deploy, delete, and inspect share
//! the execution shape; delete semantically removes the cluster objects the
//! deploy created.

mod kapp;

pub use kapp::KappDeployer;

use crate::exec::CmdRunResult;
use async_trait::async_trait;
use serde::Deserialize;

/// Cluster objects and ownership label last touched by a deploy. Populated by
/// the deploy backend; absent during delete so prior deploy status is never
/// clobbered.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeployMetadata {
    #[serde(default)]
    pub label_key: String,
    #[serde(default)]
    pub label_value: String,
    #[serde(default)]
    pub last_change: DeployChange,
    #[serde(default, alias = "usedGKs")]
    pub used_gks: Vec<DeployGroupKind>,
}

/// Namespaces touched by the last change
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeployChange {
    #[serde(default)]
    pub namespaces: Vec<String>,
}

/// Group-kind pair as reported by the deploy backend
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DeployGroupKind {
    #[serde(default, alias = "group")]
    #[serde(rename = "Group")]
    pub group: String,
    #[serde(alias = "kind")]
    #[serde(rename = "Kind")]
    pub kind: String,
}

/// Deploy contract: apply rendered manifests, remove them, inspect the live
/// result. Each operation returns a uniform stage result; deploy additionally
/// yields ownership metadata when the backend reports it.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Apply rendered manifests (piped via stdin)
    async fn deploy(&self, manifests: Vec<u8>) -> (CmdRunResult, Option<DeployMetadata>);

    /// Remove the cluster objects owned by this app
    async fn delete(&self) -> CmdRunResult;

    /// Inspect the live objects owned by this app
    async fn inspect(&self) -> CmdRunResult;
}
