//! # Types
//!
//! Core types for the reconciler: the shared context handed to every
//! reconcile, the dispatcher error type, and the status persistence contract.

use crate::config::ControllerConfig;
use crate::crd::App;
use crate::exec::{CmdRunner, LocalCmdRunner};
use crate::runtime::BackoffTracker;
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the dispatcher. Stage failures are folded into status
/// and never appear here; what does appear is the class of error the watch
/// layer should retry with its own backoff (status-write conflicts, backend
/// construction failures).
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),
}

/// Shared context for all reconciles
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub config: ControllerConfig,
    pub cmd_runner: Arc<dyn CmdRunner>,
    /// Watch-layer backoff state per resource, consulted by the error
    /// policy, not by the reconcile timer
    pub backoff_states: Arc<BackoffTracker>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        Self {
            client,
            config,
            cmd_runner: Arc::new(LocalCmdRunner),
            backoff_states: Arc::new(BackoffTracker::default()),
        }
    }

    /// Cluster version in "major.minor.patch" form, for template backends
    /// that render version-dependent output
    pub async fn kubernetes_version(&self) -> Result<String> {
        let info = self
            .client
            .apiserver_version()
            .await
            .context("Querying apiserver version")?;
        Ok(info.git_version.trim_start_matches('v').to_string())
    }
}

/// Status persistence contract. Idempotent, last-write-wins from the engine's
/// viewpoint; a conflict is returned as an error the caller treats as
/// retryable on the next cycle.
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(&self, app: &App, reason: &str) -> Result<()>;
}

/// Publishes status through the Kubernetes status subresource
#[derive(Clone)]
pub struct KubeStatusPublisher {
    client: Client,
}

impl std::fmt::Debug for KubeStatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStatusPublisher").finish_non_exhaustive()
    }
}

impl KubeStatusPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StatusPublisher for KubeStatusPublisher {
    async fn publish(&self, app: &App, reason: &str) -> Result<()> {
        let api: Api<App> = Api::namespaced(
            self.client.clone(),
            app.namespace().as_deref().unwrap_or("default"),
        );

        let patch = serde_json::json!({ "status": app.status });

        api.patch_status(
            &app.name_any(),
            &PatchParams::default(),
            &Patch::Merge(patch),
        )
        .await
        .with_context(|| format!("Updating status ({reason})"))?;

        Ok(())
    }
}
