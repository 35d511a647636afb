//! # App Handle
//!
//! Per-reconcile working copy of one `App` resource, bundled with the
//! backends selected from its spec. All status mutations go through the
//! handle and are persisted explicitly at the transition points the
//! pipelines define.

use crate::crd::{App, AppStatus};
use crate::deploy::{DeployMetadata, Deployer};
use crate::fetch::Fetcher;
use crate::template::Templater;
use crate::controller::reconciler::types::StatusPublisher;
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use kube::ResourceExt;
use std::sync::Arc;

pub struct AppHandle {
    pub app: App,
    pub publisher: Arc<dyn StatusPublisher>,
    pub fetcher: Arc<dyn Fetcher>,
    pub templater: Arc<dyn Templater>,
    pub deployer: Arc<dyn Deployer>,
    /// True when this is the first reconcile attempt observed for this
    /// resource since the controller started; splits duration metrics
    pub is_first_reconcile: bool,
    /// Ownership metadata reported by the last deploy in this reconcile
    pub metadata: Option<DeployMetadata>,
}

impl std::fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppHandle")
            .field("name", &self.name())
            .field("namespace", &self.namespace())
            .field("is_first_reconcile", &self.is_first_reconcile)
            .finish_non_exhaustive()
    }
}

impl AppHandle {
    pub fn kind(&self) -> &'static str {
        "App"
    }

    pub fn name(&self) -> String {
        self.app.name_any()
    }

    pub fn namespace(&self) -> String {
        self.app.namespace().unwrap_or_else(|| "default".to_string())
    }

    /// Identifier for fetch-cache invalidation
    pub fn cache_id(&self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }

    pub fn status(&self) -> &AppStatus {
        static EMPTY: AppStatus = AppStatus {
            observed_generation: None,
            conditions: Vec::new(),
            fetch: None,
            template: None,
            deploy: None,
            inspect: None,
            consecutive_reconcile_failures: 0,
            consecutive_reconcile_successes: 0,
            friendly_description: None,
            useful_error_message: None,
        };
        self.app.status.as_ref().unwrap_or(&EMPTY)
    }

    pub fn status_mut(&mut self) -> &mut AppStatus {
        self.app.status.get_or_insert_with(AppStatus::default)
    }

    /// Record that the controller has seen the current spec generation
    pub fn mark_observed_latest(&mut self) {
        let generation = self.app.metadata.generation;
        self.status_mut().observed_generation = generation;
    }

    /// Stamp the fetch record's start time before the stage runs so its
    /// duration survives a crash mid-stage
    pub fn reset_last_fetch_started_at(&mut self) {
        let now = now_rfc3339();
        self.status_mut()
            .fetch
            .get_or_insert_with(Default::default)
            .started_at = Some(now);
    }

    /// Stamp the deploy record's start time before deploy or delete runs
    pub fn reset_last_deploy_started_at(&mut self) {
        let now = now_rfc3339();
        self.status_mut()
            .deploy
            .get_or_insert_with(Default::default)
            .started_at = Some(now);
    }

    /// Canceled/paused branch: record the observed generation and the
    /// description, then persist. No stage runs.
    pub async fn reconcile_canceled_paused(&mut self) -> Result<()> {
        self.mark_observed_latest();
        self.status_mut().friendly_description = Some("Canceled/paused".to_string());
        self.update_status("app canceled/paused").await
    }

    /// Persist the current status; `reason` names the transition for error
    /// context and logs
    pub async fn update_status(&self, reason: &str) -> Result<()> {
        self.publisher.publish(&self.app, reason).await
    }
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_rfc3339(s: &str) -> Option<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_rfc3339_parses_back() {
        let ts = now_rfc3339();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
