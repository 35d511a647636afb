//! # Deploy Pipeline
//!
//! Fetch, template, deploy, inspect: strictly ordered with short-circuit on
//! failure. Each stage's outcome is recorded into status and persisted before
//! the next stage runs, so a crash mid-pipeline leaves an accurate partial
//! record. Status-write failures mid-pipeline are converted into a synthetic
//! failed stage result so the uniform error path handles them.

use crate::controller::reconciler::app::{now_rfc3339, parse_rfc3339, AppHandle};
use crate::crd::{
    AppStatusDeploy, AppStatusFetch, AppStatusInspect, AppStatusTemplate, AssociatedResources,
    GroupKind, KappDeployStatus,
};
use crate::exec::CmdRunResult;
use crate::observability::metrics;
use crate::workdir::StagingDir;
use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::warn;

impl AppHandle {
    /// Run the full deploy pipeline and fold the outcome into status. Returns
    /// an error only for the status writes that bracket the pipeline; stage
    /// failures are recorded, not raised.
    pub async fn reconcile_deploy(&mut self) -> Result<()> {
        self.mark_observed_latest();
        self.set_reconciling();

        self.update_status("marking reconciling").await?;

        let result = self.fetch_template_deploy().await;
        self.set_reconcile_completed(&result);

        // Inspect regardless of deploy success, but never when deploy was
        // not attempted at all
        if self.status().deploy.is_some() {
            let _ = self.reconcile_inspect().await;
        }

        self.update_status("marking reconcile completed").await
    }

    async fn fetch_template_deploy(&mut self) -> CmdRunResult {
        let start = Instant::now();
        let result = self.fetch_template_deploy_inner().await;
        metrics::register_overall_time(self.is_first_reconcile, start.elapsed());
        result
    }

    async fn fetch_template_deploy_inner(&mut self) -> CmdRunResult {
        let staging = match StagingDir::create("fetch-template-deploy") {
            Ok(dir) => dir,
            Err(e) => return CmdRunResult::with_error(e),
        };
        let assets_path = staging.path().to_path_buf();

        {
            self.reset_last_fetch_started_at();

            let fetch_start = Instant::now();
            let fetch_result = self.fetcher.fetch(&assets_path).await;
            metrics::register_fetch_time(self.is_first_reconcile, fetch_start.elapsed());

            let started_at = self.status().fetch.as_ref().and_then(|f| f.started_at.clone());
            self.status_mut().fetch = Some(AppStatusFetch {
                stdout: some_nonempty(&fetch_result.stdout),
                stderr: some_nonempty(&fetch_result.stderr),
                exit_code: fetch_result.exit_code,
                error: fetch_result.error.clone(),
                started_at,
                updated_at: Some(now_rfc3339()),
            });

            if let Err(e) = self.update_status("marking fetch completed").await {
                return CmdRunResult::with_error(e);
            }
            if !fetch_result.succeeded() {
                return fetch_result;
            }
        }

        let template_start = Instant::now();
        let tpl_result = self.templater.template_dir(&assets_path).await;
        metrics::register_template_time(self.is_first_reconcile, template_start.elapsed());

        self.status_mut().template = Some(AppStatusTemplate {
            stderr: some_nonempty(&tpl_result.stderr),
            exit_code: tpl_result.exit_code,
            error: tpl_result.error.clone(),
            updated_at: Some(now_rfc3339()),
        });

        if let Err(e) = self.update_status("marking template completed").await {
            return CmdRunResult::with_error(e);
        }
        if !tpl_result.succeeded() {
            return tpl_result;
        }

        self.reset_last_deploy_started_at();

        let (deploy_result, metadata) = self
            .deployer
            .deploy(tpl_result.stdout.into_bytes())
            .await;
        self.metadata = metadata;

        self.update_last_deploy(deploy_result).await
    }

    /// Record a deploy (or delete) outcome into `Status.Deploy`, merging the
    /// backend's ownership metadata when it reports a real change-set. A
    /// delete reports no touched namespaces, which leaves the prior deploy's
    /// recorded change-set intact.
    pub(crate) async fn update_last_deploy(&mut self, result: CmdRunResult) -> CmdRunResult {
        let result = result.with_friendly_strings();

        let prior = self.status().deploy.clone().unwrap_or_default();
        let mut record = AppStatusDeploy {
            stdout: some_nonempty(&result.stdout),
            stderr: some_nonempty(&result.stderr),
            finished: result.finished,
            exit_code: result.exit_code,
            error: result.error.clone(),
            started_at: prior.started_at,
            updated_at: Some(now_rfc3339()),
            kapp_deploy_status: prior.kapp_deploy_status,
        };

        let mut deploy_attempted = false;
        if let Some(metadata) = &self.metadata {
            if !metadata.last_change.namespaces.is_empty() {
                let group_kinds = metadata
                    .used_gks
                    .iter()
                    .map(|gk| GroupKind {
                        group: gk.group.clone(),
                        kind: gk.kind.clone(),
                    })
                    .collect();

                record.kapp_deploy_status = Some(KappDeployStatus {
                    associated_resources: AssociatedResources {
                        label: Some(format!("{}={}", metadata.label_key, metadata.label_value)),
                        namespaces: metadata.last_change.namespaces.clone(),
                        group_kinds,
                    },
                });
                deploy_attempted = true;
            }
        }

        self.status_mut().deploy = Some(record);
        if deploy_attempted {
            metrics::register_deploy_time(self.is_first_reconcile, self.deploy_elapsed());
        }

        if let Err(e) = self.update_status("marking last deploy").await {
            warn!(error = %e, "Failed to persist deploy record");
        }

        result
    }

    fn deploy_elapsed(&self) -> Duration {
        let deploy = self.status().deploy.as_ref();
        let started = deploy
            .and_then(|d| d.started_at.as_deref())
            .and_then(parse_rfc3339);
        let updated = deploy
            .and_then(|d| d.updated_at.as_deref())
            .and_then(parse_rfc3339);

        match (started, updated) {
            (Some(s), Some(u)) => (u - s).to_std().unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    /// Best-effort inspection of the live cluster objects. An empty result
    /// clears the inspect record rather than recording an empty one.
    async fn reconcile_inspect(&mut self) -> Result<()> {
        let result = self.deployer.inspect().await.with_friendly_strings();

        if result.is_empty() {
            self.status_mut().inspect = None;
        } else {
            self.status_mut().inspect = Some(AppStatusInspect {
                stdout: some_nonempty(&result.stdout),
                stderr: some_nonempty(&result.stderr),
                exit_code: result.exit_code,
                error: result.error.clone(),
                updated_at: Some(now_rfc3339()),
            });
        }

        self.update_status("marking inspect completed").await
    }
}

fn some_nonempty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
