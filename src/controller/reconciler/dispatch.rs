//! # Reconcile Dispatcher
//!
//! Single entry point invoked by the watch layer once per relevant change or
//! timer tick. Classifies the delivered resource into a branch, runs the
//! chosen pipeline, and returns the requeue delay computed from the
//! resource's resulting state. Not reentrant per resource; the watch layer
//! serializes reconciles per object key.

use crate::controller::reconciler::app::AppHandle;
use crate::controller::reconciler::timer::{ReconcileTimer, ReconcileTimerOpts};
use crate::controller::reconciler::types::{KubeStatusPublisher, Reconciler, ReconcilerError};
use crate::crd::{App, DeploySpec, TemplateSpec};
use crate::deploy::{Deployer, KappDeployer};
use crate::fetch::{Fetcher, VendirFetcher};
use crate::observability::metrics;
use crate::template::{HelmTemplater, KustomizeTemplater, Templater};
use chrono::Utc;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Annotation that forces a deploy on the next reconcile regardless of timer
/// readiness; cleared after the deploy branch runs
pub const FORCE_RECONCILE_ANNOTATION: &str = "deploykit.io/reconcile";

#[instrument(skip_all, fields(name = %app.name_any(), namespace = app.namespace().unwrap_or_default()))]
pub async fn reconcile(app: Arc<App>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let timer_opts = ReconcileTimerOpts {
        default_sync_period: ctx.config.default_sync_period(),
        minimum_sync_period: ctx.config.minimum_sync_period(),
    };

    let force = app.annotations().contains_key(FORCE_RECONCILE_ANNOTATION);

    let mut handle = new_handle((*app).clone(), &ctx).await?;

    let outcome = match classify(&app, force, Utc::now(), timer_opts) {
        ReconcileBranch::Delete => {
            info!("Started delete");
            let outcome = handle.reconcile_delete().await;
            info!("Completed delete");
            outcome
        }
        ReconcileBranch::CanceledPaused => {
            info!("App is canceled or paused, not reconciling");
            handle.reconcile_canceled_paused().await
        }
        ReconcileBranch::Deploy => {
            info!("Started deploy");
            let outcome = handle.reconcile_deploy().await;
            info!("Completed deploy");

            if force {
                clear_force_annotation(&ctx, &app).await;
            }
            outcome
        }
        ReconcileBranch::Noop => {
            info!("Reconcile noop");
            Ok(())
        }
    };

    if let Err(e) = handle.update_status("app reconciled").await {
        warn!(error = %e, "Failed to flush status");
    }

    // The timer reads the counters the branch just updated, so the delay
    // follows the retry cadence while failing and the sync period once stable
    let timer = ReconcileTimer::new(&handle.app, timer_opts);
    match outcome {
        Ok(()) => {
            crate::runtime::reset_backoff(&ctx, &handle.app);
            Ok(Action::requeue(timer.duration_until_ready(false)))
        }
        Err(e) => Err(ReconcilerError::ReconciliationFailed(e)),
    }
}

/// Dispatcher branch, first match wins: a deletion marker beats everything,
/// then pause/cancel, then a forced or due deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReconcileBranch {
    Delete,
    CanceledPaused,
    Deploy,
    Noop,
}

fn classify(
    app: &App,
    force: bool,
    now: chrono::DateTime<Utc>,
    timer_opts: ReconcileTimerOpts,
) -> ReconcileBranch {
    if app.metadata.deletion_timestamp.is_some() {
        return ReconcileBranch::Delete;
    }
    if app.spec.canceled || app.spec.paused {
        return ReconcileBranch::CanceledPaused;
    }
    if force || ReconcileTimer::new(app, timer_opts).is_ready_at(now) {
        return ReconcileBranch::Deploy;
    }
    ReconcileBranch::Noop
}

/// Build the per-reconcile handle: select backends from the spec and snapshot
/// the first-reconcile flag before the attempt counter moves
async fn new_handle(app: App, ctx: &Reconciler) -> Result<AppHandle, ReconcilerError> {
    let name = app.name_any();
    let namespace = app.namespace().unwrap_or_else(|| "default".to_string());

    let fetcher: Arc<dyn Fetcher> = Arc::new(VendirFetcher::new(
        ctx.cmd_runner.clone(),
        app.spec.fetch.clone(),
        ctx.config.fetch_cache_dir.clone(),
    ));

    let templater: Arc<dyn Templater> = match &app.spec.template {
        TemplateSpec::HelmTemplate(opts) => {
            let kubernetes_version = if opts.kubernetes_version {
                Some(ctx.kubernetes_version().await?)
            } else {
                None
            };
            Arc::new(HelmTemplater::new(
                ctx.cmd_runner.clone(),
                opts.clone(),
                &name,
                &namespace,
                kubernetes_version,
            ))
        }
        TemplateSpec::Kustomize(opts) => {
            Arc::new(KustomizeTemplater::new(ctx.cmd_runner.clone(), opts.clone()))
        }
    };

    let DeploySpec::Kapp(deploy_opts) = app.spec.deploy.clone();
    let deployer: Arc<dyn Deployer> = Arc::new(KappDeployer::new(
        ctx.cmd_runner.clone(),
        deploy_opts,
        &name,
        &namespace,
    ));

    let is_first_reconcile = metrics::reconcile_attempt_count("App", &name, &namespace) == 0;

    Ok(AppHandle {
        app,
        publisher: Arc::new(KubeStatusPublisher::new(ctx.client.clone())),
        fetcher,
        templater,
        deployer,
        is_first_reconcile,
        metadata: None,
    })
}

/// Drop the force annotation after the forced deploy ran; the patch failing
/// only means the next reconcile is also forced
async fn clear_force_annotation(ctx: &Reconciler, app: &App) {
    let api: Api<App> = Api::namespaced(
        ctx.client.clone(),
        &app.namespace().unwrap_or_else(|| "default".to_string()),
    );
    let patch = serde_json::json!({
        "metadata": { "annotations": { FORCE_RECONCILE_ANNOTATION: null } }
    });
    if let Err(e) = api
        .patch(&app.name_any(), &PatchParams::default(), &Patch::Merge(patch))
        .await
    {
        warn!(error = %e, "Failed to clear force-reconcile annotation");
    }
}
