//! # App Deploy Controller
//!
//! A Kubernetes controller that continuously deploys applications declared as
//! `App` custom resources.
//!
//! ## Overview
//!
//! For each `App` the controller:
//!
//! 1. **Fetches sources** - git repositories, HTTP archives, or inline files via `vendir`
//! 2. **Renders manifests** - `helm template` or `kustomize build`
//! 3. **Deploys to the cluster** - `kapp deploy` with ownership tracking
//! 4. **Inspects the result** - records the live object tree into status
//!
//! Reconciliation outcomes (conditions, consecutive success/failure streaks,
//! per-stage diagnostics) are written to the `App` status subresource, and the
//! next reconcile is scheduled from the resource's sync period or, while
//! failing, a bounded retry cadence.
//!
//! ## Features
//!
//! - **Multi-namespace**: watches `App` resources across all namespaces
//! - **Pause/cancel**: `spec.paused` / `spec.canceled` stop the pipelines without deleting anything
//! - **Force reconcile**: the `deploykit.io/reconcile` annotation triggers an immediate deploy
//! - **Prometheus metrics**: reconcile counters and per-stage duration histograms
//! - **Health probes**: HTTP endpoints for liveness and readiness checks

use anyhow::{Context, Result};
use app_deploy_controller::config::ControllerConfig;
use app_deploy_controller::controller::reconciler::{reconcile, Reconciler};
use app_deploy_controller::crd::App;
use app_deploy_controller::observability::metrics;
use app_deploy_controller::runtime::error_policy;
use app_deploy_controller::server::{start_server, ServerState};
use clap::Parser;
use futures::StreamExt;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// External tools the pipelines shell out to
const REQUIRED_TOOLS: [&str; 4] = ["vendir", "helm", "kustomize", "kapp"];

#[derive(Debug, Parser)]
#[command(name = "app-deploy-controller", version, about)]
struct Args {
    /// Watch a single namespace instead of all namespaces
    #[arg(long)]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "app_deploy_controller=info".into()),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("BUILD_GIT_HASH"),
        built = env!("BUILD_DATETIME"),
        "Starting App Deploy Controller"
    );

    let config = ControllerConfig::from_env();

    probe_tools();

    metrics::register_metrics()?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
    });

    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {e}");
        }
    });

    let client = Client::try_default()
        .await
        .context("Creating Kubernetes client")?;

    let apps: Api<App> = match &args.namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    let concurrency = u16::try_from(config.max_concurrent_reconciliations).unwrap_or(u16::MAX);
    let reconciler = Arc::new(Reconciler::new(client, config));

    server_state.is_ready.store(true, Ordering::Relaxed);

    Controller::new(apps, watcher::Config::default())
        .with_config(kube::runtime::controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::clone(&reconciler))
        .for_each(|_| std::future::ready(()))
        .await;

    info!("Controller stopped");

    Ok(())
}

/// Warn early about missing pipeline tools; a missing tool surfaces later as
/// a stage failure on the resources that need it
fn probe_tools() {
    for tool in REQUIRED_TOOLS {
        match which::which(tool) {
            Ok(path) => info!("Found {tool} at {}", path.display()),
            Err(_) => warn!("{tool} not found in PATH, stages depending on it will fail"),
        }
    }
}
