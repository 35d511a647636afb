//! Deploy and delete pipeline behavior against fake backends.
//!
//! These tests drive the pipelines exactly as the dispatcher does, with the
//! fetch/template/deploy backends and the status publisher replaced by
//! in-memory fakes, and assert on the resulting status state machine.

use app_deploy_controller::controller::reconciler::{
    AppHandle, ReconcileTimer, ReconcileTimerOpts, StatusPublisher,
};
use app_deploy_controller::crd::{
    App, AppSpec, AppStatus, AppStatusTemplate, ConditionType, TemplateSpec,
};
use app_deploy_controller::deploy::{DeployChange, DeployMetadata, Deployer, DeployGroupKind};
use app_deploy_controller::exec::CmdRunResult;
use app_deploy_controller::fetch::Fetcher;
use app_deploy_controller::template::Templater;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn ok_result(stdout: &str) -> CmdRunResult {
    CmdRunResult {
        stdout: stdout.to_string(),
        finished: true,
        ..CmdRunResult::default()
    }
}

fn failed_result(stderr: &str, exit_code: i32) -> CmdRunResult {
    CmdRunResult {
        stderr: stderr.to_string(),
        exit_code,
        error: Some(format!("Running tool: exit status {exit_code}")),
        finished: true,
        ..CmdRunResult::default()
    }
}

/// Records every publish; optionally fails for one transition reason
#[derive(Default)]
struct RecordingPublisher {
    reasons: Mutex<Vec<String>>,
    fail_for_reason: Option<String>,
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(&self, _app: &App, reason: &str) -> anyhow::Result<()> {
        self.reasons.lock().unwrap().push(reason.to_string());
        if self.fail_for_reason.as_deref() == Some(reason) {
            anyhow::bail!("conflict: stale resource version");
        }
        Ok(())
    }
}

impl RecordingPublisher {
    fn saw_reason(&self, reason: &str) -> bool {
        self.reasons.lock().unwrap().iter().any(|r| r == reason)
    }
}

struct FakeFetcher {
    result: CmdRunResult,
    clear_cache_fails: bool,
    fetches: AtomicU32,
    cache_clears: AtomicU32,
}

impl FakeFetcher {
    fn succeeding() -> Self {
        Self {
            result: ok_result("fetched"),
            clear_cache_fails: false,
            fetches: AtomicU32::new(0),
            cache_clears: AtomicU32::new(0),
        }
    }

    fn failing(stderr: &str) -> Self {
        Self {
            result: failed_result(stderr, 1),
            ..Self::succeeding()
        }
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, _dst: &Path) -> CmdRunResult {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    async fn clear_cache(&self, _cache_id: &str) -> anyhow::Result<()> {
        self.cache_clears.fetch_add(1, Ordering::SeqCst);
        if self.clear_cache_fails {
            anyhow::bail!("removing cache dir: permission denied");
        }
        Ok(())
    }
}

struct FakeTemplater {
    result: CmdRunResult,
    renders: AtomicU32,
}

impl FakeTemplater {
    fn new(result: CmdRunResult) -> Self {
        Self {
            result,
            renders: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Templater for FakeTemplater {
    async fn template_dir(&self, _dir: &Path) -> CmdRunResult {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    async fn template_stream(&self, _stdin: Vec<u8>, _dir: &Path) -> CmdRunResult {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

struct FakeDeployer {
    deploy_result: CmdRunResult,
    metadata: Option<DeployMetadata>,
    delete_result: CmdRunResult,
    inspect_result: CmdRunResult,
    deploys: AtomicU32,
    deletes: AtomicU32,
    inspects: AtomicU32,
}

impl FakeDeployer {
    fn succeeding() -> Self {
        Self {
            deploy_result: ok_result("deployed"),
            metadata: Some(DeployMetadata {
                label_key: "kapp.k14s.io/app".to_string(),
                label_value: "12345".to_string(),
                last_change: DeployChange {
                    namespaces: vec!["default".to_string()],
                },
                used_gks: vec![DeployGroupKind {
                    group: "apps".to_string(),
                    kind: "Deployment".to_string(),
                }],
            }),
            delete_result: ok_result("deleted"),
            inspect_result: ok_result("inspect tree"),
            deploys: AtomicU32::new(0),
            deletes: AtomicU32::new(0),
            inspects: AtomicU32::new(0),
        }
    }

    fn with_deploy_result(result: CmdRunResult) -> Self {
        Self {
            deploy_result: result,
            metadata: None,
            ..Self::succeeding()
        }
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn deploy(&self, _manifests: Vec<u8>) -> (CmdRunResult, Option<DeployMetadata>) {
        self.deploys.fetch_add(1, Ordering::SeqCst);
        (self.deploy_result.clone(), self.metadata.clone())
    }

    async fn delete(&self) -> CmdRunResult {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.delete_result.clone()
    }

    async fn inspect(&self) -> CmdRunResult {
        self.inspects.fetch_add(1, Ordering::SeqCst);
        self.inspect_result.clone()
    }
}

fn test_app(name: &str) -> App {
    let mut app = App::new(
        name,
        AppSpec {
            fetch: vec![],
            template: TemplateSpec::Kustomize(Default::default()),
            deploy: Default::default(),
            sync_period: None,
            paused: false,
            canceled: false,
        },
    );
    app.metadata.namespace = Some("default".to_string());
    app.metadata.generation = Some(1);
    app
}

struct Fixture {
    publisher: Arc<RecordingPublisher>,
    fetcher: Arc<FakeFetcher>,
    templater: Arc<FakeTemplater>,
    deployer: Arc<FakeDeployer>,
}

impl Fixture {
    fn handle(&self, app: App) -> AppHandle {
        AppHandle {
            app,
            publisher: Arc::clone(&self.publisher) as Arc<dyn StatusPublisher>,
            fetcher: Arc::clone(&self.fetcher) as Arc<dyn Fetcher>,
            templater: Arc::clone(&self.templater) as Arc<dyn Templater>,
            deployer: Arc::clone(&self.deployer) as Arc<dyn Deployer>,
            is_first_reconcile: true,
            metadata: None,
        }
    }
}

fn all_succeeding() -> Fixture {
    Fixture {
        publisher: Arc::new(RecordingPublisher::default()),
        fetcher: Arc::new(FakeFetcher::succeeding()),
        templater: Arc::new(FakeTemplater::new(ok_result("kind: ConfigMap"))),
        deployer: Arc::new(FakeDeployer::succeeding()),
    }
}

fn condition_types(status: &AppStatus) -> Vec<ConditionType> {
    status.conditions.iter().map(|c| c.r#type).collect()
}

fn timer_opts() -> ReconcileTimerOpts {
    ReconcileTimerOpts {
        default_sync_period: Duration::from_secs(300),
        minimum_sync_period: Duration::from_secs(10),
    }
}

#[tokio::test]
async fn test_successful_pipeline_records_every_stage() {
    let fixture = all_succeeding();
    let mut handle = fixture.handle(test_app("success"));

    handle.reconcile_deploy().await.unwrap();

    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(
        condition_types(status),
        vec![ConditionType::ReconcileSucceeded]
    );
    assert_eq!(status.consecutive_reconcile_successes, 1);
    assert_eq!(status.consecutive_reconcile_failures, 0);
    assert_eq!(status.friendly_description.as_deref(), Some("Reconcile succeeded"));
    assert_eq!(status.observed_generation, Some(1));
    assert!(status.useful_error_message.is_none());

    assert!(status.fetch.is_some());
    assert!(status.template.is_some());
    let deploy = status.deploy.as_ref().unwrap();
    assert!(deploy.started_at.is_some());
    assert!(deploy.error.is_none());

    // Ownership metadata merged from the deploy backend
    let kapp = deploy.kapp_deploy_status.as_ref().unwrap();
    assert_eq!(
        kapp.associated_resources.label.as_deref(),
        Some("kapp.k14s.io/app=12345")
    );
    assert_eq!(kapp.associated_resources.namespaces, vec!["default"]);
    assert_eq!(kapp.associated_resources.group_kinds[0].kind, "Deployment");

    // Inspect ran exactly once and was recorded
    assert_eq!(fixture.deployer.inspects.load(Ordering::SeqCst), 1);
    assert_eq!(
        status.inspect.as_ref().unwrap().stdout.as_deref(),
        Some("inspect tree")
    );

    // Delay settles at the sync period once healthy
    let timer = ReconcileTimer::new(&handle.app, timer_opts());
    assert_eq!(timer.duration_until_ready(false), Duration::from_secs(300));
}

#[tokio::test]
async fn test_fetch_failure_short_circuits_template_and_deploy() {
    let fixture = Fixture {
        fetcher: Arc::new(FakeFetcher::failing("remote not found")),
        ..all_succeeding()
    };

    // Prior template record from an older cycle must survive untouched
    let mut app = test_app("fetch-fail");
    app.status = Some(AppStatus {
        template: Some(AppStatusTemplate {
            exit_code: 0,
            updated_at: Some("2026-08-01T00:00:00Z".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    });
    let mut handle = fixture.handle(app);

    handle.reconcile_deploy().await.unwrap();

    assert_eq!(fixture.templater.renders.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.deployer.deploys.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.deployer.inspects.load(Ordering::SeqCst), 0);

    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(condition_types(status), vec![ConditionType::ReconcileFailed]);
    assert_eq!(status.consecutive_reconcile_failures, 1);
    assert_eq!(status.consecutive_reconcile_successes, 0);
    assert_eq!(status.useful_error_message.as_deref(), Some("remote not found"));
    assert!(status.deploy.is_none());
    assert_eq!(
        status.template.as_ref().unwrap().updated_at.as_deref(),
        Some("2026-08-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_template_failure_skips_deploy_but_inspects_prior_deploy() {
    let fixture = Fixture {
        templater: Arc::new(FakeTemplater::new(failed_result("chart not found", 1))),
        ..all_succeeding()
    };

    // A deploy from an earlier cycle exists, so inspect still runs
    let mut app = test_app("template-fail");
    app.status = Some(AppStatus {
        deploy: Some(Default::default()),
        ..Default::default()
    });
    let mut handle = fixture.handle(app);

    handle.reconcile_deploy().await.unwrap();

    assert_eq!(fixture.deployer.deploys.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.deployer.inspects.load(Ordering::SeqCst), 1);

    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(condition_types(status), vec![ConditionType::ReconcileFailed]);
    assert_eq!(status.useful_error_message.as_deref(), Some("chart not found"));
}

#[tokio::test]
async fn test_deploy_failure_surfaces_stderr_and_retries_at_the_floor() {
    let fixture = Fixture {
        deployer: Arc::new(FakeDeployer::with_deploy_result(failed_result(
            "connection refused",
            1,
        ))),
        ..all_succeeding()
    };
    let mut handle = fixture.handle(test_app("deploy-fail"));

    handle.reconcile_deploy().await.unwrap();

    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(condition_types(status), vec![ConditionType::ReconcileFailed]);
    assert_eq!(status.consecutive_reconcile_failures, 1);
    assert_eq!(status.useful_error_message.as_deref(), Some("connection refused"));

    // Deploy was attempted, so inspect runs even on failure
    assert_eq!(fixture.deployer.inspects.load(Ordering::SeqCst), 1);

    // Retry lands at the minimum sync period
    let timer = ReconcileTimer::new(&handle.app, timer_opts());
    assert_eq!(timer.duration_until_ready(true), Duration::from_secs(10));
}

#[tokio::test]
async fn test_success_resets_the_failure_streak() {
    let fixture = all_succeeding();
    let mut app = test_app("streak-reset");
    app.status = Some(AppStatus {
        consecutive_reconcile_failures: 4,
        ..Default::default()
    });
    let mut handle = fixture.handle(app);

    handle.reconcile_deploy().await.unwrap();

    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(status.consecutive_reconcile_failures, 0);
    assert_eq!(status.consecutive_reconcile_successes, 1);
}

#[tokio::test]
async fn test_mid_pipeline_status_conflict_is_folded_into_the_result() {
    let fixture = Fixture {
        publisher: Arc::new(RecordingPublisher {
            fail_for_reason: Some("marking fetch completed".to_string()),
            ..Default::default()
        }),
        ..all_succeeding()
    };
    let mut handle = fixture.handle(test_app("conflict"));

    handle.reconcile_deploy().await.unwrap();

    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(condition_types(status), vec![ConditionType::ReconcileFailed]);
    assert!(status
        .useful_error_message
        .as_deref()
        .unwrap()
        .contains("conflict"));
    assert_eq!(fixture.templater.renders.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_canceled_or_paused_runs_no_stage() {
    let fixture = all_succeeding();
    let mut handle = fixture.handle(test_app("paused"));

    handle.reconcile_canceled_paused().await.unwrap();

    assert_eq!(fixture.fetcher.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.templater.renders.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.deployer.deploys.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.deployer.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(fixture.deployer.inspects.load(Ordering::SeqCst), 0);

    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(status.friendly_description.as_deref(), Some("Canceled/paused"));
    assert_eq!(status.observed_generation, Some(1));
    assert!(status.conditions.is_empty());
    assert!(fixture.publisher.saw_reason("app canceled/paused"));
}

#[tokio::test]
async fn test_delete_pipeline_clears_cache_then_deletes() {
    let fixture = all_succeeding();
    let mut handle = fixture.handle(test_app("delete-ok"));

    handle.reconcile_delete().await.unwrap();

    assert_eq!(fixture.fetcher.cache_clears.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.deployer.deletes.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.deployer.deploys.load(Ordering::SeqCst), 0);

    // Successful delete leaves no condition behind
    let status = handle.app.status.as_ref().unwrap();
    assert!(status.conditions.is_empty());
}

#[tokio::test]
async fn test_cache_clear_failure_aborts_before_delete() {
    let fixture = Fixture {
        fetcher: Arc::new(FakeFetcher {
            clear_cache_fails: true,
            ..FakeFetcher::succeeding()
        }),
        ..all_succeeding()
    };
    let mut handle = fixture.handle(test_app("cache-fail"));

    let outcome = handle.reconcile_delete().await;

    assert!(outcome.is_err());
    assert_eq!(fixture.deployer.deletes.load(Ordering::SeqCst), 0);

    // Deleting condition is still active; delete-completed never ran
    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(condition_types(status), vec![ConditionType::Deleting]);
    assert_eq!(status.friendly_description.as_deref(), Some("Deleting"));
}

#[tokio::test]
async fn test_delete_completion_status_write_failure_is_swallowed() {
    let fixture = Fixture {
        publisher: Arc::new(RecordingPublisher {
            fail_for_reason: Some("marking delete completed".to_string()),
            ..Default::default()
        }),
        ..all_succeeding()
    };
    let mut handle = fixture.handle(test_app("delete-gone"));

    let outcome = handle.reconcile_delete().await;

    assert!(outcome.is_ok());
    assert!(fixture.publisher.saw_reason("marking delete completed"));
}

#[tokio::test]
async fn test_delete_preserves_prior_deploy_change_set() {
    let fixture = all_succeeding();

    // Run a deploy first so the change-set is recorded
    let mut handle = fixture.handle(test_app("delete-preserve"));
    handle.reconcile_deploy().await.unwrap();
    let app_after_deploy = handle.app.clone();

    // Delete reports no metadata; the recorded change-set must survive
    let mut handle = fixture.handle(app_after_deploy);
    handle.reconcile_delete().await.unwrap();

    let deploy = handle.app.status.as_ref().unwrap().deploy.as_ref().unwrap();
    let kapp = deploy.kapp_deploy_status.as_ref().unwrap();
    assert_eq!(kapp.associated_resources.namespaces, vec!["default"]);
}

#[tokio::test]
async fn test_failed_delete_keeps_delete_failed_condition() {
    let fixture = Fixture {
        deployer: Arc::new(FakeDeployer {
            delete_result: failed_result("resource locked", 1),
            ..FakeDeployer::succeeding()
        }),
        ..all_succeeding()
    };
    let mut handle = fixture.handle(test_app("delete-fail"));

    handle.reconcile_delete().await.unwrap();

    let status = handle.app.status.as_ref().unwrap();
    assert_eq!(condition_types(status), vec![ConditionType::DeleteFailed]);
    assert_eq!(status.useful_error_message.as_deref(), Some("resource locked"));
    assert_eq!(status.consecutive_reconcile_failures, 1);
}
