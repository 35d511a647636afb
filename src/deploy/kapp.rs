//! # Kapp Deploy Backend
//!
//! Applies rendered manifests with `kapp deploy`, removes them with
//! `kapp delete`, and inspects live objects with `kapp inspect`. Deploy asks
//! kapp for an app-metadata file and parses it into [`DeployMetadata`] so the
//! status can record which group-kinds and namespaces were touched.

use crate::crd::KappDeploySpec;
use crate::deploy::{DeployMetadata, Deployer};
use crate::exec::{CmdRunner, CmdRunResult, CmdSpec};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Deploys manifests via the kapp CLI
pub struct KappDeployer {
    runner: Arc<dyn CmdRunner>,
    opts: KappDeploySpec,
    /// kapp app name; defaults to "<resource name>-ctrl"
    app_name: String,
    namespace: String,
}

impl std::fmt::Debug for KappDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KappDeployer")
            .field("app_name", &self.app_name)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl KappDeployer {
    pub fn new(
        runner: Arc<dyn CmdRunner>,
        opts: KappDeploySpec,
        resource_name: &str,
        namespace: impl Into<String>,
    ) -> Self {
        let app_name = opts
            .app_name
            .clone()
            .unwrap_or_else(|| format!("{resource_name}-ctrl"));
        Self {
            runner,
            opts,
            app_name,
            namespace: namespace.into(),
        }
    }

    fn base_args(&self, verb: &str) -> Vec<String> {
        vec![
            verb.to_string(),
            "-a".to_string(),
            self.app_name.clone(),
            "-n".to_string(),
            self.namespace.clone(),
        ]
    }
}

#[async_trait]
impl Deployer for KappDeployer {
    async fn deploy(&self, manifests: Vec<u8>) -> (CmdRunResult, Option<DeployMetadata>) {
        let meta_file = match tempfile::NamedTempFile::with_prefix("kapp-meta-") {
            Ok(file) => file,
            Err(e) => {
                return (
                    CmdRunResult::with_error(format!("Creating metadata file: {e}")),
                    None,
                );
            }
        };
        let meta_path = meta_file.path().display().to_string();

        let mut args = self.base_args("deploy");
        args.extend([
            "-f".to_string(),
            "-".to_string(),
            "--yes".to_string(),
            "--app-metadata-file-output".to_string(),
            meta_path,
        ]);
        args.extend(self.opts.raw_options.iter().cloned());

        let mut result = self
            .runner
            .run(CmdSpec::new("kapp").args(args).stdin(manifests))
            .await;
        result.attach_error_context("Deploying");

        // Metadata is best-effort; kapp may not have written the file when
        // the deploy fails early
        let metadata = match std::fs::read(meta_file.path()) {
            Ok(bytes) if !bytes.is_empty() => match serde_json::from_slice(&bytes) {
                Ok(meta) => Some(meta),
                Err(e) => {
                    warn!("Failed to parse kapp app metadata: {}", e);
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                debug!("No kapp app metadata written: {}", e);
                None
            }
        };

        (result, metadata)
    }

    async fn delete(&self) -> CmdRunResult {
        let mut args = self.base_args("delete");
        args.push("--yes".to_string());
        args.extend(self.opts.delete_raw_options.iter().cloned());

        let mut result = self.runner.run(CmdSpec::new("kapp").args(args)).await;
        result.attach_error_context("Deleting");
        result
    }

    async fn inspect(&self) -> CmdRunResult {
        let mut args = self.base_args("inspect");
        args.push("--tree".to_string());

        let mut result = self.runner.run(CmdSpec::new("kapp").args(args)).await;
        result.attach_error_context("Inspecting");
        result
    }
}
