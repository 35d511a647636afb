//! # Helm Template Backend
//!
//! Renders a chart with `helm template`. Values sources from the resource
//! spec are resolved to temporary scoped paths and passed via `--values` in
//! order; ambient cluster-service env vars are neutralized since pure
//! templating must not reach the cluster.

use crate::crd::{HelmTemplateSpec, HelmValuesSource};
use crate::exec::{CmdRunner, CmdRunResult, CmdSpec};
use crate::template::Templater;
use crate::workdir::scoped_path;
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// The `--values` path that reads from the templating stdin stream
const STDIN_PATH: &str = "-";

/// Renders helm charts via `helm template`
pub struct HelmTemplater {
    runner: Arc<dyn CmdRunner>,
    opts: HelmTemplateSpec,
    app_name: String,
    app_namespace: String,
    /// Cluster version passed via `--kube-version` when the spec asks for it
    kubernetes_version: Option<String>,
}

impl std::fmt::Debug for HelmTemplater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelmTemplater")
            .field("app_name", &self.app_name)
            .field("app_namespace", &self.app_namespace)
            .finish_non_exhaustive()
    }
}

impl HelmTemplater {
    pub fn new(
        runner: Arc<dyn CmdRunner>,
        opts: HelmTemplateSpec,
        app_name: impl Into<String>,
        app_namespace: impl Into<String>,
        kubernetes_version: Option<String>,
    ) -> Self {
        Self {
            runner,
            opts,
            app_name: app_name.into(),
            app_namespace: app_namespace.into(),
            kubernetes_version,
        }
    }

    /// Resolve values sources to `--values` paths. Inline values are written
    /// to temp files which must outlive the helm invocation.
    fn values_paths(
        &self,
        dir: &Path,
        has_stdin: bool,
    ) -> anyhow::Result<(Vec<String>, Vec<NamedTempFile>)> {
        let mut paths = Vec::new();
        let mut keep_alive = Vec::new();

        for source in &self.opts.values_from {
            match source {
                HelmValuesSource::Inline { values } => {
                    let mut file = NamedTempFile::with_prefix("helm-values-")?;
                    let yaml = serde_yaml::to_string(values)?;
                    file.write_all(yaml.as_bytes())?;
                    file.flush()?;
                    paths.push(file.path().display().to_string());
                    keep_alive.push(file);
                }
                HelmValuesSource::Path { path } => {
                    let resolved = scoped_path(dir, path)?;
                    paths.push(resolved.display().to_string());
                }
                HelmValuesSource::Stdin => {
                    if !has_stdin {
                        return Err(anyhow::anyhow!(
                            "Expected stdin to be available when using it as a values path, but was not"
                        ));
                    }
                    paths.push(STDIN_PATH.to_string());
                }
            }
        }

        Ok((paths, keep_alive))
    }

    fn build_args(&self, dir: &Path, has_stdin: bool) -> anyhow::Result<(Vec<String>, Vec<NamedTempFile>)> {
        let chart_path = match &self.opts.path {
            Some(sub) => scoped_path(dir, sub)?,
            None => dir.to_path_buf(),
        };

        let name = self.opts.name.as_deref().unwrap_or(&self.app_name);
        let namespace = self
            .opts
            .namespace
            .as_deref()
            .unwrap_or(&self.app_namespace);

        let mut args = vec![
            "template".to_string(),
            name.to_string(),
            chart_path.display().to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--include-crds".to_string(),
        ];

        if self.opts.kubernetes_version {
            let version = self.kubernetes_version.as_ref().ok_or_else(|| {
                anyhow::anyhow!("Unable to get kubernetes version during helm template")
            })?;
            args.push("--kube-version".to_string());
            args.push(version.clone());
        }

        let (values_paths, keep_alive) = self.values_paths(dir, has_stdin)?;
        for path in values_paths {
            args.push("--values".to_string());
            args.push(path);
        }

        Ok((args, keep_alive))
    }

    async fn template(&self, dir: &Path, stdin: Option<Vec<u8>>) -> CmdRunResult {
        let (args, _values_files) = match self.build_args(dir, stdin.is_some()) {
            Ok(built) => built,
            Err(e) => return CmdRunResult::with_error(e),
        };

        let mut spec = CmdSpec::new("helm").args(args).isolate_cluster_env();
        if let Some(bytes) = stdin {
            spec = spec.stdin(bytes);
        }

        let mut result = self.runner.run(spec).await;
        result.attach_error_context("Templating helm chart");
        result
    }
}

#[async_trait]
impl Templater for HelmTemplater {
    async fn template_dir(&self, dir: &Path) -> CmdRunResult {
        self.template(dir, None).await
    }

    async fn template_stream(&self, stdin: Vec<u8>, dir: &Path) -> CmdRunResult {
        self.template(dir, Some(stdin)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::LocalCmdRunner;
    use std::collections::BTreeMap;

    fn templater(opts: HelmTemplateSpec, kube_version: Option<String>) -> HelmTemplater {
        HelmTemplater::new(
            Arc::new(LocalCmdRunner),
            opts,
            "podinfo",
            "default",
            kube_version,
        )
    }

    #[test]
    fn test_default_args_use_app_identity() {
        let t = templater(HelmTemplateSpec::default(), None);
        let (args, _files) = t.build_args(Path::new("/work"), false).unwrap();
        assert_eq!(
            args,
            vec![
                "template",
                "podinfo",
                "/work",
                "--namespace",
                "default",
                "--include-crds"
            ]
        );
    }

    #[test]
    fn test_overrides_and_chart_subpath() {
        let t = templater(
            HelmTemplateSpec {
                path: Some("charts/podinfo".to_string()),
                name: Some("release-x".to_string()),
                namespace: Some("prod".to_string()),
                ..HelmTemplateSpec::default()
            },
            None,
        );
        let (args, _files) = t.build_args(Path::new("/work"), false).unwrap();
        assert_eq!(args[1], "release-x");
        assert_eq!(args[2], "/work/charts/podinfo");
        assert_eq!(args[4], "prod");
    }

    #[test]
    fn test_chart_subpath_cannot_escape_artifact_dir() {
        let t = templater(
            HelmTemplateSpec {
                path: Some("../outside".to_string()),
                ..HelmTemplateSpec::default()
            },
            None,
        );
        assert!(t.build_args(Path::new("/work"), false).is_err());
    }

    #[test]
    fn test_kube_version_flag_requires_resolved_version() {
        let opts = HelmTemplateSpec {
            kubernetes_version: true,
            ..HelmTemplateSpec::default()
        };

        let with_version = templater(opts.clone(), Some("1.30.0".to_string()));
        let (args, _files) = with_version.build_args(Path::new("/work"), false).unwrap();
        assert!(args.contains(&"--kube-version".to_string()));
        assert!(args.contains(&"1.30.0".to_string()));

        let without_version = templater(opts, None);
        assert!(without_version.build_args(Path::new("/work"), false).is_err());
    }

    #[test]
    fn test_inline_values_become_temp_files() {
        let mut values = BTreeMap::new();
        values.insert("replicas".to_string(), serde_json::json!(3));
        let t = templater(
            HelmTemplateSpec {
                values_from: vec![HelmValuesSource::Inline { values }],
                ..HelmTemplateSpec::default()
            },
            None,
        );
        let (args, files) = t.build_args(Path::new("/work"), false).unwrap();
        assert_eq!(files.len(), 1);
        let values_idx = args.iter().position(|a| a == "--values").unwrap();
        let written = std::fs::read_to_string(&args[values_idx + 1]).unwrap();
        assert!(written.contains("replicas: 3"));
    }

    #[test]
    fn test_stdin_values_path_requires_stdin() {
        let t = templater(
            HelmTemplateSpec {
                values_from: vec![HelmValuesSource::Stdin],
                ..HelmTemplateSpec::default()
            },
            None,
        );
        assert!(t.build_args(Path::new("/work"), false).is_err());

        let (args, _files) = t.build_args(Path::new("/work"), true).unwrap();
        assert!(args.contains(&STDIN_PATH.to_string()));
    }
}
