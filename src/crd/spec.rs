//! # App Resource Specification
//!
//! The `App` custom resource declares a fetch source, a templating engine,
//! and a deploy backend. The spec is read-only to the controller; only the
//! status subresource is written back.

use crate::crd::status::AppStatus;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// App Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: deploykit.io/v1alpha1
/// kind: App
/// metadata:
///   name: podinfo
///   namespace: default
/// spec:
///   syncPeriod: 5m
///   fetch:
///     - type: Git
///       url: https://github.com/stefanprodan/podinfo
///       ref: master
///   template:
///     type: HelmTemplate
///     path: charts/podinfo
///   deploy:
///     type: Kapp
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "App",
    group = "deploykit.io",
    version = "v1alpha1",
    namespaced,
    status = "AppStatus",
    printcolumn = r#"{"name":"Description", "type":"string", "jsonPath":".status.friendlyDescription"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    /// Sources to fetch, in order. All sources land under one staging
    /// directory; a single-source fetch is unwrapped to the staging root.
    pub fetch: Vec<FetchSource>,
    /// Templating engine applied to the fetched sources
    pub template: TemplateSpec,
    /// Deploy backend used to apply the rendered manifests
    #[serde(default)]
    pub deploy: DeploySpec,
    /// Steady-state reconcile interval (Kubernetes duration, e.g. "5m").
    /// Defaults to the controller-wide default when not set; the
    /// controller-wide minimum is always the floor.
    #[serde(default)]
    pub sync_period: Option<String>,
    /// Pause reconciliation. Status is marked observed-latest but no
    /// pipeline runs until unpaused.
    #[serde(default)]
    pub paused: bool,
    /// Cancel reconciliation. Same dispatcher branch as paused.
    #[serde(default)]
    pub canceled: bool,
}

/// One fetch source, routed through the vendir fetch backend
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum FetchSource {
    /// Clone a git repository at a ref
    Git(GitFetch),
    /// Download and unpack an archive over HTTP
    Http(HttpFetch),
    /// Materialize inline file contents
    Inline(InlineFetch),
}

impl FetchSource {
    /// Subdirectory under the staging root this source lands in
    pub fn sub_path(&self) -> Option<&str> {
        match self {
            FetchSource::Git(f) => f.sub_path.as_deref(),
            FetchSource::Http(f) => f.sub_path.as_deref(),
            FetchSource::Inline(f) => f.sub_path.as_deref(),
        }
    }
}

/// Git fetch source
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitFetch {
    /// Repository URL (https or ssh)
    pub url: String,
    /// Branch, tag, or commit SHA
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    /// Destination subdirectory under the staging root
    #[serde(default)]
    pub sub_path: Option<String>,
}

/// HTTP archive fetch source
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpFetch {
    /// Archive URL
    pub url: String,
    /// Expected SHA256 of the archive (optional)
    #[serde(default)]
    pub sha256: Option<String>,
    /// Destination subdirectory under the staging root
    #[serde(default)]
    pub sub_path: Option<String>,
}

/// Inline file contents fetch source
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InlineFetch {
    /// Relative path → file contents
    pub paths: BTreeMap<String, String>,
    /// Destination subdirectory under the staging root
    #[serde(default)]
    pub sub_path: Option<String>,
}

/// Templating engine selection. One variant per backend kind, selected once
/// at resource-load time.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum TemplateSpec {
    /// Render a helm chart with `helm template`
    HelmTemplate(HelmTemplateSpec),
    /// Render a kustomization with `kustomize build`
    Kustomize(KustomizeTemplateSpec),
}

/// Options for the helm template backend
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmTemplateSpec {
    /// Chart path relative to the fetched artifact root
    #[serde(default)]
    pub path: Option<String>,
    /// Release name (defaults to the App name)
    #[serde(default)]
    pub name: Option<String>,
    /// Release namespace (defaults to the App namespace)
    #[serde(default)]
    pub namespace: Option<String>,
    /// Values sources, applied in order via `--values`
    #[serde(default)]
    pub values_from: Vec<HelmValuesSource>,
    /// Pass the cluster's version via `--kube-version`
    #[serde(default)]
    pub kubernetes_version: bool,
}

/// One helm values source
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum HelmValuesSource {
    /// Inline values document
    Inline {
        /// Values content as a YAML mapping
        values: BTreeMap<String, serde_json::Value>,
    },
    /// Values file path relative to the fetched artifact root
    Path {
        /// Relative path; must stay inside the artifact directory
        path: String,
    },
    /// Read values from the templating stdin stream ("-")
    Stdin,
}

/// Options for the kustomize template backend
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KustomizeTemplateSpec {
    /// Kustomization path relative to the fetched artifact root
    #[serde(default)]
    pub path: Option<String>,
}

/// Deploy backend selection
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum DeploySpec {
    /// Apply manifests with `kapp deploy`
    Kapp(KappDeploySpec),
}

impl Default for DeploySpec {
    fn default() -> Self {
        DeploySpec::Kapp(KappDeploySpec::default())
    }
}

/// Options for the kapp deploy backend
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KappDeploySpec {
    /// kapp app name override (defaults to "<name>-ctrl")
    #[serde(default)]
    pub app_name: Option<String>,
    /// Extra raw options passed to `kapp deploy`
    #[serde(default)]
    pub raw_options: Vec<String>,
    /// Extra raw options passed to `kapp delete`
    #[serde(default)]
    pub delete_raw_options: Vec<String>,
}
