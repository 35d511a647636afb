//! # Vendir Fetch Backend
//!
//! Translates the App's fetch sources into a vendir config and runs
//! `vendir sync` with the config piped over stdin. All sources land under one
//! destination directory; vendir owns the per-source subdirectories.

use crate::crd::FetchSource;
use crate::exec::{CmdRunner, CmdRunResult, CmdSpec};
use crate::fetch::Fetcher;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Subdirectory vendir syncs into; a single unnamed source is unwrapped to
/// this path directly
const VENDOR_DIR: &str = ".";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VendirConf {
    api_version: String,
    kind: String,
    directories: Vec<VendirDirectory>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VendirDirectory {
    path: String,
    contents: Vec<VendirContents>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VendirContents {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    git: Option<VendirGit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http: Option<VendirHttp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline: Option<VendirInline>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VendirGit {
    url: String,
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VendirHttp {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VendirInline {
    paths: std::collections::BTreeMap<String, String>,
}

/// Fetches App sources by shelling out to `vendir sync`
pub struct VendirFetcher {
    runner: Arc<dyn CmdRunner>,
    sources: Vec<FetchSource>,
    cache_dir: PathBuf,
}

impl std::fmt::Debug for VendirFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendirFetcher")
            .field("sources", &self.sources.len())
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl VendirFetcher {
    pub fn new(
        runner: Arc<dyn CmdRunner>,
        sources: Vec<FetchSource>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            sources,
            cache_dir: cache_dir.into(),
        }
    }

    fn build_conf(&self) -> VendirConf {
        let contents = self
            .sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                // Unnamed sources of a single-source fetch land at the root;
                // otherwise each source gets a stable indexed subdirectory
                let path = source
                    .sub_path()
                    .map(String::from)
                    .unwrap_or_else(|| {
                        if self.sources.len() == 1 {
                            VENDOR_DIR.to_string()
                        } else {
                            format!("{i}")
                        }
                    });

                match source {
                    FetchSource::Git(git) => VendirContents {
                        path,
                        git: Some(VendirGit {
                            url: git.url.clone(),
                            git_ref: git.git_ref.clone().unwrap_or_else(|| "HEAD".to_string()),
                        }),
                        http: None,
                        inline: None,
                    },
                    FetchSource::Http(http) => VendirContents {
                        path,
                        git: None,
                        http: Some(VendirHttp {
                            url: http.url.clone(),
                            sha256: http.sha256.clone(),
                        }),
                        inline: None,
                    },
                    FetchSource::Inline(inline) => VendirContents {
                        path,
                        git: None,
                        http: None,
                        inline: Some(VendirInline {
                            paths: inline.paths.clone(),
                        }),
                    },
                }
            })
            .collect();

        VendirConf {
            api_version: "vendir.k14s.io/v1alpha1".to_string(),
            kind: "Config".to_string(),
            directories: vec![VendirDirectory {
                path: VENDOR_DIR.to_string(),
                contents,
            }],
        }
    }

    /// Directory holding cached artifacts for one resource identity
    fn cache_path(&self, cache_id: &str) -> PathBuf {
        // cache_id is "namespace/name"; flatten to a single path component
        self.cache_dir.join(cache_id.replace('/', "-"))
    }
}

#[async_trait]
impl Fetcher for VendirFetcher {
    async fn fetch(&self, dst: &Path) -> CmdRunResult {
        let conf = self.build_conf();
        let conf_yaml = match serde_yaml::to_string(&conf) {
            Ok(yaml) => yaml,
            Err(e) => {
                return CmdRunResult::with_error(format!("Serializing vendir config: {e}"));
            }
        };

        debug!("Running vendir sync into {}", dst.display());

        let mut result = self
            .runner
            .run(
                CmdSpec::new("vendir")
                    .args(["sync", "-f", "-"])
                    .cwd(dst)
                    .stdin(conf_yaml.into_bytes()),
            )
            .await;
        result.attach_error_context("Fetching resources");
        result
    }

    async fn clear_cache(&self, cache_id: &str) -> anyhow::Result<()> {
        let path = self.cache_path(cache_id);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::anyhow!(
                "Clearing fetch cache at {}: {e}",
                path.display()
            )),
        }
    }
}
