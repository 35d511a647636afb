//! # Kustomize Template Backend
//!
//! Renders a kustomization with `kustomize build`. Supports overlays,
//! patches, and generators; does not accept piped input (kustomize reads
//! from the filesystem only).

use crate::crd::KustomizeTemplateSpec;
use crate::exec::{CmdRunner, CmdRunResult, CmdSpec};
use crate::template::Templater;
use crate::workdir::scoped_path;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Renders kustomizations via `kustomize build`
pub struct KustomizeTemplater {
    runner: Arc<dyn CmdRunner>,
    opts: KustomizeTemplateSpec,
}

impl std::fmt::Debug for KustomizeTemplater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KustomizeTemplater")
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

impl KustomizeTemplater {
    pub fn new(runner: Arc<dyn CmdRunner>, opts: KustomizeTemplateSpec) -> Self {
        Self { runner, opts }
    }
}

#[async_trait]
impl Templater for KustomizeTemplater {
    async fn template_dir(&self, dir: &Path) -> CmdRunResult {
        let build_path = match &self.opts.path {
            Some(sub) => match scoped_path(dir, sub) {
                Ok(path) => path,
                Err(e) => return CmdRunResult::with_error(e),
            },
            None => dir.to_path_buf(),
        };

        let mut result = self
            .runner
            .run(
                CmdSpec::new("kustomize")
                    .arg("build")
                    .arg(build_path.display().to_string())
                    .isolate_cluster_env(),
            )
            .await;
        result.attach_error_context("Building kustomization");
        result
    }

    async fn template_stream(&self, _stdin: Vec<u8>, _dir: &Path) -> CmdRunResult {
        CmdRunResult::with_error("Kustomize templating does not accept piped input")
    }
}
