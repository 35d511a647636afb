//! # Template Backends
//!
//! Pluggable templating strategies behind the [`Templater`] contract. Helm is
//! the reference implementation; kustomize is a second backend. A backend is
//! selected once per reconcile from the resource's template spec, never by
//! runtime type inspection.

mod helm;
mod kustomize;

pub use helm::HelmTemplater;
pub use kustomize::KustomizeTemplater;

use crate::exec::CmdRunResult;
use async_trait::async_trait;
use std::path::Path;

/// Templating contract. `template_dir` renders a directory of files;
/// `template_stream` renders piped input with `dir` providing context for
/// additional inputs (values files, overlays).
#[async_trait]
pub trait Templater: Send + Sync {
    async fn template_dir(&self, dir: &Path) -> CmdRunResult;

    async fn template_stream(&self, stdin: Vec<u8>, dir: &Path) -> CmdRunResult;
}
