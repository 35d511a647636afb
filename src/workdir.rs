//! # Staging Directories
//!
//! Scoped working storage for pipeline runs. A staging directory holds the
//! fetched and templated artifacts for exactly one pipeline invocation and is
//! removed on every exit path, including early returns on stage failure.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

/// A staging directory released when dropped
#[derive(Debug)]
pub struct StagingDir {
    inner: TempDir,
}

impl StagingDir {
    /// Create a fresh staging directory with the given purpose prefix
    pub fn create(prefix: &str) -> Result<Self> {
        let inner = tempfile::Builder::new()
            .prefix(&format!("{prefix}-"))
            .tempdir()
            .context("Creating staging directory")?;
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }
}

/// Resolve `sub` against `root`, rejecting anything that escapes `root`.
/// Template chart paths come from the resource spec and must not be able to
/// reference files outside the fetched artifact directory.
pub fn scoped_path(root: &Path, sub: &str) -> Result<PathBuf> {
    let mut resolved = root.to_path_buf();
    for component in Path::new(sub).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(anyhow::anyhow!(
                    "Path '{sub}' must stay within the artifact directory"
                ));
            }
        }
    }
    Ok(resolved)
}
