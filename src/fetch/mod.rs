//! # Fetch Backends
//!
//! Pluggable fetch strategies behind the [`Fetcher`] contract. The vendir
//! backend is the reference implementation; the dispatcher selects a backend
//! once per reconcile from the resource's fetch spec.

mod vendir;

pub use vendir::VendirFetcher;

use crate::exec::CmdRunResult;
use async_trait::async_trait;
use std::path::Path;

/// Fetch contract: mirror declared sources into a destination directory,
/// plus cache invalidation used only by the delete pipeline.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch all declared sources into `dst`
    async fn fetch(&self, dst: &Path) -> CmdRunResult;

    /// Drop any cached artifacts keyed by the resource's stable cache
    /// identity
    async fn clear_cache(&self, cache_id: &str) -> anyhow::Result<()>;
}
