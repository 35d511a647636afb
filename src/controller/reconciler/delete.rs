//! # Delete Pipeline
//!
//! Runs when a resource carries a deletion marker: mark deleting, invalidate
//! cached fetch artifacts, remove the deployed cluster objects, mark
//! completed. The final status write races the resource's own removal from
//! storage and is expected to fail, so it is logged and swallowed.

use crate::controller::reconciler::app::AppHandle;
use anyhow::Result;
use tracing::debug;

impl AppHandle {
    pub async fn reconcile_delete(&mut self) -> Result<()> {
        self.mark_observed_latest();
        self.set_deleting();

        self.update_status("marking deleting").await?;

        // Aborts the pipeline; delete-completed is never reached and the
        // Deleting condition stays active for the retry
        self.fetcher.clear_cache(&self.cache_id()).await?;

        self.reset_last_deploy_started_at();

        let result = self.deployer.delete().await;
        let result = self.update_last_deploy(result).await;

        self.set_delete_completed(&result);

        // The resource record is usually gone by now
        if let Err(e) = self.update_status("marking delete completed").await {
            debug!(error = %e, "Ignoring status write after delete completion");
        }

        Ok(())
    }
}
