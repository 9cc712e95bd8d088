use std::collections::HashSet;
use std::time::Duration;

use tracing::{info, warn};

use crate::application::dto::sync::SweepOutcome;
use crate::application::error::{RemoteOp, SyncError};
use crate::application::ports::git_engine::GitEngine;
use crate::application::ports::hosting_api::HostingApi;
use crate::application::ports::login_provider::RemoteConfig;
use crate::application::use_cases::sync::{Ancestry, ancestry_of};
use crate::domain::refs;

/// Deletes a session branch once its commits are confirmed upstream.
///
/// Two guards, both fail-closed: a branch with any unpushed local commit is
/// never deleted, and a branch whose ancestry to primary cannot be resolved
/// within the horizon is left alone.
pub struct CleanupSweeper<'a> {
    pub engine: &'a dyn GitEngine,
    pub hosting: &'a dyn HostingApi,
    pub remote: &'a RemoteConfig,
    pub primary_branch: &'a str,
    pub ancestor_horizon: usize,
    pub network_timeout: Duration,
}

impl CleanupSweeper<'_> {
    pub async fn sweep(&self, branch: &str) -> Result<SweepOutcome, SyncError> {
        if branch == self.primary_branch {
            return Ok(SweepOutcome::NotApplicable);
        }

        // Unpushed cherries: local commits absent from the remote
        // counterpart within the horizon. A truncated remote history makes
        // commits look unpushed, which errs on the side of keeping the
        // branch.
        let local_log = self
            .engine
            .log(&refs::local_ref(branch), self.ancestor_horizon)
            .await
            .map_err(SyncError::from_engine)?;
        let remote_log = self
            .engine
            .log(&refs::remote_tracking_ref(branch), self.ancestor_horizon)
            .await
            .map_err(SyncError::from_engine)?;
        let remote_set: HashSet<_> = remote_log.iter().collect();
        let cherries = local_log
            .iter()
            .filter(|c| !remote_set.contains(c))
            .count();
        if cherries > 0 {
            info!(%branch, cherries, "session branch has unpushed commits, keeping");
            return Ok(SweepOutcome::HasUnpushedWork);
        }

        let Some(tip) = self
            .engine
            .resolve_ref(&refs::local_ref(branch))
            .await
            .map_err(SyncError::from_engine)?
        else {
            return Ok(SweepOutcome::StillDiverged);
        };

        let primary_ref = refs::remote_tracking_ref(self.primary_branch);
        match ancestry_of(self.engine, &tip, &primary_ref, self.ancestor_horizon).await? {
            Ancestry::Ancestor => self.delete(branch).await,
            Ancestry::Disjoint | Ancestry::Unknown => Ok(SweepOutcome::StillDiverged),
        }
    }

    async fn delete(&self, branch: &str) -> Result<SweepOutcome, SyncError> {
        // Remote copy first: if the hosting call fails we keep the local
        // branch and retry on the next sync instead of stranding a remote
        // branch nobody tracks anymore.
        match tokio::time::timeout(
            self.network_timeout,
            self.hosting.delete_remote_branch(self.remote, branch),
        )
        .await
        {
            Err(_) => {
                warn!(%branch, "remote branch deletion timed out");
                return Err(SyncError::Timeout(RemoteOp::Api));
            }
            Ok(Err(err)) => {
                warn!(%branch, error = %err, "remote branch deletion failed");
                return Ok(SweepOutcome::StillDiverged);
            }
            Ok(Ok(())) => {}
        }

        // A checked-out branch cannot be deleted, so move to primary first.
        // The branch tip is already contained in primary, so the checkout
        // does not change document content.
        self.engine
            .checkout_branch(self.primary_branch, true)
            .await
            .map_err(SyncError::from_engine)?;
        self.engine
            .delete_branch(branch)
            .await
            .map_err(SyncError::from_engine)?;
        self.engine
            .delete_ref(&refs::remote_tracking_ref(branch))
            .await
            .map_err(SyncError::from_engine)?;
        info!(%branch, "session branch landed upstream, deleted");
        Ok(SweepOutcome::Cleaned)
    }
}
