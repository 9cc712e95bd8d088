use tracing::{info, warn};

use crate::application::dto::sync::Reconciliation;
use crate::application::error::SyncError;
use crate::application::ports::git_engine::GitEngine;
use crate::application::ports::hosting_api::HostingApi;
use crate::application::ports::login_provider::RemoteConfig;
use crate::application::use_cases::sync::{Ancestry, ancestry_of};
use crate::domain::refs::{self, CommitId, HEAD};

/// Compares local HEAD against the fetched primary tip and adopts the remote
/// state when that is provably lossless.
///
/// The tie-break rule is ancestry, never timestamps: the only automatic
/// operation is adopting a state that is a strict superset of local history.
pub struct FastForwardReconciler<'a> {
    pub engine: &'a dyn GitEngine,
    pub hosting: &'a dyn HostingApi,
    pub remote: &'a RemoteConfig,
    pub primary_branch: &'a str,
    pub ancestor_horizon: usize,
}

impl FastForwardReconciler<'_> {
    pub async fn reconcile(&self) -> Result<Reconciliation, SyncError> {
        let local = self
            .engine
            .resolve_ref(HEAD)
            .await
            .map_err(SyncError::from_engine)?;
        let remote_ref = refs::remote_tracking_ref(self.primary_branch);
        let Some(remote_tip) = self
            .engine
            .resolve_ref(&remote_ref)
            .await
            .map_err(SyncError::from_engine)?
        else {
            // Nothing fetched yet (empty remote).
            return Ok(Reconciliation::Unchanged);
        };

        let Some(local) = local else {
            // Unborn HEAD with a fetched remote tip: adopting it cannot lose
            // anything because there is no local history at all.
            self.adopt(&remote_tip, None).await?;
            return Ok(Reconciliation::FastForwarded);
        };

        if local == remote_tip {
            return Ok(Reconciliation::Unchanged);
        }

        match ancestry_of(self.engine, &local, &remote_ref, self.ancestor_horizon).await? {
            Ancestry::Ancestor => {
                let checked_out = self
                    .engine
                    .current_branch()
                    .await
                    .map_err(SyncError::from_engine)?;
                let stale = (checked_out != self.primary_branch).then_some(checked_out);
                self.adopt(&remote_tip, stale).await?;
                Ok(Reconciliation::FastForwarded)
            }
            Ancestry::Unknown => {
                warn!(
                    horizon = self.ancestor_horizon,
                    "ancestry scan exceeded horizon, refusing to reset"
                );
                Ok(Reconciliation::AncestryUnknown)
            }
            Ancestry::Disjoint => Ok(Reconciliation::LocalAhead),
        }
    }

    /// Fast-forward-only reset: overwrite the primary ref to the fetched tip
    /// and force-checkout primary. Never fabricates a merge commit, never
    /// discards remote history.
    async fn adopt(&self, tip: &CommitId, stale_branch: Option<String>) -> Result<(), SyncError> {
        self.engine
            .write_ref(&refs::local_ref(self.primary_branch), tip)
            .await
            .map_err(SyncError::from_engine)?;
        self.engine
            .checkout_branch(self.primary_branch, true)
            .await
            .map_err(SyncError::from_engine)?;
        info!(branch = self.primary_branch, %tip, "fast-forwarded to remote tip");

        // The branch that was checked out is now fully contained in primary:
        // its tip was an ancestor of the adopted commit. Deleting it is how
        // stale per-device session branches self-clean once they land
        // upstream. Remote copy goes first so a failure leaves the local ref
        // to retry with.
        if let Some(stale) = stale_branch {
            if let Err(err) = self
                .hosting
                .delete_remote_branch(self.remote, &stale)
                .await
            {
                warn!(branch = %stale, error = %err, "failed to delete remote copy of stale branch");
                return Ok(());
            }
            self.engine
                .delete_branch(&stale)
                .await
                .map_err(SyncError::from_engine)?;
            self.engine
                .delete_ref(&refs::remote_tracking_ref(&stale))
                .await
                .map_err(SyncError::from_engine)?;
            info!(branch = %stale, "deleted stale branch contained in primary");
        }
        Ok(())
    }
}
