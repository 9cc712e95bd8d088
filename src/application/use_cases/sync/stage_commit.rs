use tracing::debug;

use crate::application::dto::sync::CommitOutcome;
use crate::application::error::SyncError;
use crate::application::ports::git_engine::{CommitAuthor, GitEngine};

/// Produces a commit only when real changes exist; idempotent no-op
/// otherwise.
pub struct CommitStager<'a> {
    pub engine: &'a dyn GitEngine,
    pub author: &'a CommitAuthor,
}

impl CommitStager<'_> {
    pub async fn stage_and_commit(&self, message: &str) -> Result<CommitOutcome, SyncError> {
        let changed = self
            .engine
            .status_changed_paths()
            .await
            .map_err(SyncError::from_engine)?;
        if changed.is_empty() {
            debug!("working tree clean, skipping commit");
            return Ok(CommitOutcome::NoOp);
        }

        self.engine
            .stage_all()
            .await
            .map_err(SyncError::from_engine)?;
        let id = self
            .engine
            .commit(message, self.author)
            .await
            .map_err(SyncError::from_engine)?;
        debug!(commit = %id, paths = changed.len(), "committed local changes");
        Ok(CommitOutcome::Committed(id))
    }
}
