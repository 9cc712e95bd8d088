use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::application::dto::sync::PushOutcome;
use crate::application::error::{RemoteOp, SyncError};
use crate::application::ports::git_engine::{GitEngine, GitEngineError};
use crate::application::ports::hosting_api::HostingApi;
use crate::application::ports::login_provider::RemoteConfig;
use crate::domain::refs::{self, session_branch_name};

/// Pushes the current branch, and on a rejected non-fast-forward push
/// quarantines the local commits onto a freshly named session branch instead
/// of risking remote history.
///
/// Primary's history is append-only from this protocol's perspective: the
/// original push is never retried and never forced.
pub struct DivergenceHandler<'a> {
    pub engine: &'a dyn GitEngine,
    pub hosting: &'a dyn HostingApi,
    pub remote: &'a RemoteConfig,
    pub primary_branch: &'a str,
    pub network_timeout: Duration,
}

impl DivergenceHandler<'_> {
    pub async fn push_or_diverge(&self, branch: &str) -> PushOutcome {
        let local = match self.engine.resolve_ref(&refs::local_ref(branch)).await {
            Ok(v) => v,
            Err(err) => return PushOutcome::Failed(SyncError::from_engine(err)),
        };
        let remote_tip = match self
            .engine
            .resolve_ref(&refs::remote_tracking_ref(branch))
            .await
        {
            Ok(v) => v,
            Err(err) => return PushOutcome::Failed(SyncError::from_engine(err)),
        };

        // Tip comparison exists purely to avoid a noisy no-op network call.
        let Some(local) = local else {
            return PushOutcome::Skipped;
        };
        if remote_tip.as_ref() == Some(&local) {
            return PushOutcome::Skipped;
        }

        match self.timed_push(branch, false).await {
            Ok(()) => {
                info!(%branch, commit = %local, "pushed");
                PushOutcome::Pushed
            }
            Err(PushFailure::NonFastForward) => self.diverge(branch).await,
            Err(PushFailure::Other(err)) => PushOutcome::Failed(err),
        }
    }

    /// Relocate local-only commits onto a timestamp-named session branch,
    /// push it with upstream tracking, and request a pull request against
    /// primary. A failed PR request is logged but leaves the divergence
    /// handled: the branch is durable upstream either way.
    async fn diverge(&self, branch: &str) -> PushOutcome {
        let session = session_branch_name(branch, Utc::now());
        info!(%branch, %session, "push rejected as non-fast-forward, diverging");

        if let Err(err) = self.engine.create_branch(&session, true).await {
            return PushOutcome::Failed(SyncError::from_engine(err));
        }
        match self.timed_push(&session, true).await {
            Ok(()) => {}
            Err(PushFailure::NonFastForward) => {
                // A freshly named branch cannot trail its remote counterpart.
                return PushOutcome::Failed(SyncError::network(
                    RemoteOp::Push,
                    "session branch push rejected",
                ));
            }
            Err(PushFailure::Other(err)) => return PushOutcome::Failed(err),
        }

        match self
            .hosting
            .ensure_pull_request(self.remote, &session, self.primary_branch)
            .await
        {
            Ok(pr) => info!(number = pr.number, url = %pr.url, "pull request ready"),
            Err(err) => warn!(%session, error = %err, "failed to request pull request"),
        }
        PushOutcome::Diverged(session)
    }

    async fn timed_push(&self, branch: &str, set_upstream: bool) -> Result<(), PushFailure> {
        match tokio::time::timeout(
            self.network_timeout,
            self.engine.push(self.remote, branch, set_upstream),
        )
        .await
        {
            Err(_) => Err(PushFailure::Other(SyncError::Timeout(RemoteOp::Push))),
            Ok(Err(GitEngineError::NonFastForward)) => Err(PushFailure::NonFastForward),
            Ok(Err(err)) => Err(PushFailure::Other(SyncError::from_remote(
                RemoteOp::Push,
                err,
            ))),
            Ok(Ok(())) => Ok(()),
        }
    }
}

enum PushFailure {
    NonFastForward,
    Other(SyncError),
}
