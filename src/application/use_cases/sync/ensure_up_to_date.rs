use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::info;

use crate::application::dto::sync::UpdateOutcome;
use crate::application::error::{RemoteOp, SyncError};
use crate::application::ports::git_engine::GitEngine;
use crate::application::ports::login_provider::RemoteConfig;

type UpdateFuture = Shared<BoxFuture<'static, Result<UpdateOutcome, SyncError>>>;

/// Owns the single local clone's lifecycle.
///
/// Concurrent callers of [`ensure_up_to_date`](Self::ensure_up_to_date) are
/// coalesced onto one underlying clone-or-fetch operation through a shared
/// in-flight future; every caller observes the same result. This is what
/// keeps a page-load trigger and a user-edit trigger from racing two
/// checkouts against the same working tree.
pub struct RepositorySession {
    engine: Arc<dyn GitEngine>,
    primary_branch: String,
    network_timeout: Duration,
    in_flight: Mutex<Option<UpdateFuture>>,
}

impl RepositorySession {
    pub fn new(
        engine: Arc<dyn GitEngine>,
        primary_branch: impl Into<String>,
        network_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            primary_branch: primary_branch.into(),
            network_timeout,
            in_flight: Mutex::new(None),
        }
    }

    /// Clone the repository if no local clone exists, otherwise fetch the
    /// primary branch. Idempotent and safe to call concurrently.
    ///
    /// Errors surface once and are not retried automatically; the next
    /// explicit sync starts a fresh attempt.
    pub async fn ensure_up_to_date(
        &self,
        remote: &RemoteConfig,
    ) -> Result<UpdateOutcome, SyncError> {
        let fut = {
            let mut slot = self
                .in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match slot.as_ref() {
                // Join the operation already in flight.
                Some(existing) if existing.peek().is_none() => existing.clone(),
                _ => {
                    let fut = Self::update(
                        self.engine.clone(),
                        remote.clone(),
                        self.primary_branch.clone(),
                        self.network_timeout,
                    )
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    async fn update(
        engine: Arc<dyn GitEngine>,
        remote: RemoteConfig,
        branch: String,
        network_timeout: Duration,
    ) -> Result<UpdateOutcome, SyncError> {
        let cloned = engine.is_cloned().await.map_err(SyncError::from_engine)?;
        if !cloned {
            info!(url = %remote.repo_url, %branch, "no local clone, cloning");
            match tokio::time::timeout(network_timeout, engine.clone_repo(&remote, &branch)).await
            {
                Err(_) => Err(SyncError::Timeout(RemoteOp::Clone)),
                Ok(Err(err)) => Err(SyncError::from_remote(RemoteOp::Clone, err)),
                Ok(Ok(())) => Ok(UpdateOutcome::Cloned),
            }
        } else {
            match tokio::time::timeout(network_timeout, engine.fetch(&remote, &branch)).await {
                Err(_) => Err(SyncError::Timeout(RemoteOp::Fetch)),
                Ok(Err(err)) => Err(SyncError::from_remote(RemoteOp::Fetch, err)),
                Ok(Ok(())) => Ok(UpdateOutcome::Fetched),
            }
        }
    }
}
