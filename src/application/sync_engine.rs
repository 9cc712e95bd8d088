use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::application::dto::sync::{
    CommitOutcome, PushOutcome, Reconciliation, SweepOutcome, SyncLogEntry, SyncPhase, SyncReport,
    UpdateOutcome,
};
use crate::application::error::SyncError;
use crate::application::ports::git_engine::{CommitAuthor, GitEngine};
use crate::application::ports::hosting_api::HostingApi;
use crate::application::ports::login_provider::{LoginProvider, RemoteConfig};
use crate::application::ports::sync_observer::SyncObserver;
use crate::application::sync_log::SyncLog;
use crate::application::use_cases::sync::cleanup_sweep::CleanupSweeper;
use crate::application::use_cases::sync::ensure_up_to_date::RepositorySession;
use crate::application::use_cases::sync::push_divergence::DivergenceHandler;
use crate::application::use_cases::sync::reconcile::FastForwardReconciler;
use crate::application::use_cases::sync::stage_commit::CommitStager;
use crate::domain::refs::is_session_branch;

/// Default JSON content for a repository that has never held the document.
const EMPTY_DOCUMENT: &[u8] = b"{}\n";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// The single authoritative branch all clients converge on.
    pub primary_branch: String,
    /// Path of the shared JSON document, relative to the repository root.
    /// The engine never interprets its contents.
    pub document_path: String,
    /// Bounded depth for ancestry scans. Beyond it ancestry is unknown and
    /// the protocol fails closed. Tunable; the historical value is 100.
    pub ancestor_horizon: usize,
    /// Cap on every individual remote operation.
    pub network_timeout: Duration,
    /// Ring-buffer bound for the sync log.
    pub log_capacity: usize,
    pub author: CommitAuthor,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            primary_branch: "main".to_string(),
            document_path: "document.json".to_string(),
            ancestor_horizon: 100,
            network_timeout: Duration::from_secs(30),
            log_capacity: 512,
            author: CommitAuthor::default(),
        }
    }
}

/// Top-level state machine sequencing one sync run:
/// commit pending edits, clone-or-fetch, fast-forward reconcile, push (or
/// quarantine onto a session branch), sweep, refresh the indicator.
///
/// All state lives on this struct; there are no module-level singletons. An
/// entire run is serialised behind one async mutex, so a second sync request
/// arriving mid-run queues behind the first instead of interleaving
/// working-tree operations.
pub struct SyncEngine {
    engine: Arc<dyn GitEngine>,
    hosting: Arc<dyn HostingApi>,
    login: Arc<dyn LoginProvider>,
    observer: Arc<dyn SyncObserver>,
    session: RepositorySession,
    options: SyncOptions,
    run_lock: tokio::sync::Mutex<()>,
    log: Mutex<SyncLog>,
}

impl SyncEngine {
    pub fn new(
        engine: Arc<dyn GitEngine>,
        hosting: Arc<dyn HostingApi>,
        login: Arc<dyn LoginProvider>,
        observer: Arc<dyn SyncObserver>,
        options: SyncOptions,
    ) -> Self {
        let session = RepositorySession::new(
            engine.clone(),
            options.primary_branch.clone(),
            options.network_timeout,
        );
        Self {
            engine,
            hosting,
            login,
            observer,
            session,
            log: Mutex::new(SyncLog::new(options.log_capacity)),
            options,
            run_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The session is exposed so callers that only need the clone-or-fetch
    /// step (e.g. a read-only page load) can share its in-flight coalescing.
    pub fn session(&self) -> &RepositorySession {
        &self.session
    }

    pub fn log_entries(&self) -> Vec<SyncLogEntry> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries()
    }

    /// Run the full protocol once. Runs to completion or failure; there is
    /// no cancellation and no automatic retry. The caller retries by calling
    /// again, which also re-resolves the login token.
    pub async fn sync(&self, message: &str) -> Result<SyncReport, SyncError> {
        let _guard = self.run_lock.lock().await;
        let result = self.run(message).await;
        self.observer.phase(SyncPhase::Idle);
        match &result {
            Ok(report) => info!(?report, "sync run finished"),
            Err(err) => {
                self.observer.status(&format!("sync failed: {err}"));
                error!(error = %err, "sync run failed");
            }
        }
        result
    }

    async fn run(&self, message: &str) -> Result<SyncReport, SyncError> {
        // No login means every remote-touching step below would fail the
        // same way; fail the run fast instead of retry-storming the remote.
        let remote = self.login.remote_config().await?;

        // 1. Capture pending local edits before any comparison with the
        // remote, so the reconciler's force-checkout can never discard them.
        self.observer.phase(SyncPhase::Committing);
        self.observer.status("committing local changes");
        let mut commit = self.commit_pending(message).await;

        // 2. Clone-or-fetch. Failure here halts the run: every later step
        // needs the fetched remote state.
        self.observer.phase(SyncPhase::Updating);
        self.observer.status("updating local repository");
        let update = self
            .session
            .ensure_up_to_date(&remote)
            .await
            .inspect_err(|err| self.observer.status(&format!("update failed: {err}")))?;

        // Like the stager, a failed document bootstrap is reported and
        // retried on the next cycle; it must not keep reconcile/push/sweep
        // from running.
        match self.ensure_document().await {
            Ok(Some(initial)) if commit == CommitOutcome::NoOp => commit = initial,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "document bootstrap failed, will retry next sync");
            }
        }

        // 3. Adopt the remote tip when it is a strict superset of local
        // history.
        self.observer.phase(SyncPhase::Reconciling);
        self.observer.status("reconciling with remote");
        let reconciler = FastForwardReconciler {
            engine: self.engine.as_ref(),
            hosting: self.hosting.as_ref(),
            remote: &remote,
            primary_branch: &self.options.primary_branch,
            ancestor_horizon: self.options.ancestor_horizon,
        };
        let reconciliation = match reconciler.reconcile().await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(error = %err, "reconcile step failed");
                Reconciliation::Unchanged
            }
        };

        // Coalesced data-reload notification: at most one per run no matter
        // which sub-step changed the tree.
        let data_changed = matches!(update, UpdateOutcome::Cloned)
            || matches!(reconciliation, Reconciliation::FastForwarded);
        if data_changed {
            self.observer.data_changed();
        }

        // 4. Push, or quarantine onto a session branch.
        self.observer.phase(SyncPhase::Pushing);
        self.observer.status("pushing local commits");
        let branch = self.current_branch().await?;
        let handler = DivergenceHandler {
            engine: self.engine.as_ref(),
            hosting: self.hosting.as_ref(),
            remote: &remote,
            primary_branch: &self.options.primary_branch,
            network_timeout: self.options.network_timeout,
        };
        let push = handler.push_or_diverge(&branch).await;
        match &push {
            PushOutcome::Diverged(session) => {
                self.observer.divergence(Some(session));
                self.observer
                    .status(&format!("local work quarantined on {session}"));
                self.record_tip(session, "diverged onto session branch").await;
            }
            PushOutcome::Pushed => self.record_tip(&branch, message).await,
            PushOutcome::Failed(err) => {
                warn!(error = %err, %branch, "push failed");
                self.observer.status(&format!("push failed: {err}"));
            }
            PushOutcome::Skipped => {}
        }

        // 5. Sweep the session branch if one is checked out.
        let branch = self.current_branch().await?;
        let sweep = if branch != self.options.primary_branch {
            self.observer.phase(SyncPhase::Sweeping);
            self.observer.status("checking whether session branch landed");
            let sweeper = CleanupSweeper {
                engine: self.engine.as_ref(),
                hosting: self.hosting.as_ref(),
                remote: &remote,
                primary_branch: &self.options.primary_branch,
                ancestor_horizon: self.options.ancestor_horizon,
                network_timeout: self.options.network_timeout,
            };
            match sweeper.sweep(&branch).await {
                Ok(outcome) => {
                    if outcome == SweepOutcome::Cleaned {
                        self.observer.divergence(None);
                    }
                    Some(outcome)
                }
                Err(err) => {
                    warn!(error = %err, %branch, "sweep step failed");
                    None
                }
            }
        } else {
            if !matches!(push, PushOutcome::Diverged(_)) {
                // Back on primary with nothing quarantined: clear any
                // standing warning from an earlier run.
                self.observer.divergence(None);
            }
            None
        };

        // 6. Indicator refresh.
        let branch = self.current_branch().await?;
        self.refresh_indicator(&remote, &branch).await;

        Ok(SyncReport {
            commit,
            update,
            reconciliation,
            data_changed,
            push,
            sweep,
            branch,
        })
    }

    /// Commit pending working-tree edits. A failure here is reported but
    /// does not abort the run: the edits stay in the working tree and are
    /// retried on the next cycle.
    async fn commit_pending(&self, message: &str) -> CommitOutcome {
        let cloned = match self.engine.is_cloned().await {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "could not inspect working tree");
                return CommitOutcome::NoOp;
            }
        };
        if !cloned {
            return CommitOutcome::NoOp;
        }
        let stager = CommitStager {
            engine: self.engine.as_ref(),
            author: &self.options.author,
        };
        match stager.stage_and_commit(message).await {
            Ok(outcome) => {
                if let CommitOutcome::Committed(id) = &outcome {
                    let branch = self
                        .current_branch()
                        .await
                        .unwrap_or_else(|_| self.options.primary_branch.clone());
                    self.log
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .record(&branch, id, message);
                }
                outcome
            }
            Err(err) => {
                warn!(error = %err, "failed to commit local changes, will retry next sync");
                CommitOutcome::NoOp
            }
        }
    }

    /// A repository that never held the document gets one with default
    /// content, committed immediately so the subsequent push publishes it.
    async fn ensure_document(&self) -> Result<Option<CommitOutcome>, SyncError> {
        let present = self
            .engine
            .read_file(&self.options.document_path)
            .await
            .map_err(SyncError::from_engine)?
            .is_some();
        if present {
            return Ok(None);
        }
        info!(path = %self.options.document_path, "document absent, initialising");
        self.engine
            .write_file(&self.options.document_path, EMPTY_DOCUMENT)
            .await
            .map_err(SyncError::from_engine)?;
        let stager = CommitStager {
            engine: self.engine.as_ref(),
            author: &self.options.author,
        };
        let outcome = stager
            .stage_and_commit("Initialize document store")
            .await?;
        if let CommitOutcome::Committed(id) = &outcome {
            let branch = self
                .current_branch()
                .await
                .unwrap_or_else(|_| self.options.primary_branch.clone());
            self.log
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .record(&branch, id, "Initialize document store");
        }
        Ok(Some(outcome))
    }

    async fn current_branch(&self) -> Result<String, SyncError> {
        self.engine
            .current_branch()
            .await
            .map_err(SyncError::from_engine)
    }

    async fn record_tip(&self, branch: &str, message: &str) {
        if let Ok(Some(tip)) = self
            .engine
            .resolve_ref(&crate::domain::refs::local_ref(branch))
            .await
        {
            self.log
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .record(branch, &tip, message);
        }
    }

    async fn refresh_indicator(&self, remote: &RemoteConfig, branch: &str) {
        if branch == self.options.primary_branch {
            self.observer
                .status(&format!("in sync with origin/{branch}"));
            return;
        }
        if is_session_branch(branch, &self.options.primary_branch) {
            let pr = tokio::time::timeout(
                self.options.network_timeout,
                self.hosting
                    .find_pull_request(remote, branch, &self.options.primary_branch),
            )
            .await;
            match pr {
                Ok(Ok(Some(pr))) => self.observer.status(&format!(
                    "on {branch}, awaiting merge of pull request #{}",
                    pr.number
                )),
                Ok(Ok(None)) => self
                    .observer
                    .status(&format!("on {branch}, awaiting reconciliation")),
                Ok(Err(err)) => {
                    warn!(error = %err, "failed to look up pull request for indicator");
                    self.observer
                        .status(&format!("on {branch}, awaiting reconciliation"));
                }
                Err(_) => {
                    self.observer
                        .status(&format!("on {branch}, awaiting reconciliation"));
                }
            }
        } else {
            self.observer.status(&format!("on branch {branch}"));
        }
    }
}
