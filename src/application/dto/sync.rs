use chrono::{DateTime, Utc};

use crate::application::error::SyncError;
use crate::domain::refs::CommitId;

/// Orchestrator state machine. Each run walks these in order and ends back
/// at `Idle`, whether it succeeded or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Committing,
    Updating,
    Reconciling,
    Pushing,
    Sweeping,
}

/// Result of the clone-or-fetch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No local clone existed; a fresh shallow clone was created. Always
    /// treated as "data changed".
    Cloned,
    /// The existing clone fetched the primary branch. Whether the working
    /// tree changed is the reconciler's verdict, not this step's.
    Fetched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(CommitId),
    /// Nothing differed between HEAD, index and working tree. Commits must
    /// be non-empty, so no commit was created.
    NoOp,
}

/// Verdict of comparing local HEAD against the fetched primary tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Local and remote already agree (or there is nothing fetched yet).
    Unchanged,
    /// Local was a strict ancestor of the remote tip; the working tree now
    /// matches the remote tip.
    FastForwarded,
    /// Local holds commits the remote does not; left for the push step.
    LocalAhead,
    /// The ancestry scan hit its horizon without an answer. Fail closed:
    /// treated like `LocalAhead`, never reset.
    AncestryUnknown,
}

#[derive(Debug, Clone)]
pub enum PushOutcome {
    Pushed,
    /// Local and remote tips already matched; no network call was worth
    /// making.
    Skipped,
    /// The push was rejected as non-fast-forward; local commits now live on
    /// the named session branch and a pull request was requested.
    Diverged(String),
    Failed(SyncError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The session branch landed upstream and was deleted remotely and
    /// locally; the checkout is back on primary.
    Cleaned,
    /// The session branch still has commits not reachable from primary
    /// (pull request not merged yet). Nothing touched.
    StillDiverged,
    /// The branch has local commits its remote counterpart lacks. Deleting
    /// it would lose data, so nothing is touched.
    HasUnpushedWork,
    /// Sweeping does not apply to the primary branch.
    NotApplicable,
}

/// Everything one orchestrator run did, step by step.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub commit: CommitOutcome,
    pub update: UpdateOutcome,
    pub reconciliation: Reconciliation,
    /// Whether the document-store consumer was told to reload. Coalesced:
    /// fired at most once per run even when both the update and the
    /// reconcile step changed the tree.
    pub data_changed: bool,
    pub push: PushOutcome,
    pub sweep: Option<SweepOutcome>,
    /// Branch checked out when the run finished.
    pub branch: String,
}

/// Append-only observability record; never read back by the protocol.
#[derive(Debug, Clone)]
pub struct SyncLogEntry {
    pub at: DateTime<Utc>,
    pub branch: String,
    /// Abbreviated commit id.
    pub commit: String,
    pub message: String,
}
