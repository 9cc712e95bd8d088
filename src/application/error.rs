use std::fmt;

use crate::application::ports::git_engine::GitEngineError;

/// The remote operation a failure occurred in. Carried by network errors so
/// the operator-facing status line can say which step broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Clone,
    Fetch,
    Push,
    Api,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteOp::Clone => "clone",
            RemoteOp::Fetch => "fetch",
            RemoteOp::Push => "push",
            RemoteOp::Api => "hosting API call",
        };
        f.write_str(s)
    }
}

/// Failure taxonomy for a sync run.
///
/// `Clone` is required because the in-flight update future is shared between
/// concurrent callers and each of them receives the same result.
///
/// Note that a rejected non-fast-forward push is *not* represented here: it is
/// an expected condition, fully handled by the divergence path, and never
/// surfaces to the operator as an error.
#[derive(thiserror::Error, Debug, Clone)]
pub enum SyncError {
    #[error("no login token available")]
    AuthMissing,
    #[error("no repository URL configured")]
    RepoUrlMissing,
    #[error("{op} failed: {message}")]
    Network { op: RemoteOp, message: String },
    #[error("{0} timed out")]
    Timeout(RemoteOp),
    #[error("filesystem failure: {0}")]
    Filesystem(String),
    #[error("git engine failure: {0}")]
    Engine(String),
}

impl SyncError {
    pub fn network(op: RemoteOp, err: impl fmt::Display) -> Self {
        SyncError::Network {
            op,
            message: err.to_string(),
        }
    }

    /// Map a git engine failure from a remote-touching operation.
    pub fn from_remote(op: RemoteOp, err: GitEngineError) -> Self {
        match err {
            GitEngineError::Filesystem(msg) => SyncError::Filesystem(msg),
            other => SyncError::network(op, other),
        }
    }

    /// Map a git engine failure from a purely local operation.
    pub fn from_engine(err: GitEngineError) -> Self {
        match err {
            GitEngineError::Filesystem(msg) => SyncError::Filesystem(msg),
            other => SyncError::Engine(other.to_string()),
        }
    }
}
