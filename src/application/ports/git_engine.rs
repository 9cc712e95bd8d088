use async_trait::async_trait;

use crate::application::ports::login_provider::RemoteConfig;
use crate::domain::refs::CommitId;

/// Synthetic identity used for every commit the protocol creates. Syncs run
/// unattended, with no human git identity configured.
#[derive(Debug, Clone)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl Default for CommitAuthor {
    fn default() -> Self {
        Self {
            name: "docsync".to_string(),
            email: "docsync@localhost".to_string(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum GitEngineError {
    /// The remote rejected a push because it holds commits the local branch
    /// does not. The divergence handler branches on this variant; it must
    /// never be folded into a generic network failure.
    #[error("push rejected: not a fast-forward")]
    NonFastForward,
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("reference not found: {0}")]
    NotFound(String),
    #[error("filesystem failure: {0}")]
    Filesystem(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The git primitives the protocol orchestrates. Backed by a persistent
/// working tree the implementation exclusively owns; the engine is assumed
/// correct and the protocol never reaches around it.
#[async_trait]
pub trait GitEngine: Send + Sync {
    /// Whether a local clone already exists in the working directory.
    async fn is_cloned(&self) -> Result<bool, GitEngineError>;

    /// Shallow (depth-1), single-branch clone of `branch`.
    async fn clone_repo(&self, remote: &RemoteConfig, branch: &str)
    -> Result<(), GitEngineError>;

    /// Fetch `branch` only, updating `refs/remotes/origin/<branch>`.
    async fn fetch(&self, remote: &RemoteConfig, branch: &str) -> Result<(), GitEngineError>;

    /// Push `branch` to its same-named remote ref. Never a force push.
    /// A rejected non-fast-forward push is `Err(NonFastForward)`.
    async fn push(
        &self,
        remote: &RemoteConfig,
        branch: &str,
        set_upstream: bool,
    ) -> Result<(), GitEngineError>;

    /// Name of the branch HEAD currently points at (also for unborn HEADs).
    async fn current_branch(&self) -> Result<String, GitEngineError>;

    /// Resolve a ref name (`HEAD`, `refs/heads/..`, `refs/remotes/origin/..`)
    /// to a commit id. `None` when the ref does not exist or is unborn.
    async fn resolve_ref(&self, name: &str) -> Result<Option<CommitId>, GitEngineError>;

    /// History of `name`, newest first, at most `depth` commits. An
    /// unresolvable ref yields an empty history.
    async fn log(&self, name: &str, depth: usize) -> Result<Vec<CommitId>, GitEngineError>;

    /// Paths that differ between HEAD, index and working tree.
    async fn status_changed_paths(&self) -> Result<Vec<String>, GitEngineError>;

    /// Stage every change in the working tree, including deletions.
    async fn stage_all(&self) -> Result<(), GitEngineError>;

    /// Commit the staged state. Callers must ensure the commit is non-empty.
    async fn commit(&self, message: &str, author: &CommitAuthor)
    -> Result<CommitId, GitEngineError>;

    /// Check out `branch`, discarding working-tree changes when `force`.
    async fn checkout_branch(&self, branch: &str, force: bool) -> Result<(), GitEngineError>;

    /// Create `name` at the current HEAD commit, optionally checking it out.
    async fn create_branch(&self, name: &str, checkout: bool) -> Result<(), GitEngineError>;

    /// Delete a local branch. The branch must not be checked out.
    async fn delete_branch(&self, name: &str) -> Result<(), GitEngineError>;

    /// Overwrite (or create) a ref to point at `value`.
    async fn write_ref(&self, name: &str, value: &CommitId) -> Result<(), GitEngineError>;

    /// Delete a ref; deleting a missing ref is a no-op.
    async fn delete_ref(&self, name: &str) -> Result<(), GitEngineError>;

    /// Read a working-tree file. `None` when absent.
    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, GitEngineError>;

    /// Write a working-tree file, creating parent directories as needed.
    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), GitEngineError>;
}
