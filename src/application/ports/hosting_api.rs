use async_trait::async_trait;

use crate::application::ports::login_provider::RemoteConfig;

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,
}

/// The hosting provider's HTTPS API, used for the two things plain git
/// cannot do: opening pull requests and deleting remote branch refs.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Look up an open pull request comparing `head` against `base`.
    async fn find_pull_request(
        &self,
        remote: &RemoteConfig,
        head: &str,
        base: &str,
    ) -> anyhow::Result<Option<PullRequest>>;

    /// Get-or-create: returns the open pull request for `head` against
    /// `base`, creating one if none exists. Idempotent.
    async fn ensure_pull_request(
        &self,
        remote: &RemoteConfig,
        head: &str,
        base: &str,
    ) -> anyhow::Result<PullRequest>;

    /// Delete a remote branch ref. Deleting an already-deleted branch
    /// succeeds.
    async fn delete_remote_branch(
        &self,
        remote: &RemoteConfig,
        branch: &str,
    ) -> anyhow::Result<()>;
}
