use async_trait::async_trait;

use crate::application::error::SyncError;

/// Everything a remote-touching operation needs, supplied fresh on every
/// sync attempt. Tokens may rotate between attempts, so the core never
/// caches this.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub repo_url: String,
    pub token: String,
    pub cors_proxy: Option<String>,
}

#[async_trait]
pub trait LoginProvider: Send + Sync {
    /// Current credentials and repository coordinates.
    ///
    /// `SyncError::AuthMissing` when no token is available and
    /// `SyncError::RepoUrlMissing` when no repository is configured; either
    /// one fails the whole run fast.
    async fn remote_config(&self) -> Result<RemoteConfig, SyncError>;
}
