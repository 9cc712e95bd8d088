use async_trait::async_trait;

use crate::application::error::SyncError;
use crate::application::ports::login_provider::{LoginProvider, RemoteConfig};
use crate::bootstrap::config::Config;

/// Login provider reading credentials captured from the environment at
/// startup. Suitable for the CLI; interactive frontends supply their own
/// implementation on top of whatever auth flow they run.
pub struct EnvLoginProvider {
    repo_url: Option<String>,
    token: Option<String>,
    cors_proxy: Option<String>,
}

impl EnvLoginProvider {
    pub fn from_config(config: &Config) -> Self {
        Self {
            repo_url: config.repo_url.clone(),
            token: config.token.clone(),
            cors_proxy: config.cors_proxy.clone(),
        }
    }
}

#[async_trait]
impl LoginProvider for EnvLoginProvider {
    async fn remote_config(&self) -> Result<RemoteConfig, SyncError> {
        let token = self.token.clone().ok_or(SyncError::AuthMissing)?;
        let repo_url = self.repo_url.clone().ok_or(SyncError::RepoUrlMissing)?;
        Ok(RemoteConfig {
            repo_url,
            token,
            cors_proxy: self.cors_proxy.clone(),
        })
    }
}
