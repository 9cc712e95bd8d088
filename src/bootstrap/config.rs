use std::env;
use std::time::Duration;

use crate::application::sync_engine::SyncOptions;

#[derive(Clone, Debug)]
pub struct Config {
    pub primary_branch: String,
    pub workdir: String,
    pub document_path: String,
    pub ancestor_horizon: usize,
    pub network_timeout_secs: u64,
    pub log_capacity: usize,
    pub repo_url: Option<String>,
    pub token: Option<String>,
    pub cors_proxy: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let primary_branch =
            env::var("DOCSYNC_PRIMARY_BRANCH").unwrap_or_else(|_| "main".into());
        let workdir = env::var("DOCSYNC_WORKDIR").unwrap_or_else(|_| "./repo".into());
        let document_path =
            env::var("DOCSYNC_DOCUMENT_PATH").unwrap_or_else(|_| "document.json".into());
        let ancestor_horizon = env::var("DOCSYNC_ANCESTOR_HORIZON")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);
        let network_timeout_secs = env::var("DOCSYNC_NETWORK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let log_capacity = env::var("DOCSYNC_LOG_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(512);
        let repo_url = env::var("DOCSYNC_REPO_URL").ok().filter(|v| !v.is_empty());
        let token = env::var("DOCSYNC_TOKEN").ok().filter(|v| !v.is_empty());
        let cors_proxy = env::var("DOCSYNC_CORS_PROXY").ok().and_then(|v| {
            let trimmed = v.trim();
            if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                Some(trimmed.trim_end_matches('/').to_string())
            } else {
                None
            }
        });

        Ok(Self {
            primary_branch,
            workdir,
            document_path,
            ancestor_horizon,
            network_timeout_secs,
            log_capacity,
            repo_url,
            token,
            cors_proxy,
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            primary_branch: self.primary_branch.clone(),
            document_path: self.document_path.clone(),
            ancestor_horizon: self.ancestor_horizon,
            network_timeout: Duration::from_secs(self.network_timeout_secs),
            log_capacity: self.log_capacity,
            ..SyncOptions::default()
        }
    }
}
