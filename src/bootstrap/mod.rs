pub mod config;

use std::sync::Arc;

use crate::application::ports::sync_observer::TracingObserver;
use crate::application::sync_engine::SyncEngine;
use crate::infrastructure::git::engine::Git2Engine;
use crate::infrastructure::hosting::github::GitHubApi;
use crate::infrastructure::login::env::EnvLoginProvider;

/// Wire the production adapters into a ready-to-use sync engine.
pub fn engine_from_config(config: &config::Config) -> anyhow::Result<SyncEngine> {
    let git = Arc::new(Git2Engine::new(&config.workdir));
    let hosting = Arc::new(GitHubApi::new()?);
    let login = Arc::new(EnvLoginProvider::from_config(config));
    let observer = Arc::new(TracingObserver);
    Ok(SyncEngine::new(
        git,
        hosting,
        login,
        observer,
        config.sync_options(),
    ))
}
