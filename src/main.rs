use dotenvy::dotenv;
use tracing::info;

use docsync::bootstrap::config::Config;
use docsync::bootstrap::engine_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "docsync=info".into()))
        .init();

    let cfg = Config::from_env()?;
    info!(branch = %cfg.primary_branch, workdir = %cfg.workdir, "starting docsync");

    let engine = engine_from_config(&cfg)?;
    let report = engine.sync("docsync: update document").await?;
    info!(?report, "sync finished");

    for entry in engine.log_entries() {
        info!(branch = %entry.branch, commit = %entry.commit, message = %entry.message, at = %entry.at, "synced");
    }
    Ok(())
}
