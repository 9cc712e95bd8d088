use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::hosting_api::{HostingApi, PullRequest};
use crate::application::ports::login_provider::RemoteConfig;

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// GitHub REST adapter for the hosting port.
pub struct GitHubApi {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

impl GitHubApi {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base(DEFAULT_API_BASE)
    }

    pub fn with_base(api_base: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("docsync")
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            api_base: api_base.into(),
        })
    }

    fn pulls_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{}/{}/pulls", self.api_base, owner, repo)
    }
}

/// Extract `(owner, repo)` from a GitHub repository URL, tolerating a
/// trailing `.git` suffix and trailing slashes.
fn repo_slug(repo_url: &str) -> anyhow::Result<(String, String)> {
    let trimmed = repo_url
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let mut parts = trimmed.split('/');
    let _host = parts.next();
    let owner = parts.next().filter(|s| !s.is_empty());
    let repo = parts.next().filter(|s| !s.is_empty());
    match (owner, repo) {
        (Some(owner), Some(repo)) => Ok((owner.to_string(), repo.to_string())),
        _ => Err(anyhow!("cannot parse owner/repo from url: {repo_url}")),
    }
}

#[async_trait]
impl HostingApi for GitHubApi {
    async fn find_pull_request(
        &self,
        remote: &RemoteConfig,
        head: &str,
        base: &str,
    ) -> anyhow::Result<Option<PullRequest>> {
        let (owner, repo) = repo_slug(&remote.repo_url)?;
        let response = self
            .client
            .get(self.pulls_url(&owner, &repo))
            .query(&[
                ("state", "open"),
                ("base", base),
                ("head", &format!("{owner}:{head}")),
            ])
            .bearer_auth(&remote.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .context("pull request lookup failed")?
            .error_for_status()
            .context("pull request lookup rejected")?;
        let pulls: Vec<PullResponse> = response
            .json()
            .await
            .context("invalid pull request listing")?;
        Ok(pulls.into_iter().next().map(|p| PullRequest {
            number: p.number,
            url: p.html_url,
        }))
    }

    async fn ensure_pull_request(
        &self,
        remote: &RemoteConfig,
        head: &str,
        base: &str,
    ) -> anyhow::Result<PullRequest> {
        if let Some(existing) = self.find_pull_request(remote, head, base).await? {
            return Ok(existing);
        }
        let (owner, repo) = repo_slug(&remote.repo_url)?;
        let body = serde_json::json!({
            "title": format!("Merge session branch {head}"),
            "head": head,
            "base": base,
            "body": "Automated pull request for a diverged sync session. \
                     Merge to bring the session's document changes back into \
                     the primary branch.",
        });
        let created: PullResponse = self
            .client
            .post(self.pulls_url(&owner, &repo))
            .bearer_auth(&remote.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .context("pull request creation failed")?
            .error_for_status()
            .context("pull request creation rejected")?
            .json()
            .await
            .context("invalid pull request response")?;
        Ok(PullRequest {
            number: created.number,
            url: created.html_url,
        })
    }

    async fn delete_remote_branch(
        &self,
        remote: &RemoteConfig,
        branch: &str,
    ) -> anyhow::Result<()> {
        let (owner, repo) = repo_slug(&remote.repo_url)?;
        let url = format!(
            "{}/repos/{}/{}/git/refs/heads/{}",
            self.api_base,
            owner,
            repo,
            urlencoding::encode(branch)
        );
        let response = self
            .client
            .delete(url)
            .bearer_auth(&remote.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .context("remote branch deletion failed")?;
        // 404/422 mean the ref is already gone, which is the desired state.
        if response.status().is_success()
            || response.status() == reqwest::StatusCode::NOT_FOUND
            || response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            return Ok(());
        }
        Err(anyhow!(
            "remote branch deletion rejected: {}",
            response.status()
        ))
    }
}
