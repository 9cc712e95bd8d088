use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    BranchType, Cred, ErrorClass, ErrorCode, FetchOptions, IndexAddOption, PushOptions,
    RemoteCallbacks, Repository, Signature, StatusOptions,
};

use crate::application::ports::git_engine::{CommitAuthor, GitEngine, GitEngineError};
use crate::application::ports::login_provider::RemoteConfig;
use crate::domain::refs::{self, CommitId};

/// Git engine backed by libgit2 over a persistent working tree directory.
///
/// Every method opens the repository afresh; nothing libgit2-owned is held
/// across an await point, so the futures stay `Send`.
pub struct Git2Engine {
    dir: PathBuf,
}

impl Git2Engine {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn open(&self) -> Result<Repository, GitEngineError> {
        Self::open_at(&self.dir)
    }

    fn open_at(dir: &Path) -> Result<Repository, GitEngineError> {
        Repository::open(dir).map_err(map_err)
    }

    /// Fetch refspec scoped to one branch; the clone and every later fetch
    /// use the same one, so only the primary branch is ever transferred.
    fn branch_refspec(branch: &str) -> String {
        format!("{}:{}", refs::local_ref(branch), refs::remote_tracking_ref(branch))
    }

    fn callbacks(remote: &RemoteConfig) -> RemoteCallbacks<'static> {
        let token = remote.token.clone();
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, username_from_url, _allowed| {
            // GitHub PATs authenticate as the fixed sentinel user with the
            // token as password.
            let user = username_from_url.unwrap_or("x-access-token");
            Cred::userpass_plaintext(user, &token)
        });
        callbacks
    }

    /// The CORS proxy contract from the browser origin of this protocol:
    /// requests go to `<proxy>/<repo-url-without-scheme>`.
    fn effective_url(remote: &RemoteConfig) -> String {
        match &remote.cors_proxy {
            Some(proxy) => {
                let stripped = remote
                    .repo_url
                    .trim_start_matches("https://")
                    .trim_start_matches("http://");
                format!("{}/{}", proxy.trim_end_matches('/'), stripped)
            }
            None => remote.repo_url.clone(),
        }
    }

    fn prepare_remote<'repo>(
        repo: &'repo Repository,
        url: &str,
    ) -> Result<git2::Remote<'repo>, GitEngineError> {
        let mut remote = match repo.find_remote("origin") {
            Ok(remote) => remote,
            Err(_) => repo.remote("origin", url).map_err(map_err)?,
        };
        if remote.url() != Some(url) {
            repo.remote_set_url("origin", url).map_err(map_err)?;
            remote = repo.find_remote("origin").map_err(map_err)?;
        }
        Ok(remote)
    }

    fn clone_blocking(
        dir: &Path,
        remote: &RemoteConfig,
        branch: &str,
    ) -> Result<(), GitEngineError> {
        let url = Self::effective_url(remote);

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(Self::callbacks(remote));
        fetch.depth(1);
        let refspec = Self::branch_refspec(branch);
        let mut builder = RepoBuilder::new();
        builder
            .fetch_options(fetch)
            .branch(branch)
            .remote_create(move |repo, name, url| repo.remote_with_fetch(name, url, &refspec));
        match builder.clone(&url, dir) {
            Ok(_) => Ok(()),
            Err(err) if err.code() == ErrorCode::NotFound => {
                // The branch does not exist yet (empty repository). Clone
                // without pinning it, then point HEAD at the unborn branch so
                // the first commit lands there.
                let _ = std::fs::remove_dir_all(dir);
                let mut fetch = FetchOptions::new();
                fetch.remote_callbacks(Self::callbacks(remote));
                let repo = RepoBuilder::new()
                    .fetch_options(fetch)
                    .clone(&url, dir)
                    .map_err(map_err)?;
                repo.set_head(&format!("refs/heads/{branch}"))
                    .map_err(map_err)?;
                Ok(())
            }
            Err(err) => Err(map_err(err)),
        }
    }

    fn fetch_blocking(
        dir: &Path,
        remote: &RemoteConfig,
        branch: &str,
    ) -> Result<(), GitEngineError> {
        let repo = Self::open_at(dir)?;
        let url = Self::effective_url(remote);
        let mut origin = Self::prepare_remote(&repo, &url)?;
        let mut options = FetchOptions::new();
        options.remote_callbacks(Self::callbacks(remote));
        origin
            .fetch(&[&Self::branch_refspec(branch)], Some(&mut options), None)
            .map_err(map_err)
    }

    fn push_blocking(
        dir: &Path,
        remote: &RemoteConfig,
        branch: &str,
        set_upstream: bool,
    ) -> Result<(), GitEngineError> {
        let repo = Self::open_at(dir)?;
        let url = Self::effective_url(remote);
        let mut origin = Self::prepare_remote(&repo, &url)?;

        // Server-side rejections arrive as per-reference status strings, not
        // as push() errors; capture them so the rejection can be classified
        // into a typed error at this boundary.
        let rejection: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let seen = rejection.clone();
        let mut callbacks = Self::callbacks(remote);
        callbacks.push_update_reference(move |_refname, status| {
            if let Some(message) = status {
                *seen.lock().unwrap_or_else(|p| p.into_inner()) = Some(message.to_string());
            }
            Ok(())
        });
        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        origin
            .push(&[&refspec], Some(&mut options))
            .map_err(map_err)?;
        drop(origin);

        if let Some(message) = rejection
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            if message.contains("fast-forward") || message.contains("fetch first") {
                return Err(GitEngineError::NonFastForward);
            }
            return Err(GitEngineError::Network(message));
        }

        // Accepted: mirror the new remote state locally.
        if let Ok(reference) = repo.find_reference(&format!("refs/heads/{branch}")) {
            if let Some(oid) = reference.target() {
                repo.reference(
                    &format!("refs/remotes/origin/{branch}"),
                    oid,
                    true,
                    "docsync: update remote-tracking ref after push",
                )
                .map_err(map_err)?;
            }
        }
        if set_upstream {
            let mut local = repo.find_branch(branch, BranchType::Local).map_err(map_err)?;
            local
                .set_upstream(Some(&format!("origin/{branch}")))
                .map_err(map_err)?;
        }
        Ok(())
    }

    fn head_commit_id(repo: &Repository) -> Result<Option<git2::Oid>, GitEngineError> {
        match repo.head() {
            Ok(head) => Ok(head.target()),
            Err(err)
                if err.code() == ErrorCode::UnbornBranch
                    || err.code() == ErrorCode::NotFound =>
            {
                Ok(None)
            }
            Err(err) => Err(map_err(err)),
        }
    }
}

#[async_trait]
impl GitEngine for Git2Engine {
    async fn is_cloned(&self) -> Result<bool, GitEngineError> {
        match tokio::fs::try_exists(self.dir.join(".git")).await {
            Ok(exists) => Ok(exists),
            Err(err) => Err(GitEngineError::Filesystem(err.to_string())),
        }
    }

    // libgit2 transfers block for their whole duration, so the network
    // operations run on the blocking pool; the async wrappers yield at the
    // join handle, which is what lets the callers' timeouts fire.

    async fn clone_repo(
        &self,
        remote: &RemoteConfig,
        branch: &str,
    ) -> Result<(), GitEngineError> {
        let dir = self.dir.clone();
        let remote = remote.clone();
        let branch = branch.to_string();
        tokio::task::spawn_blocking(move || Self::clone_blocking(&dir, &remote, &branch))
            .await
            .map_err(|err| GitEngineError::Other(err.into()))?
    }

    async fn fetch(&self, remote: &RemoteConfig, branch: &str) -> Result<(), GitEngineError> {
        let dir = self.dir.clone();
        let remote = remote.clone();
        let branch = branch.to_string();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&dir, &remote, &branch))
            .await
            .map_err(|err| GitEngineError::Other(err.into()))?
    }

    async fn push(
        &self,
        remote: &RemoteConfig,
        branch: &str,
        set_upstream: bool,
    ) -> Result<(), GitEngineError> {
        let dir = self.dir.clone();
        let remote = remote.clone();
        let branch = branch.to_string();
        tokio::task::spawn_blocking(move || {
            Self::push_blocking(&dir, &remote, &branch, set_upstream)
        })
        .await
        .map_err(|err| GitEngineError::Other(err.into()))?
    }

    async fn current_branch(&self) -> Result<String, GitEngineError> {
        let repo = self.open()?;
        match repo.head() {
            Ok(head) => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
            Err(err)
                if err.code() == ErrorCode::UnbornBranch
                    || err.code() == ErrorCode::NotFound =>
            {
                let head = repo.find_reference("HEAD").map_err(map_err)?;
                let target = head.symbolic_target().unwrap_or("refs/heads/main");
                Ok(target.trim_start_matches("refs/heads/").to_string())
            }
            Err(err) => Err(map_err(err)),
        }
    }

    async fn resolve_ref(&self, name: &str) -> Result<Option<CommitId>, GitEngineError> {
        let repo = self.open()?;
        if name == "HEAD" {
            return Ok(Self::head_commit_id(&repo)?.map(|oid| CommitId::new(oid.to_string())));
        }
        match repo.find_reference(name) {
            Ok(reference) => Ok(reference
                .resolve()
                .ok()
                .and_then(|direct| direct.target())
                .map(|oid| CommitId::new(oid.to_string()))),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(map_err(err)),
        }
    }

    async fn log(&self, name: &str, depth: usize) -> Result<Vec<CommitId>, GitEngineError> {
        let repo = self.open()?;
        let target = if name == "HEAD" {
            Self::head_commit_id(&repo)?
        } else {
            match repo.find_reference(name) {
                Ok(reference) => reference.resolve().ok().and_then(|direct| direct.target()),
                Err(err) if err.code() == ErrorCode::NotFound => None,
                Err(err) => return Err(map_err(err)),
            }
        };
        let Some(oid) = target else {
            return Ok(Vec::new());
        };

        let mut walk = repo.revwalk().map_err(map_err)?;
        walk.push(oid).map_err(map_err)?;
        let mut out = Vec::new();
        for item in walk {
            let oid = item.map_err(map_err)?;
            out.push(CommitId::new(oid.to_string()));
            if out.len() == depth {
                break;
            }
        }
        Ok(out)
    }

    async fn status_changed_paths(&self) -> Result<Vec<String>, GitEngineError> {
        let repo = self.open()?;
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = repo.statuses(Some(&mut options)).map_err(map_err)?;
        Ok(statuses
            .iter()
            .filter_map(|entry| entry.path().map(String::from))
            .collect())
    }

    async fn stage_all(&self) -> Result<(), GitEngineError> {
        let repo = self.open()?;
        let mut index = repo.index().map_err(map_err)?;
        index
            .add_all(["*"], IndexAddOption::DEFAULT, None)
            .map_err(map_err)?;
        // add_all does not record deletions.
        index.update_all(["*"], None).map_err(map_err)?;
        index.write().map_err(map_err)
    }

    async fn commit(
        &self,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<CommitId, GitEngineError> {
        let repo = self.open()?;
        let mut index = repo.index().map_err(map_err)?;
        let tree_id = index.write_tree().map_err(map_err)?;
        let tree = repo.find_tree(tree_id).map_err(map_err)?;
        let signature = Signature::now(&author.name, &author.email).map_err(map_err)?;
        let parent = Self::head_commit_id(&repo)?
            .map(|oid| repo.find_commit(oid))
            .transpose()
            .map_err(map_err)?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(map_err)?;
        Ok(CommitId::new(oid.to_string()))
    }

    async fn checkout_branch(&self, branch: &str, force: bool) -> Result<(), GitEngineError> {
        let repo = self.open()?;
        let refname = format!("refs/heads/{branch}");
        let mut checkout = CheckoutBuilder::new();
        if force {
            checkout.force();
        }
        let object = repo.revparse_single(&refname).map_err(map_err)?;
        repo.checkout_tree(&object, Some(&mut checkout))
            .map_err(map_err)?;
        repo.set_head(&refname).map_err(map_err)
    }

    async fn create_branch(&self, name: &str, checkout: bool) -> Result<(), GitEngineError> {
        let repo = self.open()?;
        let Some(oid) = Self::head_commit_id(&repo)? else {
            return Err(GitEngineError::NotFound("HEAD".to_string()));
        };
        let commit = repo.find_commit(oid).map_err(map_err)?;
        repo.branch(name, &commit, false).map_err(map_err)?;
        if checkout {
            // Same tree as HEAD, only the symbolic ref moves.
            repo.set_head(&format!("refs/heads/{name}")).map_err(map_err)?;
        }
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), GitEngineError> {
        let repo = self.open()?;
        let mut branch = repo.find_branch(name, BranchType::Local).map_err(map_err)?;
        branch.delete().map_err(map_err)
    }

    async fn write_ref(&self, name: &str, value: &CommitId) -> Result<(), GitEngineError> {
        let repo = self.open()?;
        let oid = git2::Oid::from_str(value.as_str()).map_err(map_err)?;
        repo.reference(name, oid, true, "docsync: update ref")
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete_ref(&self, name: &str) -> Result<(), GitEngineError> {
        let repo = self.open()?;
        match repo.find_reference(name) {
            Ok(mut reference) => reference.delete().map_err(map_err),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(()),
            Err(err) => Err(map_err(err)),
        }
    }

    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, GitEngineError> {
        match tokio::fs::read(self.dir.join(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(GitEngineError::Filesystem(err.to_string())),
        }
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), GitEngineError> {
        let full = self.dir.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| GitEngineError::Filesystem(err.to_string()))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|err| GitEngineError::Filesystem(err.to_string()))
    }
}

fn map_err(err: git2::Error) -> GitEngineError {
    match (err.code(), err.class()) {
        (ErrorCode::NotFastForward, _) => GitEngineError::NonFastForward,
        (ErrorCode::Auth, _) => GitEngineError::Auth(err.message().to_string()),
        (ErrorCode::NotFound, _) => GitEngineError::NotFound(err.message().to_string()),
        (_, ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssl) => {
            GitEngineError::Network(err.message().to_string())
        }
        (_, ErrorClass::Os | ErrorClass::Filesystem) => {
            GitEngineError::Filesystem(err.message().to_string())
        }
        _ => GitEngineError::Other(err.into()),
    }
}
