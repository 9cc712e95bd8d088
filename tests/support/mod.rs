#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docsync::application::error::SyncError;
use docsync::application::dto::sync::SyncPhase;
use docsync::application::ports::git_engine::{CommitAuthor, GitEngine, GitEngineError};
use docsync::application::ports::hosting_api::{HostingApi, PullRequest};
use docsync::application::ports::login_provider::{LoginProvider, RemoteConfig};
use docsync::application::ports::sync_observer::SyncObserver;
use docsync::application::sync_engine::{SyncEngine, SyncOptions};
use docsync::domain::refs::CommitId;

#[derive(Clone)]
pub struct CommitData {
    pub parents: Vec<String>,
    pub files: BTreeMap<String, String>,
    pub message: String,
}

/// Shared commit DAG. The fake remote and the fake local engine share one
/// object store, the way a clone shares objects with its origin.
#[derive(Default)]
pub struct Store {
    commits: HashMap<String, CommitData>,
    counter: usize,
}

impl Store {
    fn mint(&mut self) -> String {
        self.counter += 1;
        format!("commit{:04}", self.counter)
    }

    fn insert(
        &mut self,
        parents: Vec<String>,
        files: BTreeMap<String, String>,
        message: &str,
    ) -> String {
        let id = self.mint();
        self.commits.insert(
            id.clone(),
            CommitData {
                parents,
                files,
                message: message.to_string(),
            },
        );
        id
    }

    fn files_of(&self, id: &str) -> BTreeMap<String, String> {
        self.commits
            .get(id)
            .map(|c| c.files.clone())
            .unwrap_or_default()
    }

    /// Reachable commits from `tip`, newest-ish first, truncated at `depth`.
    fn walk(&self, tip: &str, depth: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = vec![tip.to_string()];
        while let Some(id) = queue.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&id) {
                out.push(id.clone());
                if out.len() == depth {
                    break;
                }
                for parent in &commit.parents {
                    queue.push(parent.clone());
                }
            }
        }
        out
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        self.walk(descendant, usize::MAX).iter().any(|c| c == ancestor)
    }
}

/// A hosted repository: branch heads over the shared store.
pub struct RemoteRepo {
    store: Arc<Mutex<Store>>,
    branches: Mutex<HashMap<String, String>>,
}

impl RemoteRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(Mutex::new(Store::default())),
            branches: Mutex::new(HashMap::new()),
        })
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    /// Commit directly on the remote, simulating another client.
    pub fn seed_commit(&self, branch: &str, files: &[(&str, &str)], message: &str) -> String {
        let mut branches = self.branches.lock().unwrap();
        let parent = branches.get(branch).cloned();
        let mut store = self.lock_store();
        let mut tree = parent
            .as_deref()
            .map(|p| store.files_of(p))
            .unwrap_or_default();
        for (path, contents) in files {
            tree.insert(path.to_string(), contents.to_string());
        }
        let id = store.insert(parent.into_iter().collect(), tree, message);
        branches.insert(branch.to_string(), id.clone());
        id
    }

    pub fn branch_tip(&self, branch: &str) -> Option<String> {
        self.branches.lock().unwrap().get(branch).cloned()
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.branches.lock().unwrap().contains_key(branch)
    }

    /// Merge `head` into `base` the way the hosting provider's merge button
    /// does: fast-forward when possible, otherwise a merge commit.
    pub fn merge(&self, head: &str, base: &str) {
        let mut branches = self.branches.lock().unwrap();
        let head_tip = branches.get(head).cloned().expect("head branch exists");
        let base_tip = branches.get(base).cloned();
        let mut store = self.lock_store();
        let new_base = match base_tip {
            None => head_tip,
            Some(base_tip) if store.is_ancestor(&base_tip, &head_tip) => head_tip,
            Some(base_tip) => {
                let tree = store.files_of(&head_tip);
                store.insert(
                    vec![base_tip, head_tip.clone()],
                    tree,
                    &format!("Merge branch {head}"),
                )
            }
        };
        branches.insert(base.to_string(), new_base);
    }

    pub fn delete_branch(&self, branch: &str) {
        self.branches.lock().unwrap().remove(branch);
    }

    pub fn commit_count(&self, branch: &str) -> usize {
        match self.branch_tip(branch) {
            Some(tip) => self.lock_store().walk(&tip, usize::MAX).len(),
            None => 0,
        }
    }

    pub fn file_at_tip(&self, branch: &str, path: &str) -> Option<String> {
        let tip = self.branch_tip(branch)?;
        self.lock_store().files_of(&tip).get(path).cloned()
    }
}

#[derive(Default)]
struct LocalState {
    cloned: bool,
    /// Branch HEAD points at; may be unborn (absent from `branches`).
    head: String,
    branches: HashMap<String, String>,
    remote_refs: HashMap<String, String>,
    worktree: BTreeMap<String, String>,
    index: BTreeMap<String, String>,
}

/// In-memory engine speaking to the fake remote through the shared store.
pub struct InMemoryGitEngine {
    remote: Arc<RemoteRepo>,
    state: Mutex<LocalState>,
    pub clone_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub push_calls: AtomicUsize,
    pub fail_next_push: AtomicBool,
    pub fail_next_write: AtomicBool,
    pub stall_next_fetch: AtomicBool,
    pub stall_next_push: AtomicBool,
}

impl InMemoryGitEngine {
    pub fn new(remote: Arc<RemoteRepo>) -> Arc<Self> {
        Arc::new(Self {
            remote,
            state: Mutex::new(LocalState::default()),
            clone_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            push_calls: AtomicUsize::new(0),
            fail_next_push: AtomicBool::new(false),
            fail_next_write: AtomicBool::new(false),
            stall_next_fetch: AtomicBool::new(false),
            stall_next_push: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalState> {
        self.state.lock().unwrap()
    }

    fn resolve_locked(state: &LocalState, name: &str) -> Option<String> {
        if name == "HEAD" {
            return state.branches.get(&state.head).cloned();
        }
        if let Some(branch) = name.strip_prefix("refs/heads/") {
            return state.branches.get(branch).cloned();
        }
        if let Some(branch) = name.strip_prefix("refs/remotes/origin/") {
            return state.remote_refs.get(branch).cloned();
        }
        None
    }

    /// Local-only commit helper for tests that set up unpushed work.
    pub fn commit_file_directly(&self, path: &str, contents: &str, message: &str) -> String {
        let mut state = self.lock();
        state
            .worktree
            .insert(path.to_string(), contents.to_string());
        let parent = state.branches.get(&state.head).cloned();
        let tree = state.worktree.clone();
        let head = state.head.clone();
        drop(state);
        let mut store = self.remote.lock_store();
        let id = store.insert(parent.into_iter().collect(), tree, message);
        drop(store);
        self.lock().branches.insert(head, id.clone());
        id
    }

    pub fn current_head(&self) -> (String, Option<String>) {
        let state = self.lock();
        let tip = state.branches.get(&state.head).cloned();
        (state.head.clone(), tip)
    }

    pub fn worktree_file(&self, path: &str) -> Option<String> {
        self.lock().worktree.get(path).cloned()
    }

    pub fn has_local_branch(&self, branch: &str) -> bool {
        self.lock().branches.contains_key(branch)
    }
}

#[async_trait]
impl GitEngine for InMemoryGitEngine {
    async fn is_cloned(&self) -> Result<bool, GitEngineError> {
        Ok(self.lock().cloned)
    }

    async fn clone_repo(
        &self,
        _remote: &RemoteConfig,
        branch: &str,
    ) -> Result<(), GitEngineError> {
        self.clone_calls.fetch_add(1, Ordering::SeqCst);
        // Let concurrent callers pile onto the in-flight operation.
        tokio::task::yield_now().await;
        let tip = self.remote.branch_tip(branch);
        let mut state = self.lock();
        state.cloned = true;
        state.head = branch.to_string();
        if let Some(tip) = tip {
            state.branches.insert(branch.to_string(), tip.clone());
            state.remote_refs.insert(branch.to_string(), tip.clone());
            state.worktree = self.remote.lock_store().files_of(&tip);
        }
        Ok(())
    }

    async fn fetch(&self, _remote: &RemoteConfig, branch: &str) -> Result<(), GitEngineError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_next_fetch.swap(false, Ordering::SeqCst) {
            // A remote that never answers; only the caller's timeout ends it.
            std::future::pending::<()>().await;
        }
        tokio::task::yield_now().await;
        if let Some(tip) = self.remote.branch_tip(branch) {
            self.lock().remote_refs.insert(branch.to_string(), tip);
        }
        Ok(())
    }

    async fn push(
        &self,
        _remote: &RemoteConfig,
        branch: &str,
        _set_upstream: bool,
    ) -> Result<(), GitEngineError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_next_push.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_next_push.swap(false, Ordering::SeqCst) {
            return Err(GitEngineError::Network("injected push failure".into()));
        }
        let local_tip = self
            .lock()
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| GitEngineError::NotFound(branch.to_string()))?;
        if let Some(remote_tip) = self.remote.branch_tip(branch) {
            if remote_tip != local_tip
                && !self.remote.lock_store().is_ancestor(&remote_tip, &local_tip)
            {
                return Err(GitEngineError::NonFastForward);
            }
        }
        self.remote
            .branches
            .lock()
            .unwrap()
            .insert(branch.to_string(), local_tip.clone());
        self.lock()
            .remote_refs
            .insert(branch.to_string(), local_tip);
        Ok(())
    }

    async fn current_branch(&self) -> Result<String, GitEngineError> {
        Ok(self.lock().head.clone())
    }

    async fn resolve_ref(&self, name: &str) -> Result<Option<CommitId>, GitEngineError> {
        let state = self.lock();
        Ok(Self::resolve_locked(&state, name).map(CommitId::new))
    }

    async fn log(&self, name: &str, depth: usize) -> Result<Vec<CommitId>, GitEngineError> {
        let tip = {
            let state = self.lock();
            Self::resolve_locked(&state, name)
        };
        let Some(tip) = tip else {
            return Ok(Vec::new());
        };
        Ok(self
            .remote
            .lock_store()
            .walk(&tip, depth)
            .into_iter()
            .map(CommitId::new)
            .collect())
    }

    async fn status_changed_paths(&self) -> Result<Vec<String>, GitEngineError> {
        let state = self.lock();
        let committed = state
            .branches
            .get(&state.head)
            .map(|tip| self.remote.lock_store().files_of(tip))
            .unwrap_or_default();
        let mut changed: Vec<String> = state
            .worktree
            .iter()
            .filter(|(path, contents)| committed.get(*path) != Some(contents))
            .map(|(path, _)| path.clone())
            .collect();
        for path in committed.keys() {
            if !state.worktree.contains_key(path) {
                changed.push(path.clone());
            }
        }
        Ok(changed)
    }

    async fn stage_all(&self) -> Result<(), GitEngineError> {
        let mut state = self.lock();
        state.index = state.worktree.clone();
        Ok(())
    }

    async fn commit(
        &self,
        message: &str,
        _author: &CommitAuthor,
    ) -> Result<CommitId, GitEngineError> {
        let mut state = self.lock();
        let parent = state.branches.get(&state.head).cloned();
        let tree = state.index.clone();
        let id = self
            .remote
            .lock_store()
            .insert(parent.into_iter().collect(), tree, message);
        let head = state.head.clone();
        state.branches.insert(head, id.clone());
        Ok(CommitId::new(id))
    }

    async fn checkout_branch(&self, branch: &str, _force: bool) -> Result<(), GitEngineError> {
        let tip = self
            .lock()
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| GitEngineError::NotFound(branch.to_string()))?;
        let files = self.remote.lock_store().files_of(&tip);
        let mut state = self.lock();
        state.head = branch.to_string();
        state.worktree = files;
        Ok(())
    }

    async fn create_branch(&self, name: &str, checkout: bool) -> Result<(), GitEngineError> {
        let mut state = self.lock();
        let tip = state
            .branches
            .get(&state.head)
            .cloned()
            .ok_or_else(|| GitEngineError::NotFound("HEAD".to_string()))?;
        state.branches.insert(name.to_string(), tip);
        if checkout {
            state.head = name.to_string();
        }
        Ok(())
    }

    async fn delete_branch(&self, name: &str) -> Result<(), GitEngineError> {
        let mut state = self.lock();
        state
            .branches
            .remove(name)
            .ok_or_else(|| GitEngineError::NotFound(name.to_string()))?;
        Ok(())
    }

    async fn write_ref(&self, name: &str, value: &CommitId) -> Result<(), GitEngineError> {
        let mut state = self.lock();
        if let Some(branch) = name.strip_prefix("refs/heads/") {
            state
                .branches
                .insert(branch.to_string(), value.as_str().to_string());
        } else if let Some(branch) = name.strip_prefix("refs/remotes/origin/") {
            state
                .remote_refs
                .insert(branch.to_string(), value.as_str().to_string());
        }
        Ok(())
    }

    async fn delete_ref(&self, name: &str) -> Result<(), GitEngineError> {
        let mut state = self.lock();
        if let Some(branch) = name.strip_prefix("refs/heads/") {
            state.branches.remove(branch);
        } else if let Some(branch) = name.strip_prefix("refs/remotes/origin/") {
            state.remote_refs.remove(branch);
        }
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>, GitEngineError> {
        Ok(self
            .lock()
            .worktree
            .get(path)
            .map(|contents| contents.clone().into_bytes()))
    }

    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), GitEngineError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(GitEngineError::Filesystem("injected write failure".into()));
        }
        self.lock().worktree.insert(
            path.to_string(),
            String::from_utf8_lossy(bytes).into_owned(),
        );
        Ok(())
    }
}

pub struct FakeHostingApi {
    remote: Arc<RemoteRepo>,
    prs: Mutex<Vec<(u64, String, String)>>,
    next_number: AtomicU64,
    pub deleted_branches: Mutex<Vec<String>>,
}

impl FakeHostingApi {
    pub fn new(remote: Arc<RemoteRepo>) -> Arc<Self> {
        Arc::new(Self {
            remote,
            prs: Mutex::new(Vec::new()),
            next_number: AtomicU64::new(1),
            deleted_branches: Mutex::new(Vec::new()),
        })
    }

    pub fn open_pull_requests(&self) -> Vec<(u64, String, String)> {
        self.prs.lock().unwrap().clone()
    }

    /// Merge an open pull request by head branch name and close it.
    pub fn merge_pull_request(&self, head: &str) {
        let mut prs = self.prs.lock().unwrap();
        let Some(pos) = prs.iter().position(|(_, h, _)| h == head) else {
            panic!("no open pull request for {head}");
        };
        let (_, head, base) = prs.remove(pos);
        self.remote.merge(&head, &base);
    }
}

#[async_trait]
impl HostingApi for FakeHostingApi {
    async fn find_pull_request(
        &self,
        _remote: &RemoteConfig,
        head: &str,
        base: &str,
    ) -> anyhow::Result<Option<PullRequest>> {
        Ok(self
            .prs
            .lock()
            .unwrap()
            .iter()
            .find(|(_, h, b)| h == head && b == base)
            .map(|(number, h, _)| PullRequest {
                number: *number,
                url: format!("https://example.invalid/pulls/{h}"),
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
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        self.prs
            .lock()
            .unwrap()
            .push((number, head.to_string(), base.to_string()));
        Ok(PullRequest {
            number,
            url: format!("https://example.invalid/pulls/{head}"),
        })
    }

    async fn delete_remote_branch(
        &self,
        _remote: &RemoteConfig,
        branch: &str,
    ) -> anyhow::Result<()> {
        self.remote.delete_branch(branch);
        self.deleted_branches
            .lock()
            .unwrap()
            .push(branch.to_string());
        Ok(())
    }
}

pub struct StaticLogin {
    token: Option<String>,
}

impl StaticLogin {
    pub fn authenticated() -> Arc<Self> {
        Arc::new(Self {
            token: Some("test-token".to_string()),
        })
    }

    pub fn unauthenticated() -> Arc<Self> {
        Arc::new(Self { token: None })
    }
}

#[async_trait]
impl LoginProvider for StaticLogin {
    async fn remote_config(&self) -> Result<RemoteConfig, SyncError> {
        let token = self.token.clone().ok_or(SyncError::AuthMissing)?;
        Ok(RemoteConfig {
            repo_url: "https://github.com/example/tracker".to_string(),
            token,
            cors_proxy: None,
        })
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub statuses: Mutex<Vec<String>>,
    pub phases: Mutex<Vec<SyncPhase>>,
    pub data_changes: AtomicUsize,
    pub divergence: Mutex<Option<String>>,
}

impl SyncObserver for RecordingObserver {
    fn phase(&self, phase: SyncPhase) {
        self.phases.lock().unwrap().push(phase);
    }

    fn status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn data_changed(&self) {
        self.data_changes.fetch_add(1, Ordering::SeqCst);
    }

    fn divergence(&self, session_branch: Option<&str>) {
        *self.divergence.lock().unwrap() = session_branch.map(String::from);
    }
}

pub fn remote_config() -> RemoteConfig {
    RemoteConfig {
        repo_url: "https://github.com/example/tracker".to_string(),
        token: "test-token".to_string(),
        cors_proxy: None,
    }
}

pub struct Harness {
    pub remote: Arc<RemoteRepo>,
    pub git: Arc<InMemoryGitEngine>,
    pub hosting: Arc<FakeHostingApi>,
    pub observer: Arc<RecordingObserver>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn new(remote: Arc<RemoteRepo>) -> Self {
        Self::with_options(remote, SyncOptions::default())
    }

    pub fn with_options(remote: Arc<RemoteRepo>, options: SyncOptions) -> Self {
        let git = InMemoryGitEngine::new(remote.clone());
        let hosting = FakeHostingApi::new(remote.clone());
        let observer = Arc::new(RecordingObserver::default());
        let engine = SyncEngine::new(
            git.clone(),
            hosting.clone(),
            StaticLogin::authenticated(),
            observer.clone(),
            options,
        );
        Self {
            remote,
            git,
            hosting,
            observer,
            engine,
        }
    }
}
