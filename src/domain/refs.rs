use std::fmt;

use chrono::{DateTime, Utc};

/// The current checkout, whatever branch that is.
pub const HEAD: &str = "HEAD";

pub fn local_ref(branch: &str) -> String {
    format!("refs/heads/{branch}")
}

pub fn remote_tracking_ref(branch: &str) -> String {
    format!("refs/remotes/origin/{branch}")
}

/// An opaque commit identifier. The protocol only ever compares these for
/// equality; it never inspects their contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitId(String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used for log entries and status text.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(7);
        &self.0[..end]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name for the branch that quarantines local-only commits after a rejected
/// push. Deterministic given the origin branch and the creation instant.
pub fn session_branch_name(origin_branch: &str, at: DateTime<Utc>) -> String {
    format!("{origin_branch}-session-{}", at.timestamp())
}

/// Whether `name` is a session branch derived from `origin_branch`.
pub fn is_session_branch(name: &str, origin_branch: &str) -> bool {
    name.strip_prefix(origin_branch)
        .and_then(|rest| rest.strip_prefix("-session-"))
        .map(|ts| !ts.is_empty() && ts.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}
