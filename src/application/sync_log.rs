use std::collections::VecDeque;

use chrono::Utc;

use crate::application::dto::sync::SyncLogEntry;
use crate::domain::refs::CommitId;

/// Bounded ring buffer of sync log entries. Sync runs happen in a long-lived
/// process, so the log evicts its oldest entries instead of growing without
/// bound.
pub struct SyncLog {
    entries: VecDeque<SyncLogEntry>,
    capacity: usize,
}

impl SyncLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, branch: &str, commit: &CommitId, message: &str) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SyncLogEntry {
            at: Utc::now(),
            branch: branch.to_string(),
            commit: commit.short().to_string(),
            message: message.to_string(),
        });
    }

    /// Entries in insertion order, oldest first.
    pub fn entries(&self) -> Vec<SyncLogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
