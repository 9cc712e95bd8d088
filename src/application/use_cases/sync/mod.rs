pub mod cleanup_sweep;
pub mod ensure_up_to_date;
pub mod push_divergence;
pub mod reconcile;
pub mod stage_commit;

use crate::application::error::SyncError;
use crate::application::ports::git_engine::GitEngine;
use crate::domain::refs::CommitId;

/// Derived ancestry predicate, computed by scanning a bounded slice of
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ancestry {
    /// `commit` is reachable from the ref within the horizon.
    Ancestor,
    /// The full history fit inside the horizon and `commit` is not in it.
    Disjoint,
    /// The scan was truncated at the horizon without finding `commit`. The
    /// relationship is unknown and callers must fail closed.
    Unknown,
}

/// Is `commit` an ancestor of (or equal to) the tip of `of_ref`?
///
/// Scans at most `horizon` commits of `of_ref`'s history. The horizon is a
/// tunable cost bound, not a correctness guarantee: beyond it the answer is
/// [`Ancestry::Unknown`].
pub async fn ancestry_of(
    engine: &dyn GitEngine,
    commit: &CommitId,
    of_ref: &str,
    horizon: usize,
) -> Result<Ancestry, SyncError> {
    let history = engine
        .log(of_ref, horizon)
        .await
        .map_err(SyncError::from_engine)?;
    if history.iter().any(|c| c == commit) {
        Ok(Ancestry::Ancestor)
    } else if history.len() >= horizon {
        Ok(Ancestry::Unknown)
    } else {
        Ok(Ancestry::Disjoint)
    }
}
