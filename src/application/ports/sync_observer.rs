use crate::application::dto::sync::SyncPhase;

/// Observability hooks for a sync run. Everything here is advisory: the
/// protocol's correctness never depends on an observer.
pub trait SyncObserver: Send + Sync {
    /// The orchestrator entered a new phase.
    fn phase(&self, _phase: SyncPhase) {}

    /// Human-readable status line for the current sub-step.
    fn status(&self, _message: &str) {}

    /// The working tree changed as a result of this run (clone or
    /// fast-forward); consumers should re-read the document. Fired at most
    /// once per run.
    fn data_changed(&self) {}

    /// Divergence indicator. `Some(branch)` raises a persistent warning that
    /// local writes are only durable on a session branch; `None` clears it.
    /// The warning must outlive transient status text.
    fn divergence(&self, _session_branch: Option<&str>) {}
}

/// Observer that forwards everything to `tracing`.
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn phase(&self, phase: SyncPhase) {
        tracing::debug!(?phase, "sync phase");
    }

    fn status(&self, message: &str) {
        tracing::info!(status = %message, "sync status");
    }

    fn data_changed(&self) {
        tracing::info!("document data changed, reload required");
    }

    fn divergence(&self, session_branch: Option<&str>) {
        match session_branch {
            Some(branch) => {
                tracing::warn!(%branch, "local work diverged onto a session branch")
            }
            None => tracing::info!("divergence resolved"),
        }
    }
}

/// Observer that discards everything.
pub struct NullObserver;

impl SyncObserver for NullObserver {}
