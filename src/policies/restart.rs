//! # Restart policies for process actors.
//!
//! [`RestartPolicy`] decides whether a managed process is relaunched after it exits.
//!
//! ```text
//! exit code 0      exit code != 0 (or killed by signal)
//! ───────────      ────────────────────────────────────
//! Never      → Stopped         Never      → Failed
//! OnFailure  → Stopped         OnFailure  → backoff, relaunch
//! ```
//!
//! Long-running network services use [`RestartPolicy::OnFailure`]: a crash loop is
//! retried forever, a clean exit is respected.

/// Policy controlling whether a process is relaunched after it exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Run once; the first exit is terminal.
    Never,
    /// Relaunch only after a non-zero exit.
    #[default]
    OnFailure,
}

impl RestartPolicy {
    /// Returns `true` if a failed run should be retried.
    pub fn retries_failure(&self) -> bool {
        matches!(self, RestartPolicy::OnFailure)
    }
}
