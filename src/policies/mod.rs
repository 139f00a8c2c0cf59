//! Restart and backoff policies.
//!
//! - [`RestartPolicy`] decides whether a process is relaunched after it exits.
//! - [`BackoffPolicy`] sets how long to wait before the relaunch.
//!
//! ```text
//! SupervisorConfig { restart: RestartPolicy, backoff: BackoffPolicy }
//!      └─► core::actor::ProcessActor uses:
//!           - restart to decide relaunch/exit after each process exit
//!           - backoff.delay() to schedule the next launch
//! ```
//!
//! Defaults: `RestartPolicy::OnFailure` (exit code `0` ends supervision, anything
//! else relaunches) and a fixed 3s backoff.

mod backoff;
mod restart;

pub use backoff::BackoffPolicy;
pub use restart::RestartPolicy;
