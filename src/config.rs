//! # Runtime configuration.
//!
//! - [`SupervisorConfig`] supervision knobs: grace period, bus capacity, default
//!   restart and backoff policies.
//! - [`Paths`] the on-disk layout under the work directory.
//!
//! Connection parameters (domain, port, keys...) are not here; they live in
//! [`SharedConfig`](crate::SharedConfig).

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::policies::{BackoffPolicy, RestartPolicy};

/// Global configuration for the supervision runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for supervisors to stop after cancellation
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `restart`: restart policy applied to every managed process
/// - `backoff`: delay policy between a failed exit and the relaunch
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Maximum time to wait for supervisors to stop during shutdown.
    pub grace: Duration,
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
    /// Restart policy for managed processes.
    pub restart: RestartPolicy,
    /// Relaunch delay policy.
    pub backoff: BackoffPolicy,
}

impl Default for SupervisorConfig {
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    /// - `restart = OnFailure`
    /// - `backoff = fixed 3s`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
            restart: RestartPolicy::default(),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// File layout under the work directory.
///
/// ```text
/// <work>/
///   application.yml      persisted settings
///   node.txt             connection descriptors
///   bin/<service>/...    one directory per managed binary
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paths {
    pub work_dir: PathBuf,
    pub bin_root: PathBuf,
    pub settings: PathBuf,
    pub descriptors: PathBuf,
}

impl Paths {
    /// Layout rooted at `work_dir`.
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        let work_dir = work_dir.as_ref().to_path_buf();
        Self {
            bin_root: work_dir.join("bin"),
            settings: work_dir.join("application.yml"),
            descriptors: work_dir.join("node.txt"),
            work_dir,
        }
    }

    /// Install directory of the service named `name`.
    pub fn bin_dir(&self, name: &str) -> PathBuf {
        self.bin_root.join(name)
    }
}
