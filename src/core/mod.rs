//! Runtime core: installation, supervision and shutdown.
//!
//! Internal modules:
//! - [`runner`]: runs one process instance with cancellation and output streaming;
//! - [`actor`]: relaunch loop of a single service (restart policy, backoff);
//! - [`supervisor`]: install and startup of one service;
//! - [`orchestrator`]: install phase, concurrent startup, graceful shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod actor;
mod orchestrator;
mod runner;
mod shutdown;
mod supervisor;

pub use orchestrator::{Orchestrator, OrchestratorHandle};
pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::{ProcessSupervisor, SupervisionHandle};
