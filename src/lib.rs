//! # proxyvisor
//!
//! **Proxyvisor** installs, launches and supervises a small fleet of long-running
//! network processes, and keeps derived connection artifacts in sync with facts
//! those processes report at runtime.
//!
//! It manages three binaries: a reality proxy server (`xy`), a hysteria2 server
//! (`h2`) and a reverse-tunnel client (`cf`). The tunnel client prints its public
//! host once it is assigned; that host is written into the shared config and the
//! connection descriptors are regenerated.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ProxyServer  │   │  Hy2Server   │   │ TunnelClient │
//!     │    (xy)      │   │    (h2)      │   │    (cf)      │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - install phase (sequential)                                     │
//! │  - startup phase (one ProcessSupervisor per service, concurrent)  │
//! │  - Bus + SubscriberSet + StateTracker                             │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ ProcessActor │   │ ProcessActor │   │ ProcessActor │
//!     │(relaunch loop│   │(relaunch loop│   │(relaunch loop│
//!     └┬─────────────┘   └┬─────────────┘   └┬──────┬──────┘
//!      │ lines → log      │ output discarded │      │ lines
//!      │                  │                  │      ▼
//!      │                  │                  │  StreamFactExtractor
//!      │                  │                  │      │ host
//!      │                  │                  │      ▼
//!      │                  │                  │  ConfigHandle ──► ArtifactWriter
//!      │                  │                  │                  (application.yml,
//!      ▼                  ▼                  ▼                   node.txt)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast channel)                    │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                             SubscriberSet
//!                        ┌──────────┼──────────┐
//!                        ▼          ▼          ▼
//!                    LogWriter  StateTracker  custom
//! ```
//!
//! ### Lifecycle of one service
//! ```text
//! install():  binary present? ── yes ─► skip
//!                              └─ no ──► download, chmod, configure
//!
//! startup():  plan = service.plan()          (mode chosen once)
//! loop {
//!   ├─► publish ProcessStarting
//!   ├─► launch plan.command(), stream lines into plan.sink()
//!   ├─► exit 0    ─► SupervisionStopped, exit
//!   └─► exit ≠ 0  ─► BackoffScheduled(3s), sleep (cancellable), continue
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                          |
//! |-------------------|-------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Install once, relaunch on failure, graceful shutdown.       | [`Orchestrator`], [`ProcessSupervisor`]     |
//! | **Services**      | The managed binaries and their launch plans.                | [`Service`], [`RunPlan`]                    |
//! | **Discovery**     | One-shot host extraction from a live line stream.           | [`StreamFactExtractor`]                     |
//! | **Artifacts**     | Settings document and connection descriptors.               | [`ArtifactWriter`], [`SettingsDocument`]    |
//! | **Subscriber API**| Hook into lifecycle events (logging, state tracking).       | [`Subscribe`], [`LogWriter`]                |
//! | **Policies**      | Restart and backoff strategies.                             | [`RestartPolicy`], [`BackoffPolicy`]        |
//! | **Errors**        | Typed errors per concern.                                   | [`InstallError`], [`RuntimeError`]          |
mod artifacts;
mod config;
mod core;
mod discovery;
mod error;
mod events;
mod external;
mod policies;
mod process;
mod services;
mod settings;
pub mod subscribers;

#[cfg(test)]
pub(crate) mod testing;

// ---- Public re-exports ----

pub use artifacts::{ArtifactWriter, Protocol, render_all};
pub use config::{Paths, SupervisorConfig};
pub use crate::core::{
    Orchestrator, OrchestratorHandle, ProcessSupervisor, SupervisionHandle,
    wait_for_shutdown_signal,
};
pub use discovery::{Observation, StreamFactExtractor, TUNNEL_HOST_PATTERN, last_match};
pub use error::{ArtifactError, InstallError, RuntimeError, SettingsError};
pub use events::{Bus, Event, EventKind};
pub use external::{
    CertFiles, CertGenerator, Extract, Fetch, HttpFetcher, SelfSignedCertGenerator,
    UnzipExtractor,
};
pub use policies::{BackoffPolicy, RestartPolicy};
pub use process::{
    CommandSpec, Launcher, LauncherRef, LineSink, LogSink, OutputMode, ProcessExit, RunPlan,
    RunningProcess, StaticPlan, TokioLauncher, run_to_completion,
};
pub use services::{
    Arch, Hy2Server, ProxyServer, RealityKeys, Service, ServiceContext, TunnelClient, TunnelMode,
};
pub use settings::{ConfigHandle, SettingsDocument, SharedConfig};
pub use subscribers::{LogWriter, ProcessState, StateTracker, Subscribe, SubscriberSet};
