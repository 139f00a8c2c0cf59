//! # Orchestrator: installs every service, then supervises them concurrently.
//!
//! The [`Orchestrator`] owns the event bus, a [`SubscriberSet`], and the runtime
//! configuration. [`Orchestrator::start`] returns as soon as every supervisor is
//! running; the caller keeps the foreground.
//!
//! ## High-level architecture
//! ```text
//! Orchestrator::new(cfg, launcher, subscribers)
//!   └─ listener: Bus.subscribe() ─► SubscriberSet::emit(&Event)   (fire-and-forget)
//!
//! start():
//!   install phase (sequential, declaration order)
//!     xy.install() → h2.install() → cf.install()      failure skips that service
//!   startup phase (concurrent)
//!     ProcessSupervisor::startup(runtime_token.child_token())   one per service
//!   └─► OrchestratorHandle
//!
//! OrchestratorHandle::shutdown():
//!   Bus.publish(ShutdownRequested)
//!   runtime_token.cancel()          → every actor kills its process
//!   wait up to cfg.grace:
//!     ├─ all joined   → Bus.publish(AllStoppedWithinGrace)
//!     └─ grace passed → Bus.publish(GraceExceeded), abort the rest
//!                       → Err(RuntimeError::GraceExceeded { stuck })
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use proxyvisor::{Orchestrator, SupervisorConfig, TokioLauncher, subscribers::LogWriter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(
//!         SupervisorConfig::default(),
//!         Arc::new(TokioLauncher::new()),
//!         vec![Arc::new(LogWriter::new())],
//!     );
//!     // .with_service(...) for each managed binary
//!     let handle = orchestrator.start().await;
//!     proxyvisor::wait_for_shutdown_signal().await?;
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    config::SupervisorConfig,
    core::supervisor::{ProcessSupervisor, SupervisionHandle},
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    process::LauncherRef,
    services::Service,
    subscribers::{ProcessState, StateTracker, Subscribe, SubscriberSet},
};

/// Coordinates supervisors, event delivery and graceful shutdown.
pub struct Orchestrator {
    cfg: SupervisorConfig,
    bus: Bus,
    state: Arc<StateTracker>,
    launcher: LauncherRef,
    services: Vec<Arc<dyn Service>>,
}

impl Orchestrator {
    /// Creates the orchestrator and starts delivering events to `subscribers`.
    ///
    /// A [`StateTracker`] is always added. Must be called inside a Tokio runtime.
    pub fn new(
        cfg: SupervisorConfig,
        launcher: LauncherRef,
        mut subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        let state = Arc::new(StateTracker::new());
        subscribers.push(state.clone());

        let set = SubscriberSet::new(subscribers, bus.clone());
        subscriber_listener(&bus, set);

        Self {
            cfg,
            bus,
            state,
            launcher,
            services: Vec::new(),
        }
    }

    /// Event bus shared with services and supervisors.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Adds a managed service. Services are installed in the order added.
    pub fn with_service(mut self, service: Arc<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    /// Installs every service, then starts all supervisors and returns.
    pub async fn start(self) -> OrchestratorHandle {
        let token = CancellationToken::new();

        let mut ready = Vec::with_capacity(self.services.len());
        for service in self.services {
            let sup = ProcessSupervisor::new(
                service,
                Arc::clone(&self.launcher),
                self.bus.clone(),
                &self.cfg,
            );
            match sup.install().await {
                Ok(()) => ready.push(sup),
                Err(e) => warn!(service = sup.name(), error = %e, "install failed, service skipped"),
            }
        }

        let supervisions = ready
            .iter()
            .map(|sup| sup.startup(token.child_token()))
            .collect();

        OrchestratorHandle {
            grace: self.cfg.grace,
            bus: self.bus,
            state: self.state,
            token,
            supervisions,
        }
    }
}

/// Forwards bus events to the subscriber set until the bus closes.
fn subscriber_listener(bus: &Bus, set: SubscriberSet) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}

/// Handle to a started orchestrator.
pub struct OrchestratorHandle {
    grace: std::time::Duration,
    bus: Bus,
    state: Arc<StateTracker>,
    token: CancellationToken,
    supervisions: Vec<SupervisionHandle>,
}

impl OrchestratorHandle {
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Names of the services under supervision, in start order.
    pub fn services(&self) -> Vec<&str> {
        self.supervisions.iter().map(SupervisionHandle::name).collect()
    }

    /// Last known state of `service`, as seen by the event stream.
    pub async fn state(&self, service: &str) -> Option<ProcessState> {
        self.state.state(service).await
    }

    /// Services with a live process or a pending relaunch.
    pub async fn active(&self) -> Vec<String> {
        self.state.active().await
    }

    /// Waits until every supervisor ends on its own.
    pub async fn wait(&mut self) -> Vec<(String, Result<ProcessState, RuntimeError>)> {
        let mut out = Vec::with_capacity(self.supervisions.len());
        for sup in &mut self.supervisions {
            let res = sup.wait().await;
            out.push((sup.name().to_string(), res));
        }
        out
    }

    /// Cancels every supervisor and waits up to the grace period.
    pub async fn shutdown(mut self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.token.cancel();

        let supervisions = &mut self.supervisions;
        let all = async move {
            for sup in supervisions.iter_mut() {
                let _ = sup.wait().await;
            }
        };
        if tokio::time::timeout(self.grace, all).await.is_ok() {
            self.bus.publish(Event::new(EventKind::AllStoppedWithinGrace));
            return Ok(());
        }

        let stuck: Vec<String> = self
            .supervisions
            .iter()
            .filter(|s| !s.is_finished())
            .map(|s| s.name().to_string())
            .collect();
        for sup in &self.supervisions {
            sup.abort();
        }
        self.bus.publish(
            Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
        );
        Err(RuntimeError::GraceExceeded {
            grace: self.grace,
            stuck,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::InstallError;
    use crate::process::{CommandSpec, RunPlan, StaticPlan};
    use crate::testing::{FakeLauncher, FakeRun};

    struct Stub {
        name: &'static str,
        install_fails: bool,
    }

    #[async_trait]
    impl Service for Stub {
        fn name(&self) -> &str {
            self.name
        }

        fn binary(&self) -> PathBuf {
            PathBuf::from("/opt").join(self.name)
        }

        fn is_installed(&self) -> bool {
            !self.install_fails
        }

        async fn install(&self) -> Result<(), InstallError> {
            Err(InstallError::Download {
                url: "https://example.invalid".into(),
                reason: "offline".into(),
            })
        }

        fn plan(&self) -> Box<dyn RunPlan> {
            Box::new(StaticPlan::new(self.name, CommandSpec::new(self.binary())))
        }
    }

    fn stub(name: &'static str, install_fails: bool) -> Arc<dyn Service> {
        Arc::new(Stub {
            name,
            install_fails,
        })
    }

    #[tokio::test]
    async fn test_failed_install_skips_only_that_service() {
        let launcher = Arc::new(FakeLauncher::new());
        let handle = Orchestrator::new(SupervisorConfig::default(), launcher.clone(), vec![])
            .with_service(stub("xy", false))
            .with_service(stub("h2", true))
            .with_service(stub("cf", false))
            .start()
            .await;

        assert_eq!(handle.services(), vec!["xy", "cf"]);
        handle.shutdown().await.unwrap();
        assert_eq!(launcher.launch_count("h2"), 0);
    }

    #[tokio::test]
    async fn test_start_does_not_block_on_running_services() {
        let launcher = Arc::new(FakeLauncher::new());
        let orchestrator = Orchestrator::new(SupervisorConfig::default(), launcher.clone(), vec![])
            .with_service(stub("xy", false))
            .with_service(stub("cf", false));
        let mut rx = orchestrator.bus().subscribe();

        let handle = tokio::time::timeout(Duration::from_secs(5), orchestrator.start())
            .await
            .expect("start returns while processes keep running");
        tokio::task::yield_now().await;

        handle.shutdown().await.unwrap();
        assert_eq!(launcher.launch_count("xy"), 1);
        assert_eq!(launcher.launch_count("cf"), 1);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect();
        assert!(kinds.contains(&EventKind::ShutdownRequested));
        assert_eq!(kinds.last(), Some(&EventKind::AllStoppedWithinGrace));
    }

    #[tokio::test]
    async fn test_wait_collects_terminal_states() {
        let launcher = Arc::new(
            FakeLauncher::new()
                .script("xy", [FakeRun::exit(0)])
                .script("cf", [FakeRun::SpawnError]),
        );
        let mut handle = Orchestrator::new(SupervisorConfig::default(), launcher, vec![])
            .with_service(stub("xy", false))
            .with_service(stub("cf", false))
            .start()
            .await;

        let results = handle.wait().await;
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], (ref n, Ok(ProcessState::Stopped)) if n == "xy"));
        assert!(matches!(results[1], (ref n, Err(RuntimeError::Spawn { .. })) if n == "cf"));
    }
}
