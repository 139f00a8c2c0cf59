//! # ProcessSupervisor: install and supervise one managed service.
//!
//! ```text
//! install()                          startup(token)
//!   ├─ binary present → InstallSkipped   ├─ service.plan()       (mode chosen once)
//!   └─ else           → InstallStarting  └─ spawn ProcessActor::run(token)
//!        ├─ Ok  → Installed                    └─► SupervisionHandle
//!        └─ Err → InstallFailed
//! ```
//!
//! `startup()` never waits for the process; the returned [`SupervisionHandle`]
//! resolves when supervision reaches a terminal state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::SupervisorConfig,
    core::actor::{ProcessActor, ProcessActorParams},
    error::{InstallError, RuntimeError},
    events::{Bus, Event, EventKind},
    policies::{BackoffPolicy, RestartPolicy},
    process::LauncherRef,
    services::Service,
    subscribers::ProcessState,
};

/// Lifecycle owner of one [`Service`].
pub struct ProcessSupervisor {
    service: Arc<dyn Service>,
    launcher: LauncherRef,
    bus: Bus,
    restart: RestartPolicy,
    backoff: BackoffPolicy,
}

impl ProcessSupervisor {
    /// Supervisor using the restart and backoff policies of `cfg`.
    pub fn new(
        service: Arc<dyn Service>,
        launcher: LauncherRef,
        bus: Bus,
        cfg: &SupervisorConfig,
    ) -> Self {
        Self {
            service,
            launcher,
            bus,
            restart: cfg.restart,
            backoff: cfg.backoff,
        }
    }

    pub fn name(&self) -> &str {
        self.service.name()
    }

    /// Installs the service unless its binary is already present.
    pub async fn install(&self) -> Result<(), InstallError> {
        let name = self.service.name();
        if self.service.is_installed() {
            self.bus
                .publish(Event::new(EventKind::InstallSkipped).with_service(name));
            return Ok(());
        }

        self.bus
            .publish(Event::new(EventKind::InstallStarting).with_service(name));
        match self.service.install().await {
            Ok(()) => {
                self.bus
                    .publish(Event::new(EventKind::Installed).with_service(name));
                Ok(())
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::InstallFailed)
                        .with_service(name)
                        .with_reason(format!("{}: {e}", e.as_label())),
                );
                Err(e)
            }
        }
    }

    /// Starts supervision in the background and returns immediately.
    pub fn startup(&self, token: CancellationToken) -> SupervisionHandle {
        let name: Arc<str> = self.service.name().into();
        let actor = ProcessActor::new(
            Arc::clone(&name),
            self.service.plan(),
            Arc::clone(&self.launcher),
            self.bus.clone(),
            ProcessActorParams {
                restart: self.restart,
                backoff: self.backoff,
            },
        );
        SupervisionHandle {
            name,
            join: Some(tokio::spawn(actor.run(token))),
        }
    }
}

/// Handle to a running supervision loop.
pub struct SupervisionHandle {
    name: Arc<str>,
    join: Option<JoinHandle<Result<ProcessState, RuntimeError>>>,
}

impl SupervisionHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once supervision has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Aborts the supervision task; its process is killed when dropped.
    pub fn abort(&self) {
        if let Some(join) = &self.join {
            join.abort();
        }
    }

    /// Waits for the terminal state. The result is handed out once.
    pub async fn wait(&mut self) -> Result<ProcessState, RuntimeError> {
        let Some(join) = self.join.as_mut() else {
            return Err(self.join_error("already joined".into()));
        };
        let res = join.await;
        self.join = None;
        res.unwrap_or_else(|e| Err(self.join_error(e.to_string())))
    }

    fn join_error(&self, reason: String) -> RuntimeError {
        RuntimeError::Join {
            service: self.name.to_string(),
            reason,
        }
    }
}
