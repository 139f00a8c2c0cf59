//! # ProcessActor: single-service supervisor loop.
//!
//! Supervises one managed service with policies:
//! - relaunches per [`RestartPolicy`],
//! - delays per [`BackoffPolicy`],
//! - cooperative cancellation via [`CancellationToken`].
//!
//! ## Architecture
//! ```text
//! loop {
//!   ├─► publish ProcessStarting
//!   ├─► run_once(plan.command(), plan.sink()) ──► launch, stream lines, wait
//!   │       ├─► Err(spawn)   → publish ProcessSpawnFailed → return Err
//!   │       ├─► Cancelled    → publish SupervisionCancelled → return Cancelled
//!   │       └─► Exited(code)
//!   ├─► apply RestartPolicy
//!   │     ├─► code 0, Never/OnFailure → publish SupervisionStopped → return Stopped
//!   │     ├─► code≠0, Never          → publish SupervisionFailed  → return Failed
//!   │     └─► otherwise              → publish BackoffScheduled
//!   └─► sleep(delay) or cancellation
//! }
//! ```
//!
//! ## Rules
//! - Instances run **sequentially** within one actor (never overlapping).
//! - The attempt counter is monotonic; every relaunch waits the same fixed delay.
//! - Cancellation is checked before each launch, while the process runs, and
//!   during the backoff sleep.

use std::sync::Arc;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::{
    core::runner::{Outcome, run_once},
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    policies::{BackoffPolicy, RestartPolicy},
    process::{LauncherRef, RunPlan},
    subscribers::ProcessState,
};

/// Supervision parameters of one actor.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ProcessActorParams {
    pub restart: RestartPolicy,
    pub backoff: BackoffPolicy,
}

/// Runs one service until a terminal state.
pub(crate) struct ProcessActor {
    service: Arc<str>,
    plan: Box<dyn RunPlan>,
    launcher: LauncherRef,
    bus: Bus,
    params: ProcessActorParams,
}

impl ProcessActor {
    pub(crate) fn new(
        service: Arc<str>,
        plan: Box<dyn RunPlan>,
        launcher: LauncherRef,
        bus: Bus,
        params: ProcessActorParams,
    ) -> Self {
        Self {
            service,
            plan,
            launcher,
            bus,
            params,
        }
    }

    /// Runs the actor loop.
    ///
    /// Returns the terminal state (`Stopped`, `Failed` or `Cancelled`), or
    /// [`RuntimeError::Spawn`] if an instance could not be started.
    pub(crate) async fn run(self, token: CancellationToken) -> Result<ProcessState, RuntimeError> {
        let mut attempt: u32 = 0;

        loop {
            if token.is_cancelled() {
                return Ok(self.cancelled());
            }

            attempt = attempt.saturating_add(1);
            self.publish(Event::new(EventKind::ProcessStarting).with_attempt(attempt));

            let cmd = self.plan.command();
            let sink = self.plan.sink();
            let outcome = match run_once(
                self.launcher.as_ref(),
                &cmd,
                sink,
                &token,
                &self.service,
                attempt,
                &self.bus,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(source) => {
                    self.publish(
                        Event::new(EventKind::ProcessSpawnFailed)
                            .with_attempt(attempt)
                            .with_reason(source.to_string()),
                    );
                    return Err(RuntimeError::Spawn {
                        service: self.service.to_string(),
                        source,
                    });
                }
            };

            let exit = match outcome {
                Outcome::Cancelled => return Ok(self.cancelled()),
                Outcome::Exited(exit) => exit,
            };

            if exit.success() {
                self.publish(
                    Event::new(EventKind::SupervisionStopped)
                        .with_attempt(attempt)
                        .with_exit_code(exit.code()),
                );
                return Ok(ProcessState::Stopped);
            }
            if !self.params.restart.retries_failure() {
                self.publish(
                    Event::new(EventKind::SupervisionFailed)
                        .with_attempt(attempt)
                        .with_exit_code(exit.code()),
                );
                return Ok(ProcessState::Failed);
            }

            let delay = self.params.backoff.delay();
            self.publish(
                Event::new(EventKind::BackoffScheduled)
                    .with_attempt(attempt)
                    .with_exit_code(exit.code())
                    .with_delay(delay),
            );

            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = token.cancelled() => return Ok(self.cancelled()),
            }
        }
    }

    fn cancelled(&self) -> ProcessState {
        self.publish(Event::new(EventKind::SupervisionCancelled));
        ProcessState::Cancelled
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_service(Arc::clone(&self.service)));
    }
}
