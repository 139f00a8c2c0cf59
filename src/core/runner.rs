//! # Run a single process instance.
//!
//! Launches one instance of a service, pumps its captured output into a fresh
//! [`LineSink`], and waits for it to exit or for cancellation.
//!
//! ## Event flow
//!
//! ```text
//! Exit:
//!   launch() → [lines → sink] → wait() → publish ProcessExited(code)
//!
//! Cancellation (while streaming or waiting):
//!   token.cancelled() → kill() → publish ProcessExited(None) → Outcome::Cancelled
//!
//! Spawn failure:
//!   launch() → Err(io)                   (no event here; the actor reports it)
//! ```
//!
//! ## Rules
//! - Lines reach the sink in emission order, on the supervising task.
//! - The line stream is drained to EOF before the exit status is read.
//! - A failed `wait()` is reported as an exit without code (a failure).

use std::io;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::events::{Bus, Event, EventKind};
use crate::process::{CommandSpec, Launcher, LineSink, ProcessExit, RunningProcess};

/// How one instance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// The process exited on its own.
    Exited(ProcessExit),
    /// Cancellation fired and the process was killed.
    Cancelled,
}

/// Runs one instance of `cmd`, publishing [`EventKind::ProcessExited`] to `bus`.
///
/// Returns `Err` only when the process could not be spawned.
pub(crate) async fn run_once(
    launcher: &dyn Launcher,
    cmd: &CommandSpec,
    mut sink: Box<dyn LineSink>,
    token: &CancellationToken,
    service: &str,
    attempt: u32,
    bus: &Bus,
) -> io::Result<Outcome> {
    let mut child = launcher.launch(cmd).await?;

    if let Some(mut lines) = child.take_lines() {
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                line = lines.recv() => Some(line),
            };
            match next {
                None => return Ok(cancel(child.as_mut(), service, attempt, bus).await),
                Some(Some(line)) => sink.on_line(&line),
                Some(None) => break,
            }
        }
    }

    let waited = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        res = child.wait() => Some(res),
    };
    let exit = match waited {
        None => return Ok(cancel(child.as_mut(), service, attempt, bus).await),
        Some(Ok(exit)) => exit,
        Some(Err(e)) => {
            warn!(service, attempt, error = %e, "failed to read exit status");
            ProcessExit::new(None)
        }
    };

    publish_exited(bus, service, attempt, exit.code());
    Ok(Outcome::Exited(exit))
}

async fn cancel(
    child: &mut dyn RunningProcess,
    service: &str,
    attempt: u32,
    bus: &Bus,
) -> Outcome {
    if let Err(e) = child.kill().await {
        warn!(service, attempt, error = %e, "failed to kill process");
    }
    publish_exited(bus, service, attempt, None);
    Outcome::Cancelled
}

fn publish_exited(bus: &Bus, service: &str, attempt: u32, code: Option<i32>) {
    bus.publish(
        Event::new(EventKind::ProcessExited)
            .with_service(service)
            .with_attempt(attempt)
            .with_exit_code(code),
    );
}
