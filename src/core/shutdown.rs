//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves on the first of `SIGINT`, `SIGTERM` or
//! `SIGQUIT` and reports which one arrived. The foreground shell session races
//! against it; whichever finishes first starts the orchestrator shutdown.

use tracing::info;

/// Waits for a termination signal and returns its name.
///
/// Listeners are registered per call. Fails only if registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    info!(signal = name, "termination signal received");
    Ok(name)
}

/// Waits for Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    info!(signal = "ctrl-c", "termination signal received");
    Ok("ctrl-c")
}
