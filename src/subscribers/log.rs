//! # LogWriter: renders events through `tracing`
//!
//! Every lifecycle transition and exit code becomes one structured log record.
//! Non-zero exits are logged at `info`: they are a supervised condition, not an error.
//!
//! ```text
//! INFO  service="cf" attempt=1 starting process
//! INFO  service="cf" attempt=1 code=Some(1) process exited
//! INFO  service="cf" delay_ms=3000 restarting after backoff
//! INFO  service="cf" host="foo-bar.trycloudflare.com" tunnel host discovered
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let service = e.service.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::InstallStarting => info!(service, "installing"),
            EventKind::InstallSkipped => info!(service, "already installed, skip install"),
            EventKind::Installed => info!(service, "installed successfully"),
            EventKind::InstallFailed => error!(service, reason, "install failed"),
            EventKind::ProcessStarting => info!(service, attempt = ?e.attempt, "starting process"),
            EventKind::ProcessSpawnFailed => {
                error!(service, attempt = ?e.attempt, reason, "process failed to spawn")
            }
            EventKind::ProcessExited => {
                info!(service, attempt = ?e.attempt, code = ?e.exit_code, "process exited")
            }
            EventKind::BackoffScheduled => {
                info!(service, code = ?e.exit_code, delay_ms = ?e.delay_ms, "restarting after backoff")
            }
            EventKind::SupervisionStopped => info!(service, "supervision stopped"),
            EventKind::SupervisionFailed => warn!(service, code = ?e.exit_code, "supervision ended after failure"),
            EventKind::SupervisionCancelled => debug!(service, "supervision cancelled"),
            EventKind::FactDiscovered => {
                info!(service, host = ?e.host.as_deref(), "tunnel host discovered")
            }
            EventKind::ArtifactsRegenerated => info!(service, reason, "artifacts regenerated"),
            EventKind::ArtifactWriteFailed => warn!(service, reason, "artifact write failed"),
            EventKind::ShutdownRequested => info!("shutdown requested"),
            EventKind::AllStoppedWithinGrace => info!("all supervisors stopped within grace"),
            EventKind::GraceExceeded => warn!("grace period exceeded"),
            EventKind::SubscriberOverflow => warn!(subscriber = service, reason, "subscriber overflow"),
            EventKind::SubscriberPanicked => error!(subscriber = service, reason, "subscriber panicked"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
