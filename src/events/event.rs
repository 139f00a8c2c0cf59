//! # Runtime events emitted by supervisors, the orchestrator and the tunnel propagator.
//!
//! Each [`Event`] has a globally unique sequence number (`seq`) that increases
//! monotonically; use it to restore order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use proxyvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ProcessExited)
//!     .with_service("cf")
//!     .with_attempt(2)
//!     .with_exit_code(Some(1));
//!
//! assert_eq!(ev.kind, EventKind::ProcessExited);
//! assert_eq!(ev.service.as_deref(), Some("cf"));
//! assert_eq!(ev.exit_code, Some(1));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Install ===
    /// Install of a service started (binary absent).
    InstallStarting,
    /// Binary already present; install skipped.
    InstallSkipped,
    /// Install finished successfully.
    Installed,
    /// Install failed; `reason` carries the error. The service will not be started.
    InstallFailed,

    // === Process lifecycle ===
    /// Process is being launched.
    ///
    /// Sets `service`, `attempt` (1-based, per supervisor).
    ProcessStarting,
    /// Process could not be spawned. Terminal for that supervisor.
    ///
    /// Sets `service`, `attempt`, `reason`.
    ProcessSpawnFailed,
    /// Process exited.
    ///
    /// Sets `service`, `attempt`, `exit_code` (`None` when killed by a signal).
    ProcessExited,
    /// Relaunch scheduled after a non-zero exit.
    ///
    /// Sets `service`, `attempt` (the one that failed), `delay_ms`, `exit_code`.
    BackoffScheduled,
    /// Supervision ended after a clean exit (terminal `Stopped`).
    SupervisionStopped,
    /// Supervision ended after a failure the restart policy does not retry.
    SupervisionFailed,
    /// Supervision ended because its cancellation token fired.
    SupervisionCancelled,

    // === Discovery and artifacts ===
    /// A runtime fact was discovered in process output.
    ///
    /// Sets `service`, `host`.
    FactDiscovered,
    /// Derived artifacts were rewritten.
    ArtifactsRegenerated,
    /// Writing a derived artifact failed; `reason` carries the error.
    ArtifactWriteFailed,

    // === Shutdown ===
    /// Shutdown requested (signal or explicit call).
    ShutdownRequested,
    /// All supervisors stopped within the grace period.
    AllStoppedWithinGrace,
    /// Grace period exceeded; some supervisors did not stop in time.
    GraceExceeded,

    // === Subscribers ===
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Managed service name (or subscriber name for subscriber events).
    pub service: Option<Arc<str>>,
    /// Launch attempt (starting from 1).
    pub attempt: Option<u32>,
    /// Process exit code; stays `None` after a signal kill.
    pub exit_code: Option<i32>,
    /// Relaunch delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Discovered host, for [`EventKind::FactDiscovered`].
    pub host: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            attempt: None,
            exit_code: None,
            delay_ms: None,
            reason: None,
            host: None,
        }
    }

    /// Attaches a service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches an exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    /// Attaches a relaunch delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a discovered host.
    #[inline]
    pub fn with_host(mut self, host: impl Into<Arc<str>>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Relaunch delay as a [`Duration`], if set.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_service(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_service(subscriber)
            .with_reason(info)
    }
}
