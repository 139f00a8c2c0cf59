//! # Per-service lifecycle tracker with sequence-based ordering.
//!
//! Maintains the last known [`ProcessState`] of every managed service, using event
//! sequence numbers to reject out-of-order delivery.
//!
//! ```text
//! NotInstalled ──► Installed ──► Running ⇄ Restarting
//!                                   │
//!                                   ├──► Stopped    (exit code 0)
//!                                   ├──► Failed     (spawn failure / no retry)
//!                                   └──► Cancelled  (shutdown)
//! ```
//!
//! ## Rules
//! - Events with `seq <= last_seq` for the same service are **rejected** (stale).
//! - Events that don't map to a state still advance `last_seq`.
//! - Reads are eventually consistent with the bus.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Lifecycle state of one managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Binary absent (or install failed).
    NotInstalled,
    /// Binary present, supervision not started yet.
    Installed,
    /// A process instance is alive.
    Running,
    /// Last instance exited non-zero; waiting out the backoff.
    Restarting,
    /// Terminal: last instance exited cleanly.
    Stopped,
    /// Terminal: process could not be spawned, or the restart policy gave up.
    Failed,
    /// Terminal: supervision was cancelled.
    Cancelled,
}

impl ProcessState {
    /// Returns `true` for states that end supervision.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessState::Stopped | ProcessState::Failed | ProcessState::Cancelled
        )
    }

    fn from_event(kind: EventKind) -> Option<Self> {
        Some(match kind {
            EventKind::InstallStarting | EventKind::InstallFailed => ProcessState::NotInstalled,
            EventKind::InstallSkipped | EventKind::Installed => ProcessState::Installed,
            EventKind::ProcessStarting => ProcessState::Running,
            EventKind::BackoffScheduled => ProcessState::Restarting,
            EventKind::SupervisionStopped => ProcessState::Stopped,
            EventKind::ProcessSpawnFailed | EventKind::SupervisionFailed => ProcessState::Failed,
            EventKind::SupervisionCancelled => ProcessState::Cancelled,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    last_seq: Option<u64>,
    state: Option<ProcessState>,
}

/// Thread-safe tracker of per-service state.
///
/// The orchestrator always includes one instance in its subscriber set and answers
/// state queries from it.
#[derive(Default)]
pub struct StateTracker {
    state: RwLock<HashMap<String, Tracked>>,
}

impl StateTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an event if it is newer than the last one seen for its service.
    ///
    /// Returns `true` when the service's state changed.
    pub async fn update(&self, ev: &Event) -> bool {
        let Some(name) = ev.service.as_deref() else {
            return false;
        };
        if matches!(
            ev.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        ) {
            return false;
        }

        let mut map = self.state.write().await;
        let entry = map.entry(name.to_string()).or_insert(Tracked {
            last_seq: None,
            state: None,
        });
        if entry.last_seq.is_some_and(|last| ev.seq <= last) {
            return false;
        }
        entry.last_seq = Some(ev.seq);

        match ProcessState::from_event(ev.kind) {
            Some(next) if entry.state != Some(next) => {
                entry.state = Some(next);
                true
            }
            _ => false,
        }
    }

    /// Returns the last known state of `service`.
    pub async fn state(&self, service: &str) -> Option<ProcessState> {
        self.state
            .read()
            .await
            .get(service)
            .and_then(|t| t.state)
    }

    /// Returns the sorted names of services whose supervision has not ended.
    pub async fn active(&self) -> Vec<String> {
        let map = self.state.read().await;
        let mut names: Vec<String> = map
            .iter()
            .filter(|(_, t)| {
                matches!(
                    t.state,
                    Some(ProcessState::Running | ProcessState::Restarting)
                )
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl Subscribe for StateTracker {
    async fn on_event(&self, event: &Event) {
        self.update(event).await;
    }

    fn name(&self) -> &'static str {
        "StateTracker"
    }

    fn queue_capacity(&self) -> usize {
        2048
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(kind: EventKind) -> Event {
        Event::new(kind).with_service("cf")
    }

    #[tokio::test]
    async fn test_crash_loop_transitions() {
        let tracker = StateTracker::new();
        assert!(tracker.update(&ev(EventKind::Installed)).await);
        assert_eq!(tracker.state("cf").await, Some(ProcessState::Installed));

        tracker.update(&ev(EventKind::ProcessStarting)).await;
        assert_eq!(tracker.active().await, vec!["cf".to_string()]);

        tracker.update(&ev(EventKind::ProcessExited)).await;
        tracker.update(&ev(EventKind::BackoffScheduled)).await;
        assert_eq!(tracker.state("cf").await, Some(ProcessState::Restarting));

        tracker.update(&ev(EventKind::ProcessStarting)).await;
        tracker.update(&ev(EventKind::SupervisionStopped)).await;
        let state = tracker.state("cf").await;
        assert_eq!(state, Some(ProcessState::Stopped));
        assert!(state.is_some_and(|s| s.is_terminal()));
        assert!(tracker.active().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_event_rejected() {
        let tracker = StateTracker::new();
        let older = ev(EventKind::ProcessStarting);
        let newer = ev(EventKind::SupervisionStopped);

        assert!(tracker.update(&newer).await);
        assert!(!tracker.update(&older).await);
        assert_eq!(tracker.state("cf").await, Some(ProcessState::Stopped));
    }

    #[tokio::test]
    async fn test_events_without_service_ignored() {
        let tracker = StateTracker::new();
        assert!(!tracker.update(&Event::new(EventKind::ShutdownRequested)).await);
        assert!(tracker.state("cf").await.is_none());
    }
}
