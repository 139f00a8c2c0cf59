//! # Event subscribers.
//!
//! ```text
//! ProcessActor ── publish(Event) ──► Bus ──► Orchestrator listener ──► SubscriberSet
//!                                                                          │
//!                                                         ┌────────────────┼──────────┐
//!                                                         ▼                ▼          ▼
//!                                                     LogWriter      StateTracker   custom
//! ```
//!
//! - [`Subscribe`] extension point for event handlers
//! - [`SubscriberSet`] per-subscriber queues and workers, panic isolation
//! - [`LogWriter`] renders every event through `tracing`
//! - [`StateTracker`] keeps the per-service [`ProcessState`]

mod log;
mod set;
mod state;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use state::{ProcessState, StateTracker};
pub use subscribe::Subscribe;
