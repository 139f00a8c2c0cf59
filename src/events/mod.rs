//! # Runtime events.
//!
//! - [`Event`] a lifecycle fact with a global sequence number and optional metadata
//! - [`EventKind`] classification (install / process / discovery / shutdown / subscriber)
//! - [`Bus`] broadcast channel that carries events from supervisors to subscribers

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
