//! Consumers of captured process output.

use std::sync::Arc;

use tracing::info;

/// Receives each captured output line of one process instance, in emission order.
///
/// A fresh sink is created for every launch.
pub trait LineSink: Send {
    fn on_line(&mut self, line: &str);
}

/// Forwards every line to the log, tagged with the service name.
pub struct LogSink {
    service: Arc<str>,
}

impl LogSink {
    pub fn new(service: impl Into<Arc<str>>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl LineSink for LogSink {
    fn on_line(&mut self, line: &str) {
        info!(service = %self.service, "{line}");
    }
}
