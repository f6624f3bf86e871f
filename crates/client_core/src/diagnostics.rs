use shared::error::{Failure, FailureKind};
use tokio::sync::broadcast;
use tracing::error;

/// Diagnostic channel for failures swallowed at a public entry point.
///
/// Every report is logged through `tracing` and broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    events: broadcast::Sender<Failure>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self { events }
    }

    pub fn report(&self, operation: &'static str, location: &str, kind: FailureKind, message: String) {
        error!(operation, location = %location, kind = ?kind, "error sending POST request: {message}");
        let _ = self.events.send(Failure::new(kind, message));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Failure> {
        self.events.subscribe()
    }
}
