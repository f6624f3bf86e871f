//! Blocking user-facing dialogs: the only user-visible failure channel.

use tracing::warn;

pub trait Dialogs: Send + Sync {
    /// Shows `message` and blocks until the user dismisses it.
    fn alert(&self, message: &str);
    /// Asks for a line of text. `None` means the user cancelled.
    fn prompt(&self, message: &str) -> Option<String>;
}

/// Dialogs for headless hosts: alerts are only logged and every prompt is
/// treated as cancelled.
pub struct HeadlessDialogs;

impl Dialogs for HeadlessDialogs {
    fn alert(&self, message: &str) {
        warn!("alert suppressed on headless host: {message}");
    }

    fn prompt(&self, message: &str) -> Option<String> {
        warn!("prompt cancelled on headless host: {message}");
        None
    }
}
