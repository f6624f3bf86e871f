use serde::{Deserialize, Serialize};

/// How a call through the envelope transport ended up failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// HTTP status outside the success range.
    TransportStatus,
    /// `ok` was false or missing.
    ApplicationRejection,
    /// The request never produced a readable response.
    NetworkFailure,
    /// A follow-up fragment could not be applied.
    FragmentExecution,
    /// The local surface did not have an element the call needed.
    Surface,
}

/// One entry on the diagnostic channel: what failed and the logged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
