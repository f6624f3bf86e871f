use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::{error::FailureKind, protocol::ResponseEnvelope};
use thiserror::Error;
use tracing::{debug, warn};

use crate::dialogs::Dialogs;

/// Alert text for responses outside the success status range.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },
    #[error("request to {location} failed: {source}")]
    Network {
        location: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("response from {location} is not a JSON envelope: {source}")]
    Decode {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("request envelope could not be serialized: {0}")]
    Encode(#[source] serde_json::Error),
}

impl TransportError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Status { .. } => FailureKind::TransportStatus,
            Self::Network { .. } | Self::Decode { .. } | Self::Encode(_) => {
                FailureKind::NetworkFailure
            }
        }
    }
}

/// A single JSON POST normalized into a parsed envelope.
///
/// Implementations alert the user on an HTTP failure (and return
/// [`TransportError::Status`]) and on an application rejection (and still
/// return the envelope). Nothing else is surfaced to the user.
#[async_trait]
pub trait EnvelopeTransport: Send + Sync {
    async fn post_envelope(
        &self,
        location: &str,
        body: &Value,
    ) -> Result<ResponseEnvelope, TransportError>;
}

pub struct HttpEnvelopeTransport {
    http: Client,
    dialogs: Arc<dyn Dialogs>,
    failure_message: String,
}

impl HttpEnvelopeTransport {
    pub fn new(dialogs: Arc<dyn Dialogs>) -> Self {
        Self::with_client(Client::new(), dialogs, DEFAULT_FAILURE_MESSAGE)
    }

    pub fn with_client(
        http: Client,
        dialogs: Arc<dyn Dialogs>,
        failure_message: impl Into<String>,
    ) -> Self {
        Self {
            http,
            dialogs,
            failure_message: failure_message.into(),
        }
    }
}

#[async_trait]
impl EnvelopeTransport for HttpEnvelopeTransport {
    async fn post_envelope(
        &self,
        location: &str,
        body: &Value,
    ) -> Result<ResponseEnvelope, TransportError> {
        debug!(location = %location, "posting envelope");
        let response = self
            .http
            .post(location)
            .json(body)
            .send()
            .await
            .map_err(|source| TransportError::Network {
                location: location.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(location = %location, status = status.as_u16(), "envelope request failed");
            self.dialogs.alert(&self.failure_message);
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| TransportError::Network {
                location: location.to_string(),
                source,
            })?;
        let envelope: ResponseEnvelope =
            serde_json::from_slice(&bytes).map_err(|source| TransportError::Decode {
                location: location.to_string(),
                source,
            })?;

        if !envelope.ok {
            warn!(location = %location, status = %envelope.rejection_message(), "envelope rejected");
            self.dialogs.alert(envelope.rejection_message());
        }
        Ok(envelope)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
