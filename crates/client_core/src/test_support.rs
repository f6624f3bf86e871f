use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use serde_json::Value;
use shared::protocol::ResponseEnvelope;
use tokio::net::TcpListener;

use crate::{
    dialogs::Dialogs,
    transport::{EnvelopeTransport, TransportError},
};

#[derive(Default)]
pub(crate) struct RecordingDialogs {
    alerts: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    answer: Option<String>,
}

impl RecordingDialogs {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn answering(answer: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.map(str::to_string),
            ..Self::default()
        })
    }

    pub(crate) fn alerts(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Dialogs for RecordingDialogs {
    fn alert(&self, message: &str) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn prompt(&self, message: &str) -> Option<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
        self.answer.clone()
    }
}

/// Transport that answers every call with the same envelope.
pub(crate) struct StubTransport {
    response: ResponseEnvelope,
    delay: Duration,
    calls: Mutex<Vec<(String, Value)>>,
}

impl StubTransport {
    pub(crate) fn replying(response: ResponseEnvelope) -> Self {
        Self {
            response,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EnvelopeTransport for StubTransport {
    async fn post_envelope(
        &self,
        location: &str,
        body: &Value,
    ) -> Result<ResponseEnvelope, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((location.to_string(), body.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.response.clone())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) path: String,
    pub(crate) content_type: Option<String>,
    pub(crate) body: Value,
}

#[derive(Clone)]
struct StubServerState {
    status: StatusCode,
    reply: String,
    requests: Arc<tokio::sync::Mutex<Vec<RecordedRequest>>>,
}

pub(crate) struct StubServer {
    pub(crate) url: String,
    requests: Arc<tokio::sync::Mutex<Vec<RecordedRequest>>>,
}

impl StubServer {
    pub(crate) async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

async fn handle_envelope(
    State(state): State<StubServerState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.requests.lock().await.push(RecordedRequest {
        path: uri.path().to_string(),
        content_type,
        body,
    });
    (
        state.status,
        [(header::CONTENT_TYPE, "application/json")],
        state.reply.clone(),
    )
}

/// Serves `reply` with `status` for every POST, recording what was received.
pub(crate) async fn spawn_envelope_server(status: StatusCode, reply: Value) -> StubServer {
    spawn_raw_server(status, reply.to_string()).await
}

pub(crate) async fn spawn_raw_server(status: StatusCode, reply: impl Into<String>) -> StubServer {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let requests = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let state = StubServerState {
        status,
        reply: reply.into(),
        requests: Arc::clone(&requests),
    };
    let app = Router::new().fallback(handle_envelope).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    StubServer {
        url: format!("http://{addr}"),
        requests,
    }
}

/// A location nothing listens on.
pub(crate) async fn refused_location() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/api/data")
}
