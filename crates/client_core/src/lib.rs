//! Client-side binding layer between form controls and JSON-over-HTTP
//! endpoints.
//!
//! All four entry points ([`FormClient::submit_data`], [`FormClient::submit_form`],
//! [`FormClient::create_resource`] and [`FormClient::bind_form`]) are terminal
//! boundaries: failures reach the user through a blocking alert or not at all,
//! and always reach the diagnostic channel.

use std::sync::Arc;

use serde::Serialize;
use shared::{
    domain::{ControlState, ElementId, FieldBinding, RearmPolicy},
    error::Failure,
    protocol::ResponseEnvelope,
};
use tokio::sync::broadcast;

pub mod binder;
pub mod create;
pub mod dialogs;
pub mod diagnostics;
pub mod form;
pub mod guard;
pub mod instructions;
pub mod invoker;
pub mod registry;
pub mod surface;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use binder::{FormBinder, PageEvent};
pub use create::{CreateRequest, ResourceCreator};
pub use dialogs::{Dialogs, HeadlessDialogs};
pub use diagnostics::Diagnostics;
pub use form::{FormController, FormRequest};
pub use registry::FormRegistry;
pub use surface::{MemorySurface, Node, Surface, SurfaceError};
pub use transport::{EnvelopeTransport, HttpEnvelopeTransport, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Alert text for responses outside the success status range.
    pub failure_message: String,
    pub rearm_policy: RearmPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            failure_message: transport::DEFAULT_FAILURE_MESSAGE.to_string(),
            rearm_policy: RearmPolicy::default(),
        }
    }
}

pub struct FormClient {
    transport: Arc<dyn EnvelopeTransport>,
    forms: Arc<FormController>,
    binder: FormBinder,
    creator: ResourceCreator,
    diagnostics: Diagnostics,
}

impl FormClient {
    /// Client talking HTTP through `reqwest`.
    pub fn new(
        surface: Arc<dyn Surface>,
        dialogs: Arc<dyn Dialogs>,
        options: ClientOptions,
    ) -> Self {
        let transport = Arc::new(HttpEnvelopeTransport::with_client(
            reqwest::Client::new(),
            Arc::clone(&dialogs),
            options.failure_message.clone(),
        ));
        Self::new_with_transport(transport, surface, dialogs, options)
    }

    pub fn new_with_transport(
        transport: Arc<dyn EnvelopeTransport>,
        surface: Arc<dyn Surface>,
        dialogs: Arc<dyn Dialogs>,
        options: ClientOptions,
    ) -> Self {
        let diagnostics = Diagnostics::new();
        let guard = guard::InFlightGuard::new();
        let forms = Arc::new(FormController::new(
            Arc::clone(&transport),
            Arc::clone(&surface),
            Arc::clone(&guard),
            diagnostics.clone(),
        ));
        let binder = FormBinder::new(
            Arc::clone(&forms),
            Arc::clone(&surface),
            options.rearm_policy,
            diagnostics.clone(),
        );
        let creator = ResourceCreator::new(
            Arc::clone(&transport),
            surface,
            dialogs,
            guard,
            diagnostics.clone(),
        );
        Self {
            transport,
            forms,
            binder,
            creator,
            diagnostics,
        }
    }

    /// Posts `data` and returns the parsed envelope, or `None` on any failure.
    pub async fn submit_data<T>(&self, location: &str, data: &T) -> Option<ResponseEnvelope>
    where
        T: Serialize + ?Sized,
    {
        invoker::submit_data(self.transport.as_ref(), &self.diagnostics, location, data).await
    }

    pub async fn submit_form(
        &self,
        location: &str,
        binding: FieldBinding,
        target: impl Into<ElementId>,
        control: impl Into<ElementId>,
    ) {
        let request = FormRequest::new(location, binding, target, control);
        self.forms.submit_form(&request).await;
    }

    pub async fn create_resource(
        &self,
        base: &str,
        kind: &str,
        prefix: &str,
        insertion_point: impl Into<ElementId>,
    ) {
        let request = CreateRequest::new(base, kind, prefix, insertion_point);
        self.creator.create_resource(&request).await;
    }

    pub async fn bind_form(
        &self,
        location: &str,
        binding: FieldBinding,
        target: impl Into<ElementId>,
        control: impl Into<ElementId>,
    ) {
        let request = FormRequest::new(location, binding, target, control);
        self.binder.bind_form(request).await;
    }

    /// Routes a host event to the handlers registered by [`Self::bind_form`].
    pub async fn dispatch(&self, event: PageEvent) {
        self.binder.dispatch(event).await;
    }

    pub async fn control_state(&self, control: &ElementId) -> Option<ControlState> {
        self.binder.control_state(control).await
    }

    pub fn subscribe_diagnostics(&self) -> broadcast::Receiver<Failure> {
        self.diagnostics.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
