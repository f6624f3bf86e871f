use std::sync::Arc;

use shared::{
    domain::{ElementId, FieldBinding},
    error::FailureKind,
    protocol::{FormEnvelope, ResponseEnvelope},
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    diagnostics::Diagnostics,
    guard::InFlightGuard,
    instructions::{apply_fragments, InstructionError},
    registry::FormRegistry,
    surface::{Surface, SurfaceError},
    transport::{EnvelopeTransport, TransportError},
};

/// Everything a form submission is parameterized by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest {
    pub location: String,
    pub binding: FieldBinding,
    pub target: ElementId,
    pub control: ElementId,
}

impl FormRequest {
    pub fn new(
        location: impl Into<String>,
        binding: FieldBinding,
        target: impl Into<ElementId>,
        control: impl Into<ElementId>,
    ) -> Self {
        Self {
            location: location.into(),
            binding,
            target: target.into(),
            control: control.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("failed to read field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: SurfaceError,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to render into '{target}': {source}")]
    Render {
        target: ElementId,
        #[source]
        source: SurfaceError,
    },
    #[error(transparent)]
    Fragment(#[from] InstructionError),
}

impl FormError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Field { .. } | Self::Render { .. } => FailureKind::Surface,
            Self::Transport(err) => err.kind(),
            Self::Fragment(_) => FailureKind::FragmentExecution,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Rendered { fragments_applied: usize },
    Rejected,
    /// The control already had a request outstanding; nothing was sent.
    Busy,
}

pub struct FormController {
    transport: Arc<dyn EnvelopeTransport>,
    surface: Arc<dyn Surface>,
    guard: Arc<InFlightGuard>,
    forms: Arc<FormRegistry>,
    diagnostics: Diagnostics,
}

impl FormController {
    pub fn new(
        transport: Arc<dyn EnvelopeTransport>,
        surface: Arc<dyn Surface>,
        guard: Arc<InFlightGuard>,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            transport,
            surface,
            guard,
            forms: FormRegistry::new(),
            diagnostics,
        }
    }

    /// Handlers of the forms bound through this controller's responses.
    pub fn registry(&self) -> &Arc<FormRegistry> {
        &self.forms
    }

    /// Submits the bound fields and renders the response into the target.
    /// Failures are logged; nothing propagates.
    pub async fn submit_form(&self, request: &FormRequest) {
        match self.try_submit_form(request).await {
            Ok(outcome) => debug!(location = %request.location, ?outcome, "form submitted"),
            Err(err) => self.report(request, &err),
        }
    }

    pub fn is_in_flight(&self, control: &ElementId) -> bool {
        self.guard.is_in_flight(control)
    }

    pub(crate) fn report(&self, request: &FormRequest, err: &FormError) {
        self.diagnostics
            .report("submit_form", &request.location, err.kind(), err.to_string());
    }

    pub(crate) async fn try_submit_form(
        &self,
        request: &FormRequest,
    ) -> Result<SubmitOutcome, FormError> {
        let Some(_ticket) = self.guard.try_acquire(&request.control) else {
            info!(control = %request.control, "submission already in flight");
            return Ok(SubmitOutcome::Busy);
        };

        // The control stays disabled while its own request is outstanding.
        let restore_disabled = match self.surface.is_disabled(&request.control) {
            Ok(disabled) => {
                self.set_control_disabled(&request.control, true);
                Some(disabled)
            }
            Err(err) => {
                warn!(control = %request.control, "control not on surface: {err}");
                None
            }
        };

        let response = self.exchange(request).await;

        // Restored before rendering, so fragments that re-bind the control win.
        if let Some(disabled) = restore_disabled {
            self.set_control_disabled(&request.control, disabled);
        }
        let response = response?;
        if !response.ok {
            return Ok(SubmitOutcome::Rejected);
        }
        self.render(request, &response)
    }

    async fn exchange(&self, request: &FormRequest) -> Result<ResponseEnvelope, FormError> {
        let envelope = self.read_fields(&request.binding)?;
        let body = serde_json::to_value(&envelope).map_err(TransportError::Encode)?;
        Ok(self
            .transport
            .post_envelope(&request.location, &body)
            .await?)
    }

    fn render(
        &self,
        request: &FormRequest,
        response: &ResponseEnvelope,
    ) -> Result<SubmitOutcome, FormError> {
        self.surface
            .replace_content(&request.target, response.markup())
            .map_err(|source| FormError::Render {
                target: request.target.clone(),
                source,
            })?;
        let fragments_applied = apply_fragments(
            self.surface.as_ref(),
            &self.forms,
            &request.location,
            &response.code,
        )?;
        Ok(SubmitOutcome::Rendered { fragments_applied })
    }

    fn read_fields(&self, binding: &FieldBinding) -> Result<FormEnvelope, FormError> {
        binding
            .iter()
            .map(|(field, element)| {
                self.surface
                    .value(element)
                    .map(|value| (field.to_string(), value))
                    .map_err(|source| FormError::Field {
                        field: field.to_string(),
                        source,
                    })
            })
            .collect()
    }

    fn set_control_disabled(&self, control: &ElementId, disabled: bool) {
        if let Err(err) = self.surface.set_disabled(control, disabled) {
            warn!(control = %control, "failed to update control: {err}");
        }
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
