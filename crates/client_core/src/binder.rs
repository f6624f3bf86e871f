use std::sync::Arc;

use shared::{
    domain::{ControlState, ElementId, RearmPolicy},
    error::FailureKind,
};
use tracing::debug;

use crate::{
    diagnostics::Diagnostics,
    form::{FormController, FormRequest, SubmitOutcome},
    registry::{BoundForm, FormRegistry},
    surface::Surface,
};

/// Host events routed to the handlers registered by [`FormBinder::bind_form`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    Input { element: ElementId },
    Activate { element: ElementId },
}

/// Dirty-tracking binder: a bound control starts `Armed` (disabled) and
/// turns `Dirty` (enabled) on the first input to any of its fields.
///
/// Handlers live in the controller's [`FormRegistry`], so forms bound by a
/// response fragment behave exactly like forms bound here.
pub struct FormBinder {
    controller: Arc<FormController>,
    forms: Arc<FormRegistry>,
    surface: Arc<dyn Surface>,
    policy: RearmPolicy,
    diagnostics: Diagnostics,
}

impl FormBinder {
    pub fn new(
        controller: Arc<FormController>,
        surface: Arc<dyn Surface>,
        policy: RearmPolicy,
        diagnostics: Diagnostics,
    ) -> Self {
        let forms = Arc::clone(controller.registry());
        Self {
            controller,
            forms,
            surface,
            policy,
            diagnostics,
        }
    }

    /// Disables the control and registers its activation handler and the
    /// input handlers of every bound field. Binding a control or a field again
    /// replaces the earlier handler.
    pub async fn bind_form(&self, request: FormRequest) {
        let location = request.location.clone();
        if let Err(err) = self.forms.bind(self.surface.as_ref(), request) {
            self.diagnostics
                .report("bind_form", &location, FailureKind::Surface, err.to_string());
        }
    }

    pub async fn dispatch(&self, event: PageEvent) {
        match event {
            PageEvent::Input { element } => self.handle_input(&element).await,
            PageEvent::Activate { element } => self.handle_activate(&element).await,
        }
    }

    pub async fn control_state(&self, control: &ElementId) -> Option<ControlState> {
        let form = self.forms.form_for_control(control)?;
        let state = form.state.lock().await;
        Some(state.control)
    }

    async fn handle_input(&self, element: &ElementId) {
        let Some(form) = self.forms.form_for_input(element) else {
            return;
        };

        let mut state = form.state.lock().await;
        state.control = state.control.on_input();
        if state.submitting {
            // Settled once the submission finishes.
            state.edited_in_flight = true;
            return;
        }
        self.set_enabled(&form, true);
    }

    async fn handle_activate(&self, element: &ElementId) {
        let Some(form) = self.forms.form_for_control(element) else {
            return;
        };

        match self.surface.is_disabled(element) {
            Ok(false) => {}
            Ok(true) => {
                debug!(control = %element, "activation ignored, control disabled");
                return;
            }
            Err(err) => {
                self.diagnostics.report(
                    "submit_form",
                    &form.request.location,
                    FailureKind::Surface,
                    err.to_string(),
                );
                return;
            }
        }

        {
            let mut state = form.state.lock().await;
            state.submitting = true;
            state.edited_in_flight = false;
        }
        let rendered = match self.controller.try_submit_form(&form.request).await {
            Ok(SubmitOutcome::Rendered { .. }) => true,
            Ok(outcome) => {
                debug!(control = %element, ?outcome, "form not rendered");
                false
            }
            Err(err) => {
                self.controller.report(&form.request, &err);
                false
            }
        };
        self.settle_after_submit(&form, rendered).await;
    }

    async fn settle_after_submit(&self, form: &Arc<BoundForm>, rendered: bool) {
        let mut state = form.state.lock().await;
        state.submitting = false;
        if std::mem::take(&mut state.edited_in_flight) {
            // An edit made during the request keeps the control dirty.
            if self.still_shown(form) {
                self.set_enabled(form, true);
            }
            return;
        }
        if !rendered {
            return;
        }
        let next = state.control.after_submit(self.policy);
        if next == state.control {
            return;
        }
        state.control = next;
        if self.still_shown(form) {
            self.set_enabled(form, next.is_enabled());
        }
    }

    // The response may have replaced the control or bound it afresh.
    fn still_shown(&self, form: &Arc<BoundForm>) -> bool {
        self.forms.is_current(form) && self.surface.is_disabled(&form.request.control).is_ok()
    }

    fn set_enabled(&self, form: &BoundForm, enabled: bool) {
        if let Err(err) = self.surface.set_disabled(&form.request.control, !enabled) {
            self.diagnostics.report(
                "bind_form",
                &form.request.location,
                FailureKind::Surface,
                err.to_string(),
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/binder_tests.rs"]
mod tests;
