use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use shared::domain::{ControlState, ElementId};
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::{
    form::FormRequest,
    surface::{Surface, SurfaceError},
};

pub(crate) struct BoundForm {
    pub(crate) request: FormRequest,
    pub(crate) state: AsyncMutex<BoundState>,
}

#[derive(Default)]
pub(crate) struct BoundState {
    pub(crate) control: ControlState,
    pub(crate) submitting: bool,
    pub(crate) edited_in_flight: bool,
}

#[derive(Default)]
struct Handlers {
    // control → activation handler
    forms: HashMap<ElementId, Arc<BoundForm>>,
    // field → control whose input handler it carries; one owner per field
    inputs: HashMap<ElementId, ElementId>,
}

/// Activation and input handlers of every bound form.
///
/// Shared by the binder and the fragment dispatcher, so a rendered response
/// can bind the controls it brings along.
#[derive(Default)]
pub struct FormRegistry {
    handlers: Mutex<Handlers>,
}

impl FormRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Disables the control, then registers its handlers. Binding a control or
    /// a field again replaces the earlier handler.
    pub fn bind(&self, surface: &dyn Surface, request: FormRequest) -> Result<(), SurfaceError> {
        surface.set_disabled(&request.control, true)?;

        let control = request.control.clone();
        let fields: Vec<ElementId> = request.binding.elements().cloned().collect();
        let form = Arc::new(BoundForm {
            request,
            state: AsyncMutex::new(BoundState::default()),
        });

        let mut handlers = self.lock();
        for field in fields {
            handlers.inputs.insert(field, control.clone());
        }
        handlers.forms.insert(control.clone(), form);
        info!(control = %control, "form bound");
        Ok(())
    }

    pub fn is_bound(&self, control: &ElementId) -> bool {
        self.lock().forms.contains_key(control)
    }

    pub(crate) fn form_for_control(&self, control: &ElementId) -> Option<Arc<BoundForm>> {
        self.lock().forms.get(control).cloned()
    }

    pub(crate) fn form_for_input(&self, field: &ElementId) -> Option<Arc<BoundForm>> {
        let handlers = self.lock();
        handlers
            .inputs
            .get(field)
            .and_then(|control| handlers.forms.get(control))
            .cloned()
    }

    /// Whether `form` is still the handler registered for its control.
    pub(crate) fn is_current(&self, form: &Arc<BoundForm>) -> bool {
        self.lock()
            .forms
            .get(&form.request.control)
            .is_some_and(|current| Arc::ptr_eq(current, form))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
