use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};

use shared::domain::ElementId;

/// Tracks which controls have a request outstanding. A control can hold at
/// most one ticket at a time.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    active: Mutex<HashSet<ElementId>>,
}

impl InFlightGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn try_acquire(self: &Arc<Self>, control: &ElementId) -> Option<InFlightTicket> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(control.clone()) {
            return None;
        }
        Some(InFlightTicket {
            guard: Arc::clone(self),
            control: control.clone(),
        })
    }

    pub fn is_in_flight(&self, control: &ElementId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(control)
    }
}

/// Releases the control when dropped.
#[derive(Debug)]
pub struct InFlightTicket {
    guard: Arc<InFlightGuard>,
    control: ElementId,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.guard
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.control);
    }
}
