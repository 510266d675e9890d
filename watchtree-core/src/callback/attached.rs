//! Per-stopwatch state kept in the monitor attribute bag.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::monitor::Monitor;

/// One named attribute slot holding `Arc<Mutex<T>>`.
///
/// Creation is serialized per slot so concurrent first events on the same
/// monitor end up sharing one state.
#[derive(Debug)]
pub(crate) struct AttributeSlot {
    name: String,
    creating: Mutex<()>,
}

impl AttributeSlot {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creating: Mutex::new(()),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// The state attached to `monitor`. `None` when absent or when someone
    /// stored a value of another type under this name.
    pub(crate) fn get<T: Send + 'static>(&self, monitor: &dyn Monitor) -> Option<Arc<Mutex<T>>> {
        monitor.attribute(&self.name)?.downcast::<Mutex<T>>().ok()
    }

    pub(crate) fn get_or_insert_with<T: Send + 'static>(
        &self,
        monitor: &dyn Monitor,
        init: impl FnOnce() -> T,
    ) -> Option<Arc<Mutex<T>>> {
        if let Some(attribute) = monitor.attribute(&self.name) {
            return attribute.downcast::<Mutex<T>>().ok();
        }
        let _creating = self.creating.lock();
        if let Some(attribute) = monitor.attribute(&self.name) {
            return attribute.downcast::<Mutex<T>>().ok();
        }
        let state = Arc::new(Mutex::new(init()));
        monitor.set_attribute(&self.name, state.clone());
        Some(state)
    }
}
