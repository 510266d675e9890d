//! Fan-out callback.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use watchtree_types::{CounterSample, StopwatchSample};

use super::{Callback, CallbackContext};
use crate::monitor::{Counter, Monitor, Stopwatch};
use crate::split::Split;

/// Ordered list of callbacks that all receive every event.
///
/// Readers load a snapshot of the list, so events never wait on
/// registration. A composite is "live" once initialized; callbacks added to
/// a live composite are initialized immediately and removed ones are
/// deactivated.
pub struct CompositeCallback {
    callbacks: ArcSwap<Vec<Arc<dyn Callback>>>,
    /// Serializes writers of `callbacks`.
    write: Mutex<()>,
    context: RwLock<Option<CallbackContext>>,
}

impl CompositeCallback {
    /// Creates an empty composite that is not attached to any manager.
    pub fn new() -> Self {
        Self {
            callbacks: ArcSwap::from_pointee(Vec::new()),
            write: Mutex::new(()),
            context: RwLock::new(None),
        }
    }

    /// Creates the live root composite of a manager. Its context points back
    /// at itself, so warnings raised anywhere below reach every callback.
    pub(crate) fn new_root() -> Arc<Self> {
        Arc::new_cyclic(|root| Self {
            callbacks: ArcSwap::from_pointee(Vec::new()),
            write: Mutex::new(()),
            context: RwLock::new(Some(CallbackContext::new(root.clone()))),
        })
    }

    pub fn has_callbacks(&self) -> bool {
        !self.callbacks.load().is_empty()
    }

    pub fn is_live(&self) -> bool {
        self.context.read().is_some()
    }

    /// Appends `callback`, initializing it first if this composite is live.
    pub fn add_callback(&self, callback: Arc<dyn Callback>) {
        if let Some(context) = self.context() {
            callback.initialize(&context);
        }
        let _write = self.write.lock();
        let mut next = Vec::clone(&self.callbacks.load());
        next.push(callback);
        self.callbacks.store(Arc::new(next));
    }

    /// Removes `callback` (compared by identity). Returns whether it was
    /// registered.
    pub fn remove_callback(&self, callback: &Arc<dyn Callback>) -> bool {
        let removed = {
            let _write = self.write.lock();
            let current = self.callbacks.load_full();
            let next: Vec<Arc<dyn Callback>> = current
                .iter()
                .filter(|c| !same_callback(c, callback))
                .cloned()
                .collect();
            let removed = next.len() != current.len();
            if removed {
                self.callbacks.store(Arc::new(next));
            }
            removed
        };
        if removed && self.is_live() {
            callback.deactivate();
        }
        removed
    }

    pub fn remove_all_callbacks(&self) {
        let removed = {
            let _write = self.write.lock();
            self.callbacks.swap(Arc::new(Vec::new()))
        };
        if self.is_live() {
            for callback in removed.iter() {
                callback.deactivate();
            }
        }
    }

    /// Snapshot of the registered callbacks in dispatch order.
    pub fn callbacks(&self) -> Vec<Arc<dyn Callback>> {
        Vec::clone(&self.callbacks.load())
    }

    pub(crate) fn context(&self) -> Option<CallbackContext> {
        self.context.read().clone()
    }

    fn snapshot(&self) -> Arc<Vec<Arc<dyn Callback>>> {
        self.callbacks.load_full()
    }
}

fn same_callback(a: &Arc<dyn Callback>, b: &Arc<dyn Callback>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl Default for CompositeCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompositeCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCallback")
            .field("callbacks", &self.callbacks.load().len())
            .field("live", &self.is_live())
            .finish()
    }
}

impl Callback for CompositeCallback {
    /// Initializing an already live composite does nothing.
    fn initialize(&self, context: &CallbackContext) {
        {
            let mut current = self.context.write();
            if current.is_some() {
                return;
            }
            *current = Some(context.clone());
        }
        for callback in self.snapshot().iter() {
            callback.initialize(context);
        }
    }

    fn deactivate(&self) {
        if self.context.write().take().is_none() {
            return;
        }
        for callback in self.snapshot().iter() {
            callback.deactivate();
        }
    }

    fn on_stopwatch_start(&self, split: &Split) {
        for callback in self.snapshot().iter() {
            callback.on_stopwatch_start(split);
        }
    }

    fn on_stopwatch_stop(&self, split: &Split, sample: &StopwatchSample) {
        for callback in self.snapshot().iter() {
            callback.on_stopwatch_stop(split, sample);
        }
    }

    fn on_stopwatch_add(&self, stopwatch: &dyn Stopwatch, split: &Split, sample: &StopwatchSample) {
        for callback in self.snapshot().iter() {
            callback.on_stopwatch_add(stopwatch, split, sample);
        }
    }

    fn on_counter_increase(&self, counter: &dyn Counter, inc: i64, sample: &CounterSample) {
        for callback in self.snapshot().iter() {
            callback.on_counter_increase(counter, inc, sample);
        }
    }

    fn on_counter_decrease(&self, counter: &dyn Counter, dec: i64, sample: &CounterSample) {
        for callback in self.snapshot().iter() {
            callback.on_counter_decrease(counter, dec, sample);
        }
    }

    fn on_counter_set(&self, counter: &dyn Counter, value: i64, sample: &CounterSample) {
        for callback in self.snapshot().iter() {
            callback.on_counter_set(counter, value, sample);
        }
    }

    fn on_monitor_created(&self, monitor: &dyn Monitor) {
        for callback in self.snapshot().iter() {
            callback.on_monitor_created(monitor);
        }
    }

    fn on_monitor_destroyed(&self, monitor: &dyn Monitor) {
        for callback in self.snapshot().iter() {
            callback.on_monitor_destroyed(monitor);
        }
    }

    fn on_manager_clear(&self) {
        for callback in self.snapshot().iter() {
            callback.on_manager_clear();
        }
    }

    fn on_manager_message(&self, message: &str) {
        for callback in self.snapshot().iter() {
            callback.on_manager_message(message);
        }
    }

    fn on_manager_warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        for callback in self.snapshot().iter() {
            callback.on_manager_warning(warning, cause);
        }
    }
}
