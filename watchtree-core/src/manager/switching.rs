//! Runtime switch between the enabled and the disabled manager.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{DisabledManager, EnabledManager, Manager};
use crate::callback::CompositeCallback;
use crate::clock::{Clock, SystemClock};
use crate::config::{CallbackRegistry, Configuration};
use crate::error::MonitorError;
use crate::monitor::{Counter, Monitor, Stopwatch};

/// Delegates to an [`EnabledManager`] or a [`DisabledManager`].
///
/// Disabling keeps the enabled manager's tree, so enabling again picks up
/// where it left off. Monitors obtained while disabled stay inert.
/// Configuration, callbacks and the callback registry always belong to the
/// enabled manager.
#[derive(Debug)]
pub struct SwitchingManager {
    enabled: EnabledManager,
    disabled: DisabledManager,
    on: AtomicBool,
}

impl SwitchingManager {
    /// A switching manager that starts enabled.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: EnabledManager::with_clock(clock.clone()),
            disabled: DisabledManager::with_clock(clock),
            on: AtomicBool::new(true),
        }
    }

    fn current(&self) -> &dyn Manager {
        if self.on.load(Ordering::Acquire) {
            &self.enabled
        } else {
            &self.disabled
        }
    }
}

impl Default for SwitchingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager for SwitchingManager {
    fn root_monitor(&self) -> Arc<dyn Monitor> {
        self.current().root_monitor()
    }

    fn monitor(&self, name: &str) -> Option<Arc<dyn Monitor>> {
        self.current().monitor(name)
    }

    fn counter(&self, name: &str) -> Result<Arc<dyn Counter>, MonitorError> {
        self.current().counter(name)
    }

    fn stopwatch(&self, name: &str) -> Result<Arc<dyn Stopwatch>, MonitorError> {
        self.current().stopwatch(name)
    }

    fn monitor_names(&self) -> Vec<String> {
        self.current().monitor_names()
    }

    fn monitors(&self, filter: &dyn Fn(&dyn Monitor) -> bool) -> Vec<Arc<dyn Monitor>> {
        self.current().monitors(filter)
    }

    fn destroy_monitor(&self, name: &str) -> Result<(), MonitorError> {
        self.current().destroy_monitor(name)
    }

    fn clear(&self) {
        self.current().clear();
    }

    fn callback(&self) -> Arc<CompositeCallback> {
        self.enabled.callback()
    }

    fn configuration(&self) -> &Configuration {
        self.enabled.configuration()
    }

    fn callback_registry(&self) -> &CallbackRegistry {
        self.enabled.callback_registry()
    }

    fn enable(&self) -> Result<(), MonitorError> {
        self.on.store(true, Ordering::Release);
        Ok(())
    }

    fn disable(&self) -> Result<(), MonitorError> {
        self.on.store(false, Ordering::Release);
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.on.load(Ordering::Acquire)
    }

    fn message(&self, message: &str) {
        self.current().message(message);
    }

    fn warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        self.current().warning(warning, cause);
    }

    fn purge_incrementals_older_than(&self, threshold: u64) -> usize {
        self.current().purge_incrementals_older_than(threshold)
    }

    fn milli_time(&self) -> u64 {
        self.current().milli_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn disable_keeps_state_for_reenable() {
        let manager = SwitchingManager::new();
        manager.counter("hits").unwrap().increase_by(3);

        manager.disable().unwrap();
        assert!(!manager.is_enabled());
        let inert = manager.counter("hits").unwrap();
        inert.increase();
        assert_eq!(inert.value(), 0);
        assert!(manager.monitor_names().is_empty());

        manager.enable().unwrap();
        assert_eq!(manager.counter("hits").unwrap().value(), 3);
        assert_eq!(inert.value(), 0);
    }

    #[test]
    fn configuration_is_shared_across_states() {
        let manager = SwitchingManager::new();
        manager.disable().unwrap();
        assert!(manager.configure_from_json(r#"{"monitors":[{"pattern":"x","state":"disabled"}]}"#));
        manager.enable().unwrap();
        assert!(!manager.counter("x").unwrap().is_enabled());
    }

    #[test]
    fn disabled_manager_shares_the_clock() {
        let clock = Arc::new(ManualClock::at_millis(500));
        let manager = SwitchingManager::with_clock(clock.clone());
        manager.stopwatch("op").unwrap().add_time(1_000_000);

        manager.disable().unwrap();
        let inert = manager.stopwatch("op").unwrap();
        inert.add_time(1_000_000);
        assert_eq!(inert.counter(), 0);
        assert_eq!(manager.milli_time(), clock.milli_time());

        manager.enable().unwrap();
        assert_eq!(manager.stopwatch("op").unwrap().counter(), 1);
    }
}
