//! The manager that measures nothing.

use std::error::Error as StdError;
use std::sync::Arc;

use super::Manager;
use crate::callback::CompositeCallback;
use crate::clock::{Clock, SystemClock};
use crate::config::{CallbackRegistry, Configuration};
use crate::error::MonitorError;
use crate::monitor::null::{NullCounter, NullMonitor, NullStopwatch};
use crate::monitor::{Counter, Monitor, Stopwatch};

/// Hands out shared inert monitors for every name and tracks nothing.
///
/// Messages are dropped; warnings are only logged.
#[derive(Debug)]
pub struct DisabledManager {
    monitor: Arc<NullMonitor>,
    counter: Arc<NullCounter>,
    stopwatch: Arc<NullStopwatch>,
    clock: Arc<dyn Clock>,
    callback: Arc<CompositeCallback>,
    configuration: Configuration,
    registry: CallbackRegistry,
}

impl DisabledManager {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            monitor: Arc::new(NullMonitor),
            counter: Arc::new(NullCounter),
            stopwatch: Arc::new(NullStopwatch::new(clock.clone())),
            clock,
            callback: CompositeCallback::new_root(),
            configuration: Configuration::new(),
            registry: CallbackRegistry::new(),
        }
    }
}

impl Default for DisabledManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager for DisabledManager {
    fn root_monitor(&self) -> Arc<dyn Monitor> {
        self.monitor.clone()
    }

    fn monitor(&self, _name: &str) -> Option<Arc<dyn Monitor>> {
        Some(self.monitor.clone())
    }

    fn counter(&self, _name: &str) -> Result<Arc<dyn Counter>, MonitorError> {
        Ok(self.counter.clone())
    }

    fn stopwatch(&self, _name: &str) -> Result<Arc<dyn Stopwatch>, MonitorError> {
        Ok(self.stopwatch.clone())
    }

    fn monitor_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn monitors(&self, _filter: &dyn Fn(&dyn Monitor) -> bool) -> Vec<Arc<dyn Monitor>> {
        Vec::new()
    }

    fn destroy_monitor(&self, _name: &str) -> Result<(), MonitorError> {
        Ok(())
    }

    fn clear(&self) {}

    fn callback(&self) -> Arc<CompositeCallback> {
        self.callback.clone()
    }

    fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn callback_registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn message(&self, _message: &str) {}

    fn warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        match cause {
            Some(cause) => tracing::warn!(error = %cause, "{}", warning),
            None => tracing::warn!("{}", warning),
        }
    }

    fn purge_incrementals_older_than(&self, _threshold: u64) -> usize {
        0
    }

    fn milli_time(&self) -> u64 {
        self.clock.milli_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchtree_types::MonitorKind;

    #[test]
    fn every_name_gets_the_shared_inert_monitor() {
        let manager = DisabledManager::new();
        let a = manager.counter("a").unwrap();
        let b = manager.counter("b").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        a.increase_by(10);
        assert_eq!(b.value(), 0);
        assert!(manager.monitor("anything").is_some());
        assert!(manager.monitor_names().is_empty());
        assert!(!manager.is_enabled());
    }

    #[test]
    fn stopwatch_splits_are_inert() {
        let manager = DisabledManager::new();
        let sw = manager.stopwatch("db.query").unwrap();
        let split = sw.start();
        assert!(!split.is_enabled());
        split.stop();
        assert_eq!(sw.counter(), 0);
        assert_eq!(sw.kind(), MonitorKind::Stopwatch);
    }

    #[test]
    fn administration_is_a_no_op() {
        let manager = DisabledManager::new();
        assert!(manager.destroy_monitor("x").is_ok());
        manager.clear();
        manager.message("ignored");
        assert_eq!(manager.purge_incrementals_older_than(u64::MAX), 0);
        assert!(manager.enable().is_err());
    }
}
