//! Splits - in-flight measurements.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::monitor::{Attribute, MonitorNode, Stopwatch};

fn default_clock() -> Arc<dyn Clock> {
    static CLOCK: OnceLock<Arc<SystemClock>> = OnceLock::new();
    CLOCK.get_or_init(|| Arc::new(SystemClock::new())).clone()
}

/// One measurement, started by [`Stopwatch::start`] and finished by
/// [`Split::stop`].
///
/// A split keeps its stopwatch alive, never the other way round. Splits
/// that are never stopped only leave the stopwatch's `active` count high.
///
/// # Example
///
/// ```rust
/// use watchtree_core::{EnabledManager, Manager};
///
/// let manager = EnabledManager::new();
/// let stopwatch = manager.stopwatch("db.query").unwrap();
///
/// let split = stopwatch.start();
/// // ... run the query ...
/// split.stop();
///
/// assert_eq!(stopwatch.counter(), 1);
/// ```
pub struct Split {
    stopwatch: Option<Arc<MonitorNode>>,
    clock: Arc<dyn Clock>,
    start: u64,
    enabled: bool,
    running: AtomicBool,
    total: AtomicU64,
    attributes: RwLock<HashMap<String, Attribute>>,
}

impl Split {
    fn build(
        stopwatch: Option<Arc<MonitorNode>>,
        clock: Arc<dyn Clock>,
        start: u64,
        enabled: bool,
        running: bool,
        total: u64,
    ) -> Self {
        Self {
            stopwatch,
            clock,
            start,
            enabled,
            running: AtomicBool::new(running),
            total: AtomicU64::new(total),
            attributes: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn started(stopwatch: Arc<MonitorNode>, clock: Arc<dyn Clock>, start: u64) -> Self {
        Self::build(Some(stopwatch), clock, start, true, true, 0)
    }

    /// A split that measures nothing, handed out by disabled stopwatches.
    pub(crate) fn inert(clock: Arc<dyn Clock>) -> Self {
        Self::build(None, clock, 0, false, false, 0)
    }

    /// Starts a split that belongs to no stopwatch. Stop it and pass it to
    /// [`Stopwatch::add_split`] to fold it somewhere.
    pub fn start_free() -> Self {
        Self::start_free_with(default_clock())
    }

    /// Like [`start_free`](Split::start_free) with an explicit clock.
    pub fn start_free_with(clock: Arc<dyn Clock>) -> Self {
        let start = clock.nano_time();
        Self::build(None, clock, start, true, true, 0)
    }

    /// An already stopped free split lasting `nanos`.
    pub fn of_duration(nanos: u64) -> Self {
        Self::of_duration_with(default_clock(), nanos)
    }

    pub(crate) fn of_duration_with(clock: Arc<dyn Clock>, nanos: u64) -> Self {
        let start = clock.nano_time().saturating_sub(nanos);
        Self::build(None, clock, start, true, false, nanos)
    }

    /// Stops the measurement and returns its duration in nanoseconds.
    ///
    /// Only the first call counts; later calls return 0 and leave the
    /// stopwatch alone.
    pub fn stop(&self) -> u64 {
        if !self.running.swap(false, Ordering::AcqRel) {
            return 0;
        }
        let now = self.clock.nano_time();
        let elapsed = now.saturating_sub(self.start);
        self.total.store(elapsed, Ordering::Release);
        if let Some(stopwatch) = &self.stopwatch {
            stopwatch.stop_split(self, elapsed, now);
        }
        elapsed
    }

    /// Elapsed time while running, final duration once stopped.
    pub fn running_for(&self) -> u64 {
        if self.running.load(Ordering::Acquire) {
            self.clock.nano_time().saturating_sub(self.start)
        } else {
            self.total.load(Ordering::Acquire)
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// False for splits from a disabled stopwatch.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start in clock nanoseconds, 0 for inert splits.
    pub fn start_nanos(&self) -> u64 {
        self.start
    }

    /// Start as wall-clock milliseconds.
    pub fn start_millis(&self) -> u64 {
        self.clock.millis_for_nano(self.start)
    }

    /// The stopwatch this split measures for, if any.
    pub fn stopwatch(&self) -> Option<Arc<dyn Stopwatch>> {
        self.stopwatch
            .clone()
            .map(|stopwatch| stopwatch as Arc<dyn Stopwatch>)
    }

    pub(crate) fn stopwatch_name(&self) -> Option<&str> {
        use crate::monitor::Monitor;
        self.stopwatch.as_ref().and_then(|stopwatch| stopwatch.name())
    }

    pub fn set_attribute(&self, name: &str, value: Attribute) {
        self.attributes.write().insert(name.to_string(), value);
    }

    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.read().get(name).cloned()
    }

    pub fn remove_attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.write().remove(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Wraps the split so it stops when the guard goes out of scope.
    pub fn into_guard(self) -> SplitGuard {
        SplitGuard { split: self }
    }
}

impl fmt::Debug for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Split")
            .field("stopwatch", &self.stopwatch_name())
            .field("start", &self.start)
            .field("enabled", &self.enabled)
            .field("running", &self.is_running())
            .field("total", &self.total.load(Ordering::Relaxed))
            .finish()
    }
}

/// Guard that stops its split when dropped.
///
/// This implements RAII-style timing of a scope.
#[derive(Debug)]
pub struct SplitGuard {
    split: Split,
}

impl SplitGuard {
    /// Stops now and returns the duration.
    pub fn stop(self) -> u64 {
        self.split.stop()
    }
}

impl Deref for SplitGuard {
    type Target = Split;

    fn deref(&self) -> &Split {
        &self.split
    }
}

impl Drop for SplitGuard {
    fn drop(&mut self) {
        self.split.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::monitor::node::testing::Fixture;
    use watchtree_types::MonitorKind;

    #[test]
    fn free_split_measures_without_stopwatch() {
        let clock = Arc::new(ManualClock::new());
        let split = Split::start_free_with(clock.clone());
        assert!(split.stopwatch().is_none());
        clock.advance_nanos(250);
        assert_eq!(split.running_for(), 250);
        assert_eq!(split.stop(), 250);
        clock.advance_nanos(250);
        assert_eq!(split.running_for(), 250);
        assert!(!split.is_running());
    }

    #[test]
    fn of_duration_is_stopped() {
        let split = Split::of_duration(1_000);
        assert!(!split.is_running());
        assert!(split.is_enabled());
        assert_eq!(split.running_for(), 1_000);
        assert_eq!(split.stop(), 0);
    }

    #[test]
    fn free_split_folds_via_add_split() {
        let fx = Fixture::new();
        let sw = fx.node("sw", MonitorKind::Stopwatch);
        let split = Split::start_free_with(fx.clock.clone());
        fx.clock.advance_nanos(700);
        split.stop();
        sw.add_split(&split);
        assert_eq!(sw.total(), 700);
        assert_eq!(sw.active(), 0);
    }

    #[test]
    fn guard_stops_on_drop() {
        let fx = Fixture::new();
        let sw = fx.node("sw", MonitorKind::Stopwatch);
        {
            let _guard = sw.start().into_guard();
            fx.clock.advance_millis(2);
            assert_eq!(sw.active(), 1);
        }
        assert_eq!(sw.active(), 0);
        assert_eq!(sw.total(), 2_000_000);
    }

    #[test]
    fn guard_stop_returns_duration_once() {
        let fx = Fixture::new();
        let sw = fx.node("sw", MonitorKind::Stopwatch);
        let guard = sw.start().into_guard();
        fx.clock.advance_nanos(42);
        assert_eq!(guard.stop(), 42);
        assert_eq!(sw.counter(), 1);
    }

    #[test]
    fn split_exposes_its_stopwatch() {
        let fx = Fixture::new();
        let sw = fx.node("db.query", MonitorKind::Stopwatch);
        let split = sw.start();
        let owner = split.stopwatch().unwrap();
        assert_eq!(owner.name(), Some("db.query"));
        assert_eq!(split.start_millis(), 1_000);
        split.set_attribute("sql", Arc::new("select 1"));
        assert!(split.attribute("sql").is_some());
    }
}
