//! Inert monitors handed out by a disabled manager.
//!
//! They implement the same traits as real monitors. Mutators do nothing,
//! readers return zeros and empty samples, and nothing is ever linked.

use std::sync::Arc;

use watchtree_types::{
    CounterSample, MonitorKind, MonitorState, Sample, StopwatchSample, UnknownSample,
};

use super::{Attribute, Counter, Monitor, Stopwatch};
use crate::clock::Clock;
use crate::split::Split;

macro_rules! inert_monitor {
    ($ty:ty, $kind:expr, $sample:expr) => {
        impl Monitor for $ty {
            fn name(&self) -> Option<&str> {
                None
            }

            fn kind(&self) -> MonitorKind {
                $kind
            }

            fn parent(&self) -> Option<Arc<dyn Monitor>> {
                None
            }

            fn children(&self) -> Vec<Arc<dyn Monitor>> {
                Vec::new()
            }

            fn state(&self) -> MonitorState {
                MonitorState::Disabled
            }

            fn set_state(&self, _state: MonitorState, _overrule: bool) {}

            fn is_enabled(&self) -> bool {
                false
            }

            fn note(&self) -> Option<String> {
                None
            }

            fn set_note(&self, _note: Option<String>) {}

            fn first_usage(&self) -> u64 {
                0
            }

            fn last_usage(&self) -> u64 {
                0
            }

            fn last_reset(&self) -> u64 {
                0
            }

            fn sample(&self) -> Sample {
                $sample
            }

            fn sample_and_reset(&self) -> Sample {
                $sample
            }

            fn reset(&self) {}

            fn sample_increment(&self, _key: &str) -> Sample {
                $sample
            }

            fn stop_incremental_sampling(&self, _key: &str) -> bool {
                false
            }

            fn set_attribute(&self, _name: &str, _value: Attribute) {}

            fn attribute(&self, _name: &str) -> Option<Attribute> {
                None
            }

            fn remove_attribute(&self, _name: &str) -> Option<Attribute> {
                None
            }

            fn attribute_names(&self) -> Vec<String> {
                Vec::new()
            }

            fn as_monitor(&self) -> &dyn Monitor {
                self
            }
        }
    };
}

/// Inert placeholder monitor.
#[derive(Debug, Default)]
pub struct NullMonitor;

inert_monitor!(
    NullMonitor,
    MonitorKind::Unknown,
    Sample::Unknown(UnknownSample::default())
);

/// Inert counter.
#[derive(Debug, Default)]
pub struct NullCounter;

inert_monitor!(
    NullCounter,
    MonitorKind::Counter,
    Sample::Counter(CounterSample::empty(None))
);

impl Counter for NullCounter {
    fn increase(&self) -> &dyn Counter {
        self
    }

    fn increase_by(&self, _inc: i64) -> &dyn Counter {
        self
    }

    fn decrease(&self) -> &dyn Counter {
        self
    }

    fn decrease_by(&self, _dec: i64) -> &dyn Counter {
        self
    }

    fn set(&self, _value: i64) -> &dyn Counter {
        self
    }

    fn value(&self) -> i64 {
        0
    }

    fn min(&self) -> i64 {
        0
    }

    fn min_timestamp(&self) -> u64 {
        0
    }

    fn max(&self) -> i64 {
        0
    }

    fn max_timestamp(&self) -> u64 {
        0
    }

    fn increment_sum(&self) -> i64 {
        0
    }

    fn decrement_sum(&self) -> i64 {
        0
    }

    fn sample_counter(&self) -> CounterSample {
        CounterSample::empty(None)
    }
}

/// Inert stopwatch. Its splits measure nothing.
#[derive(Debug)]
pub struct NullStopwatch {
    clock: Arc<dyn Clock>,
}

impl NullStopwatch {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

inert_monitor!(
    NullStopwatch,
    MonitorKind::Stopwatch,
    Sample::Stopwatch(StopwatchSample::empty(None))
);

impl Stopwatch for NullStopwatch {
    fn start(&self) -> Split {
        Split::inert(self.clock.clone())
    }

    fn add_time(&self, _nanos: u64) -> &dyn Stopwatch {
        self
    }

    fn add_split(&self, _split: &Split) -> &dyn Stopwatch {
        self
    }

    fn total(&self) -> u64 {
        0
    }

    fn counter(&self) -> u64 {
        0
    }

    fn min(&self) -> u64 {
        0
    }

    fn min_timestamp(&self) -> u64 {
        0
    }

    fn max(&self) -> u64 {
        0
    }

    fn max_timestamp(&self) -> u64 {
        0
    }

    fn last(&self) -> u64 {
        0
    }

    fn active(&self) -> u64 {
        0
    }

    fn max_active(&self) -> u64 {
        0
    }

    fn max_active_timestamp(&self) -> u64 {
        0
    }

    fn mean(&self) -> f64 {
        0.0
    }

    fn variance(&self) -> f64 {
        0.0
    }

    fn variance_n(&self) -> f64 {
        0.0
    }

    fn standard_deviation(&self) -> f64 {
        0.0
    }

    fn sample_stopwatch(&self) -> StopwatchSample {
        StopwatchSample::empty(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn null_counter_ignores_everything() {
        let counter = NullCounter;
        counter.increase().increase_by(5).set(9);
        assert_eq!(counter.value(), 0);
        assert!(!counter.is_enabled());
        assert_eq!(counter.sample().kind(), MonitorKind::Counter);
    }

    #[test]
    fn null_stopwatch_hands_out_inert_splits() {
        let clock = Arc::new(ManualClock::new());
        let stopwatch = NullStopwatch::new(clock.clone());
        let split = stopwatch.start();
        clock.advance_millis(5);
        assert!(!split.is_enabled());
        assert_eq!(split.stop(), 0);
        assert_eq!(stopwatch.counter(), 0);
        assert!(split.stopwatch().is_none());
    }

    #[test]
    fn null_monitor_samples_are_empty() {
        let monitor = NullMonitor;
        monitor.set_note(Some("ignored".into()));
        assert_eq!(monitor.note(), None);
        assert_eq!(monitor.sample().name(), None);
        assert!(monitor.children().is_empty());
    }
}
