//! Stopwatch accumulators and the stopwatch view of a node.

use watchtree_types::StopwatchSample;

use super::node::{MonitorNode, Payload, Usage};
use super::{Monitor, Stopwatch};
use crate::callback::Callback;
use crate::split::Split;
use crate::stat::StatAccumulator;

/// Raw stopwatch state. Durations are nanoseconds, timestamps milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StopwatchStats {
    pub(crate) total: u64,
    pub(crate) counter: u64,
    pub(crate) min: u64,
    pub(crate) min_timestamp: u64,
    pub(crate) max: u64,
    pub(crate) max_timestamp: u64,
    pub(crate) last: u64,
    pub(crate) active: u64,
    pub(crate) max_active: u64,
    pub(crate) max_active_timestamp: u64,
    stat: StatAccumulator,
}

impl StopwatchStats {
    pub(crate) fn new() -> Self {
        Self {
            total: 0,
            counter: 0,
            min: u64::MAX,
            min_timestamp: 0,
            max: 0,
            max_timestamp: 0,
            last: 0,
            active: 0,
            max_active: 0,
            max_active_timestamp: 0,
            stat: StatAccumulator::new(),
        }
    }

    pub(crate) fn start(&mut self, now: u64) {
        self.active += 1;
        if self.active >= self.max_active {
            self.max_active = self.active;
            self.max_active_timestamp = now;
        }
    }

    /// Folds the duration of a split that started on this accumulator.
    pub(crate) fn stop(&mut self, nanos: u64, now: u64) {
        self.active = self.active.saturating_sub(1);
        self.add(nanos, now);
    }

    pub(crate) fn add(&mut self, nanos: u64, now: u64) {
        self.last = nanos;
        self.total = self.total.saturating_add(nanos);
        self.counter += 1;
        if nanos > self.max {
            self.max = nanos;
            self.max_timestamp = now;
        }
        if nanos < self.min {
            self.min = nanos;
            self.min_timestamp = now;
        }
        self.stat.add(nanos as f64);
    }

    /// Zeroes everything except `active`, which running splits still own.
    pub(crate) fn reset(&mut self) {
        let active = self.active;
        *self = Self::new();
        self.active = active;
        self.max_active = active;
    }

    pub(crate) fn mean(&self) -> f64 {
        self.stat.mean()
    }

    pub(crate) fn variance(&self) -> f64 {
        self.stat.variance()
    }

    pub(crate) fn variance_n(&self) -> f64 {
        self.stat.variance_n()
    }

    pub(crate) fn standard_deviation(&self) -> f64 {
        self.stat.standard_deviation()
    }

    pub(crate) fn sample(
        &self,
        name: Option<String>,
        note: Option<String>,
        usage: Usage,
    ) -> StopwatchSample {
        StopwatchSample {
            name,
            note,
            first_usage: usage.first,
            last_usage: usage.last,
            last_reset: usage.reset,
            total: self.total,
            counter: self.counter,
            min: self.min,
            min_timestamp: self.min_timestamp,
            max: self.max,
            max_timestamp: self.max_timestamp,
            last: self.last,
            active: self.active,
            max_active: self.max_active,
            max_active_timestamp: self.max_active_timestamp,
            mean: self.mean(),
            variance: self.variance(),
            variance_n: self.variance_n(),
            standard_deviation: self.standard_deviation(),
        }
    }
}

impl MonitorNode {
    /// Called by [`Split::stop`] exactly once per split. Folds even when the
    /// stopwatch was disabled after the split started.
    pub(crate) fn stop_split(&self, split: &Split, nanos: u64, stop_nanos: u64) {
        let now = self.shared.clock.millis_for_nano(stop_nanos);
        let notify = self.has_listeners();
        self.update(
            |data| {
                data.usage.touch(now);
                let Payload::Stopwatch(stats) = &mut data.payload else {
                    return None;
                };
                stats.stop(nanos, now);
                data.incrementals.apply(now, |payload| {
                    if let Payload::Stopwatch(stats) = payload {
                        stats.stop(nanos, now);
                    }
                });
                if notify {
                    data.stopwatch_sample(self.name())
                } else {
                    None
                }
            },
            |sample| self.shared.callback.on_stopwatch_stop(split, &sample),
        );
    }

    fn stopwatch_stats<R: Default>(&self, f: impl FnOnce(&StopwatchStats) -> R) -> R {
        self.read(|data| match &data.payload {
            Payload::Stopwatch(stats) => f(stats),
            _ => R::default(),
        })
    }
}

impl Stopwatch for MonitorNode {
    fn start(&self) -> Split {
        let clock = self.shared.clock.clone();
        let node = match self.arc() {
            Some(node) if self.is_enabled() => node,
            _ => return Split::inert(clock),
        };
        let start = clock.nano_time();
        let now = clock.millis_for_nano(start);
        let split = Split::started(node, clock, start);

        let notify = self.has_listeners();
        self.update(
            |data| {
                data.usage.touch(now);
                let Payload::Stopwatch(stats) = &mut data.payload else {
                    return None;
                };
                stats.start(now);
                data.incrementals.apply(now, |payload| {
                    if let Payload::Stopwatch(stats) = payload {
                        stats.start(now);
                    }
                });
                notify.then_some(())
            },
            |()| self.shared.callback.on_stopwatch_start(&split),
        );
        split
    }

    fn add_time(&self, nanos: u64) -> &dyn Stopwatch {
        if self.is_enabled() {
            let split = Split::of_duration_with(self.shared.clock.clone(), nanos);
            self.add_split(&split);
        }
        self
    }

    fn add_split(&self, split: &Split) -> &dyn Stopwatch {
        if !self.is_enabled() {
            return self;
        }
        let nanos = split.running_for();
        let now = self.now_millis();
        let notify = self.has_listeners();
        self.update(
            |data| {
                data.usage.touch(now);
                let Payload::Stopwatch(stats) = &mut data.payload else {
                    return None;
                };
                stats.add(nanos, now);
                data.incrementals.apply(now, |payload| {
                    if let Payload::Stopwatch(stats) = payload {
                        stats.add(nanos, now);
                    }
                });
                if notify {
                    data.stopwatch_sample(self.name())
                } else {
                    None
                }
            },
            |sample| self.shared.callback.on_stopwatch_add(self, split, &sample),
        );
        self
    }

    fn total(&self) -> u64 {
        self.stopwatch_stats(|s| s.total)
    }

    fn counter(&self) -> u64 {
        self.stopwatch_stats(|s| s.counter)
    }

    fn min(&self) -> u64 {
        self.read(|data| match &data.payload {
            Payload::Stopwatch(stats) => stats.min,
            _ => u64::MAX,
        })
    }

    fn min_timestamp(&self) -> u64 {
        self.stopwatch_stats(|s| s.min_timestamp)
    }

    fn max(&self) -> u64 {
        self.stopwatch_stats(|s| s.max)
    }

    fn max_timestamp(&self) -> u64 {
        self.stopwatch_stats(|s| s.max_timestamp)
    }

    fn last(&self) -> u64 {
        self.stopwatch_stats(|s| s.last)
    }

    fn active(&self) -> u64 {
        self.stopwatch_stats(|s| s.active)
    }

    fn max_active(&self) -> u64 {
        self.stopwatch_stats(|s| s.max_active)
    }

    fn max_active_timestamp(&self) -> u64 {
        self.stopwatch_stats(|s| s.max_active_timestamp)
    }

    fn mean(&self) -> f64 {
        self.stopwatch_stats(|s| s.mean())
    }

    fn variance(&self) -> f64 {
        self.stopwatch_stats(|s| s.variance())
    }

    fn variance_n(&self) -> f64 {
        self.stopwatch_stats(|s| s.variance_n())
    }

    fn standard_deviation(&self) -> f64 {
        self.stopwatch_stats(|s| s.standard_deviation())
    }

    fn sample_stopwatch(&self) -> StopwatchSample {
        self.read(|data| {
            data.stopwatch_sample(self.name())
                .unwrap_or_else(|| StopwatchSample::empty(self.name().map(str::to_string)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::node::testing::Fixture;
    use std::sync::Arc;
    use watchtree_types::{MonitorKind, MonitorState};

    const MS: u64 = 1_000_000;

    fn stopwatch(fx: &Fixture) -> Arc<MonitorNode> {
        fx.node("sw", MonitorKind::Stopwatch)
    }

    #[test]
    fn split_durations_fold_into_totals() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        for d in [10, 20, 30] {
            let split = sw.start();
            fx.clock.advance_millis(d);
            assert_eq!(split.stop(), d * MS);
        }
        assert_eq!(sw.counter(), 3);
        assert_eq!(sw.total(), 60 * MS);
        assert_eq!(Stopwatch::min(&*sw), 10 * MS);
        assert_eq!(Stopwatch::max(&*sw), 30 * MS);
        assert_eq!(sw.last(), 30 * MS);
        assert!((sw.mean() - (20 * MS) as f64).abs() < 1e-6);
        assert_eq!(sw.active(), 0);
    }

    #[test]
    fn extremes_carry_their_timestamps() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        sw.add_time(5 * MS);
        fx.clock.advance_millis(100);
        sw.add_time(50 * MS);
        fx.clock.advance_millis(100);
        sw.add_time(20 * MS);
        assert_eq!(Stopwatch::min_timestamp(&*sw), 1_000);
        assert_eq!(Stopwatch::max_timestamp(&*sw), 1_100);
    }

    #[test]
    fn second_stop_is_a_no_op() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        let split = sw.start();
        fx.clock.advance_millis(1);
        assert_eq!(split.stop(), MS);
        fx.clock.advance_millis(1);
        assert_eq!(split.stop(), 0);
        assert_eq!(sw.counter(), 1);
        assert_eq!(sw.total(), MS);
    }

    #[test]
    fn active_peak_is_tracked() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        let a = sw.start();
        let b = sw.start();
        assert_eq!(sw.active(), 2);
        a.stop();
        let c = sw.start();
        b.stop();
        c.stop();
        assert_eq!(sw.active(), 0);
        assert_eq!(sw.max_active(), 2);
    }

    #[test]
    fn disabled_stopwatch_returns_inert_split() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        sw.set_state(MonitorState::Disabled, false);
        let split = sw.start();
        assert!(!split.is_enabled());
        assert!(!split.is_running());
        fx.clock.advance_millis(3);
        assert_eq!(split.stop(), 0);
        assert_eq!(sw.counter(), 0);
        assert_eq!(sw.active(), 0);
    }

    #[test]
    fn split_started_before_disable_still_folds() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        let split = sw.start();
        sw.set_state(MonitorState::Disabled, false);
        assert_eq!(sw.active(), 1);
        fx.clock.advance_millis(4);
        assert_eq!(split.stop(), 4 * MS);
        assert_eq!(sw.counter(), 1);
        assert_eq!(sw.active(), 0);
    }

    #[test]
    fn reset_keeps_active() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        sw.add_time(MS);
        let running = sw.start();
        sw.reset();
        assert_eq!(sw.counter(), 0);
        assert_eq!(sw.active(), 1);
        assert_eq!(sw.max_active(), 1);
        assert_eq!(Stopwatch::min(&*sw), u64::MAX);
        running.stop();
        assert_eq!(sw.counter(), 1);
    }

    #[test]
    fn variance_matches_definition() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        for d in [2, 4, 4, 4, 5, 5, 7, 9] {
            sw.add_time(d);
        }
        assert!((sw.variance_n() - 4.0).abs() < 1e-9);
        assert!((sw.standard_deviation() - 2.0).abs() < 1e-9);
        assert!((sw.variance() - 32.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn single_measurement_has_zero_sample_variance() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        sw.add_time(100);
        assert_eq!(sw.variance(), 0.0);
    }

    #[test]
    fn incremental_sample_reports_window() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        sw.add_time(10);
        let full = sw.sample_increment("window");
        assert_eq!(full.as_stopwatch().unwrap().counter, 1);

        sw.add_time(20);
        sw.add_time(30);
        let delta = sw.sample_increment("window");
        let delta = delta.as_stopwatch().unwrap();
        assert_eq!(delta.counter, 2);
        assert_eq!(delta.total, 50);
        assert_eq!(delta.min, 20);
        assert_eq!(sw.counter(), 3);
    }

    #[test]
    fn split_from_before_window_does_not_underflow_active() {
        let fx = Fixture::new();
        let sw = stopwatch(&fx);
        let split = sw.start();
        sw.sample_increment("k");
        split.stop();
        let delta = sw.sample_increment("k");
        assert_eq!(delta.as_stopwatch().unwrap().active, 0);
        assert_eq!(delta.as_stopwatch().unwrap().counter, 1);
    }
}
