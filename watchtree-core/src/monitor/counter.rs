//! Counter accumulators and the counter view of a node.

use watchtree_types::CounterSample;

use super::node::{MonitorNode, Payload, Usage};
use super::{Counter, Monitor};
use crate::callback::Callback;

/// Raw counter state. Timestamps are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CounterStats {
    pub(crate) counter: i64,
    pub(crate) min: i64,
    pub(crate) min_timestamp: u64,
    pub(crate) max: i64,
    pub(crate) max_timestamp: u64,
    pub(crate) increment_sum: i64,
    pub(crate) decrement_sum: i64,
}

impl CounterStats {
    pub(crate) fn new() -> Self {
        Self {
            counter: 0,
            min: i64::MAX,
            min_timestamp: 0,
            max: i64::MIN,
            max_timestamp: 0,
            increment_sum: 0,
            decrement_sum: 0,
        }
    }

    pub(crate) fn increase(&mut self, now: u64) {
        self.counter = self.counter.wrapping_add(1);
        self.increment_sum = self.increment_sum.wrapping_add(1);
        if self.counter >= self.max {
            self.max = self.counter;
            self.max_timestamp = now;
        }
    }

    pub(crate) fn decrease(&mut self, now: u64) {
        self.counter = self.counter.wrapping_sub(1);
        self.decrement_sum = self.decrement_sum.wrapping_add(1);
        if self.counter <= self.min {
            self.min = self.counter;
            self.min_timestamp = now;
        }
    }

    pub(crate) fn increase_by(&mut self, inc: i64, now: u64) {
        self.increment_sum = self.increment_sum.wrapping_add(inc);
        self.set(self.counter.wrapping_add(inc), now);
    }

    pub(crate) fn decrease_by(&mut self, dec: i64, now: u64) {
        self.decrement_sum = self.decrement_sum.wrapping_add(dec);
        self.set(self.counter.wrapping_sub(dec), now);
    }

    /// Sets the value; both extremes follow, the latest equal one wins.
    pub(crate) fn set(&mut self, value: i64, now: u64) {
        self.counter = value;
        if value >= self.max {
            self.max = value;
            self.max_timestamp = now;
        }
        if value <= self.min {
            self.min = value;
            self.min_timestamp = now;
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn sample(
        &self,
        name: Option<String>,
        note: Option<String>,
        usage: Usage,
    ) -> CounterSample {
        CounterSample {
            name,
            note,
            first_usage: usage.first,
            last_usage: usage.last,
            last_reset: usage.reset,
            counter: self.counter,
            min: self.min,
            min_timestamp: self.min_timestamp,
            max: self.max,
            max_timestamp: self.max_timestamp,
            increment_sum: self.increment_sum,
            decrement_sum: self.decrement_sum,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum CounterOp {
    Increase,
    Decrease,
    IncreaseBy(i64),
    DecreaseBy(i64),
    Set(i64),
}

impl CounterOp {
    fn apply(self, stats: &mut CounterStats, now: u64) {
        match self {
            CounterOp::Increase => stats.increase(now),
            CounterOp::Decrease => stats.decrease(now),
            CounterOp::IncreaseBy(inc) => stats.increase_by(inc, now),
            CounterOp::DecreaseBy(dec) => stats.decrease_by(dec, now),
            CounterOp::Set(value) => stats.set(value, now),
        }
    }
}

impl MonitorNode {
    fn counter_op(&self, op: CounterOp) {
        if !self.is_enabled() {
            return;
        }
        let now = self.now_millis();
        let notify = self.has_listeners();
        self.update(
            |data| {
                let Payload::Counter(stats) = &mut data.payload else {
                    return None;
                };
                op.apply(stats, now);
                data.usage.touch(now);
                data.incrementals.apply(now, |payload| {
                    if let Payload::Counter(stats) = payload {
                        op.apply(stats, now);
                    }
                });
                if notify {
                    data.counter_sample(self.name())
                } else {
                    None
                }
            },
            |sample| {
                let callback = &self.shared.callback;
                match op {
                    CounterOp::Increase => callback.on_counter_increase(self, 1, &sample),
                    CounterOp::IncreaseBy(inc) => callback.on_counter_increase(self, inc, &sample),
                    CounterOp::Decrease => callback.on_counter_decrease(self, 1, &sample),
                    CounterOp::DecreaseBy(dec) => callback.on_counter_decrease(self, dec, &sample),
                    CounterOp::Set(value) => callback.on_counter_set(self, value, &sample),
                }
            },
        );
    }

    fn counter_stats<R: Default>(&self, f: impl FnOnce(&CounterStats) -> R) -> R {
        self.read(|data| match &data.payload {
            Payload::Counter(stats) => f(stats),
            _ => R::default(),
        })
    }
}

impl Counter for MonitorNode {
    fn increase(&self) -> &dyn Counter {
        self.counter_op(CounterOp::Increase);
        self
    }

    fn increase_by(&self, inc: i64) -> &dyn Counter {
        self.counter_op(CounterOp::IncreaseBy(inc));
        self
    }

    fn decrease(&self) -> &dyn Counter {
        self.counter_op(CounterOp::Decrease);
        self
    }

    fn decrease_by(&self, dec: i64) -> &dyn Counter {
        self.counter_op(CounterOp::DecreaseBy(dec));
        self
    }

    fn set(&self, value: i64) -> &dyn Counter {
        self.counter_op(CounterOp::Set(value));
        self
    }

    fn value(&self) -> i64 {
        self.counter_stats(|s| s.counter)
    }

    fn min(&self) -> i64 {
        self.read(|data| match &data.payload {
            Payload::Counter(stats) => stats.min,
            _ => i64::MAX,
        })
    }

    fn min_timestamp(&self) -> u64 {
        self.counter_stats(|s| s.min_timestamp)
    }

    fn max(&self) -> i64 {
        self.read(|data| match &data.payload {
            Payload::Counter(stats) => stats.max,
            _ => i64::MIN,
        })
    }

    fn max_timestamp(&self) -> u64 {
        self.counter_stats(|s| s.max_timestamp)
    }

    fn increment_sum(&self) -> i64 {
        self.counter_stats(|s| s.increment_sum)
    }

    fn decrement_sum(&self) -> i64 {
        self.counter_stats(|s| s.decrement_sum)
    }

    fn sample_counter(&self) -> CounterSample {
        self.read(|data| {
            data.counter_sample(self.name())
                .unwrap_or_else(|| CounterSample::empty(self.name().map(str::to_string)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::node::testing::Fixture;
    use std::sync::Arc;
    use watchtree_types::{MonitorKind, MonitorState};

    fn counter(fx: &Fixture) -> Arc<MonitorNode> {
        fx.node("c", MonitorKind::Counter)
    }

    #[test]
    fn first_observation_sets_both_extremes() {
        let mut stats = CounterStats::new();
        stats.set(5, 7);
        assert_eq!((stats.min, stats.max), (5, 5));
        assert_eq!((stats.min_timestamp, stats.max_timestamp), (7, 7));
    }

    #[test]
    fn increase_only_moves_max() {
        let mut stats = CounterStats::new();
        stats.increase(1);
        assert_eq!(stats.max, 1);
        assert_eq!(stats.min, i64::MAX);
        stats.decrease(2);
        assert_eq!(stats.min, 0);
        assert_eq!(stats.min_timestamp, 2);
    }

    #[test]
    fn latest_equal_extreme_wins() {
        let mut stats = CounterStats::new();
        stats.set(3, 10);
        stats.set(3, 20);
        assert_eq!(stats.max_timestamp, 20);
        assert_eq!(stats.min_timestamp, 20);
    }

    #[test]
    fn negative_increase_credits_increment_sum() {
        let mut stats = CounterStats::new();
        stats.increase_by(-3, 1);
        assert_eq!(stats.counter, -3);
        assert_eq!(stats.increment_sum, -3);
        assert_eq!(stats.decrement_sum, 0);
    }

    #[test]
    fn set_credits_neither_sum() {
        let mut stats = CounterStats::new();
        stats.set(42, 1);
        assert_eq!(stats.increment_sum, 0);
        assert_eq!(stats.decrement_sum, 0);
    }

    #[test]
    fn increase_then_decrease_restores_value() {
        let fx = Fixture::new();
        let c = counter(&fx);
        c.set(10);
        c.increase_by(7).decrease_by(7);
        assert_eq!(c.value(), 10);
        assert_eq!(c.increment_sum(), 7);
        assert_eq!(c.decrement_sum(), 7);
        assert_eq!(Counter::max(&*c), 17);
        assert_eq!(Counter::min(&*c), 10);
    }

    #[test]
    fn disabled_counter_ignores_mutators() {
        let fx = Fixture::new();
        let c = counter(&fx);
        c.increase();
        c.set_state(MonitorState::Disabled, false);
        c.increase().increase_by(10).set(99);
        assert_eq!(c.value(), 1);
        assert_eq!(c.increment_sum(), 1);
    }

    #[test]
    fn usage_timestamps_follow_clock() {
        let fx = Fixture::new();
        let c = counter(&fx);
        assert_eq!(c.first_usage(), 0);
        c.increase();
        fx.clock.advance_millis(5);
        c.decrease();
        assert_eq!(c.first_usage(), 1_000);
        assert_eq!(c.last_usage(), 1_005);
        assert_eq!(c.max_timestamp(), 1_000);
        assert_eq!(c.min_timestamp(), 1_005);
    }

    #[test]
    fn sample_and_reset_keeps_metadata() {
        let fx = Fixture::new();
        let c = counter(&fx);
        c.set_note(Some("queue depth".into()));
        c.increase_by(4);
        fx.clock.advance_millis(10);

        let sample = c.sample_and_reset();
        assert_eq!(sample.as_counter().unwrap().counter, 4);

        let after = c.sample_counter();
        assert_eq!(after.counter, 0);
        assert_eq!(after.increment_sum, 0);
        assert_eq!(after.max, i64::MIN);
        assert_eq!(after.first_usage, 1_000);
        assert_eq!(after.last_reset, 1_010);
        assert_eq!(after.name.as_deref(), Some("c"));
        assert_eq!(after.note.as_deref(), Some("queue depth"));
    }

    #[test]
    fn incremental_sampling_returns_deltas() {
        let fx = Fixture::new();
        let c = counter(&fx);
        c.increase_by(5);

        let first = c.sample_increment("k");
        assert_eq!(first.as_counter().unwrap().counter, 5);

        c.increase_by(2);
        c.increase();
        let delta = c.sample_increment("k");
        let delta = delta.as_counter().unwrap();
        assert_eq!(delta.counter, 3);
        assert_eq!(delta.increment_sum, 3);

        let empty = c.sample_increment("k");
        assert_eq!(empty.as_counter().unwrap().increment_sum, 0);
        assert_eq!(c.value(), 8);

        assert!(c.stop_incremental_sampling("k"));
        assert!(!c.stop_incremental_sampling("k"));
    }
}
