//! Aggregates - many samples folded into one summary.
//!
//! Typically used to summarize a subtree of monitors, e.g. all stopwatches
//! under `db.*`.

use crate::{CounterSample, StopwatchSample};

/// Summary of several stopwatch samples.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopwatchAggregate {
    total: u64,
    counter: u64,
    min: u64,
    min_timestamp: u64,
    max: u64,
    max_timestamp: u64,
    active: u64,
    max_active: u64,
    max_active_timestamp: u64,
}

impl StopwatchAggregate {
    /// An aggregate with no samples.
    pub fn new() -> Self {
        Self {
            total: 0,
            counter: 0,
            min: u64::MAX,
            min_timestamp: 0,
            max: 0,
            max_timestamp: 0,
            active: 0,
            max_active: 0,
            max_active_timestamp: 0,
        }
    }

    /// Fold one sample in.
    pub fn add_sample(&mut self, sample: &StopwatchSample) {
        self.total = self.total.saturating_add(sample.total);
        self.counter = self.counter.saturating_add(sample.counter);

        if sample.min < self.min {
            self.min = sample.min;
            self.min_timestamp = sample.min_timestamp;
        }
        if sample.max > self.max {
            self.max = sample.max;
            self.max_timestamp = sample.max_timestamp;
        }

        self.active = self.active.saturating_add(sample.active);
        if sample.max_active > self.max_active {
            self.max_active = sample.max_active;
            self.max_active_timestamp = sample.max_active_timestamp;
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn min_timestamp(&self) -> u64 {
        self.min_timestamp
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn max_timestamp(&self) -> u64 {
        self.max_timestamp
    }

    pub fn active(&self) -> u64 {
        self.active
    }

    pub fn max_active(&self) -> u64 {
        self.max_active
    }

    pub fn max_active_timestamp(&self) -> u64 {
        self.max_active_timestamp
    }

    /// Mean over all folded durations, 0 without measurements.
    pub fn mean(&self) -> f64 {
        if self.counter == 0 {
            0.0
        } else {
            self.total as f64 / self.counter as f64
        }
    }
}

impl Default for StopwatchAggregate {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of several counter samples.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterAggregate {
    counter: i64,
    min: i64,
    min_timestamp: u64,
    max: i64,
    max_timestamp: u64,
    increment_sum: i64,
    decrement_sum: i64,
}

impl CounterAggregate {
    /// An aggregate with no samples.
    pub fn new() -> Self {
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

    /// Fold one sample in.
    pub fn add_sample(&mut self, sample: &CounterSample) {
        self.counter = self.counter.saturating_add(sample.counter);
        if sample.min < self.min {
            self.min = sample.min;
            self.min_timestamp = sample.min_timestamp;
        }
        if sample.max > self.max {
            self.max = sample.max;
            self.max_timestamp = sample.max_timestamp;
        }
        self.increment_sum = self.increment_sum.saturating_add(sample.increment_sum);
        self.decrement_sum = self.decrement_sum.saturating_add(sample.decrement_sum);
    }

    /// Sum of the counter values.
    pub fn counter(&self) -> i64 {
        self.counter
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn min_timestamp(&self) -> u64 {
        self.min_timestamp
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn max_timestamp(&self) -> u64 {
        self.max_timestamp
    }

    pub fn increment_sum(&self) -> i64 {
        self.increment_sum
    }

    pub fn decrement_sum(&self) -> i64 {
        self.decrement_sum
    }
}

impl Default for CounterAggregate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopwatch(total: u64, counter: u64, min: u64, max: u64, ts: u64) -> StopwatchSample {
        let mut sample = StopwatchSample::empty(None);
        sample.total = total;
        sample.counter = counter;
        sample.min = min;
        sample.min_timestamp = ts;
        sample.max = max;
        sample.max_timestamp = ts;
        sample
    }

    #[test]
    fn empty_stopwatch_aggregate() {
        let aggregate = StopwatchAggregate::new();
        assert_eq!(aggregate.counter(), 0);
        assert_eq!(aggregate.min(), u64::MAX);
        assert_eq!(aggregate.mean(), 0.0);
    }

    #[test]
    fn stopwatch_aggregate_keeps_extremes_with_their_timestamps() {
        let mut aggregate = StopwatchAggregate::new();
        aggregate.add_sample(&stopwatch(30, 2, 10, 20, 100));
        aggregate.add_sample(&stopwatch(50, 2, 5, 45, 200));
        aggregate.add_sample(&stopwatch(0, 0, u64::MAX, 0, 0));

        assert_eq!(aggregate.total(), 80);
        assert_eq!(aggregate.counter(), 4);
        assert_eq!(aggregate.min(), 5);
        assert_eq!(aggregate.min_timestamp(), 200);
        assert_eq!(aggregate.max(), 45);
        assert_eq!(aggregate.max_timestamp(), 200);
        assert_eq!(aggregate.mean(), 20.0);
    }

    #[test]
    fn stopwatch_aggregate_sums_active() {
        let mut a = StopwatchSample::empty(None);
        a.active = 2;
        a.max_active = 3;
        a.max_active_timestamp = 7;
        let mut b = StopwatchSample::empty(None);
        b.active = 1;
        b.max_active = 1;

        let mut aggregate = StopwatchAggregate::default();
        aggregate.add_sample(&a);
        aggregate.add_sample(&b);
        assert_eq!(aggregate.active(), 3);
        assert_eq!(aggregate.max_active(), 3);
        assert_eq!(aggregate.max_active_timestamp(), 7);
    }

    #[test]
    fn counter_aggregate_sums_values_and_sums() {
        let mut a = CounterSample::empty(None);
        a.counter = 4;
        a.max = 4;
        a.max_timestamp = 10;
        a.increment_sum = 4;
        let mut b = CounterSample::empty(None);
        b.counter = -2;
        b.min = -2;
        b.min_timestamp = 20;
        b.decrement_sum = 2;

        let mut aggregate = CounterAggregate::new();
        aggregate.add_sample(&a);
        aggregate.add_sample(&b);
        assert_eq!(aggregate.counter(), 2);
        assert_eq!(aggregate.max(), 4);
        assert_eq!(aggregate.min(), -2);
        assert_eq!(aggregate.min_timestamp(), 20);
        assert_eq!(aggregate.increment_sum(), 4);
        assert_eq!(aggregate.decrement_sum(), 2);
    }
}
