//! Split statistics per fixed time window.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use watchtree_types::{Nanos, StopwatchSample};

use super::attached::AttributeSlot;
use super::{parse_property, Callback};
use crate::error::ConfigError;
use crate::monitor::{Monitor, Stopwatch};
use crate::split::Split;

/// Durations recorded in `[start, end)`, in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    start: u64,
    end: u64,
    counter: u64,
    total: u64,
    square_total: f64,
    min: u64,
    max: u64,
    last: u64,
    last_timestamp: u64,
}

impl TimeRange {
    fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            counter: 0,
            total: 0,
            square_total: 0.0,
            min: u64::MAX,
            max: 0,
            last: 0,
            last_timestamp: 0,
        }
    }

    fn contains(&self, timestamp: u64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    fn add(&mut self, timestamp: u64, duration: u64) {
        self.counter += 1;
        self.total = self.total.saturating_add(duration);
        self.square_total += duration as f64 * duration as f64;
        self.min = self.min.min(duration);
        self.max = self.max.max(duration);
        self.last = duration;
        self.last_timestamp = timestamp;
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// `u64::MAX` while empty.
    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn last(&self) -> u64 {
        self.last
    }

    /// Millisecond timestamp of the latest split in this range.
    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp
    }

    pub fn mean(&self) -> Option<f64> {
        (self.counter > 0).then(|| self.total as f64 / self.counter as f64)
    }

    /// Population variance.
    pub fn variance(&self) -> Option<f64> {
        let mean = self.mean()?;
        Some((self.square_total / self.counter as f64 - mean * mean).max(0.0))
    }

    pub fn standard_deviation(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TimeRange[{}-{}] counter={} min={} mean={} last={} max={}",
            self.start,
            self.end,
            self.counter,
            Nanos(self.min),
            Nanos(self.mean().unwrap_or(0.0) as u64),
            Nanos(self.last),
            Nanos(self.max),
        )
    }
}

/// The latest `capacity` time ranges of one stopwatch, oldest first.
///
/// A split older than every kept range is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    capacity: usize,
    width: u64,
    ranges: VecDeque<TimeRange>,
}

impl Timeline {
    /// `width` is in milliseconds and must not be 0.
    pub fn new(capacity: usize, width: u64) -> Self {
        Self {
            capacity,
            width: width.max(1),
            ranges: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn ranges(&self) -> &VecDeque<TimeRange> {
        &self.ranges
    }

    /// Records a split started at `timestamp` (milliseconds).
    pub fn add(&mut self, timestamp: u64, duration: u64) {
        if let Some(range) = self.range_for(timestamp) {
            range.add(timestamp, duration);
        }
    }

    fn range_for(&mut self, timestamp: u64) -> Option<&mut TimeRange> {
        let newer = self
            .ranges
            .back()
            .map_or(true, |latest| timestamp >= latest.end);
        if newer {
            if self.capacity == 0 {
                return None;
            }
            let start = timestamp - timestamp % self.width;
            if self.ranges.len() == self.capacity {
                self.ranges.pop_front();
            }
            self.ranges.push_back(TimeRange::new(start, start + self.width));
            return self.ranges.back_mut();
        }
        self.ranges
            .iter_mut()
            .rev()
            .find(|range| range.contains(timestamp))
    }
}

/// Keeps a [`Timeline`] per stopwatch in the attribute `timeline`.
#[derive(Debug)]
pub struct TimelineCallback {
    capacity: usize,
    width: u64,
    slot: AttributeSlot,
}

impl TimelineCallback {
    pub const ATTRIBUTE: &'static str = "timeline";

    /// `capacity` ranges of `width` milliseconds each.
    pub fn new(capacity: usize, width: u64) -> Self {
        Self::with_attribute(Self::ATTRIBUTE, capacity, width)
    }

    /// Like [`new`](TimelineCallback::new), stored under another attribute
    /// so several timelines can coexist.
    pub fn with_attribute(attribute: &str, capacity: usize, width: u64) -> Self {
        Self {
            capacity,
            width: width.max(1),
            slot: AttributeSlot::new(attribute),
        }
    }

    /// Builds the callback from configuration properties: `capacity`
    /// (default 6), `width_ms` (default 360000) and `attribute`.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        const KIND: &str = "timeline";
        let capacity: usize = parse_property(KIND, properties, "capacity")?.unwrap_or(6);
        let width: u64 = parse_property(KIND, properties, "width_ms")?.unwrap_or(6 * 60 * 1_000);
        for (property, value) in [("capacity", capacity as u64), ("width_ms", width)] {
            if value == 0 {
                return Err(ConfigError::InvalidProperty {
                    kind: KIND.to_string(),
                    property: property.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        let attribute = properties
            .get("attribute")
            .map(String::as_str)
            .unwrap_or(Self::ATTRIBUTE);
        Ok(Self::with_attribute(attribute, capacity, width))
    }

    pub fn attribute(&self) -> &str {
        self.slot.name()
    }

    /// Copy of the timeline of `stopwatch`, if it recorded anything.
    pub fn timeline(&self, stopwatch: &dyn Monitor) -> Option<Timeline> {
        let timeline = self.slot.get::<Timeline>(stopwatch)?;
        let copy = timeline.lock().clone();
        Some(copy)
    }

    fn record(&self, stopwatch: &dyn Monitor, split: &Split) {
        if let Some(timeline) = self
            .slot
            .get_or_insert_with(stopwatch, || Timeline::new(self.capacity, self.width))
        {
            timeline.lock().add(split.start_millis(), split.running_for());
        }
    }
}

impl Default for TimelineCallback {
    fn default() -> Self {
        Self::new(6, 6 * 60 * 1_000)
    }
}

impl Callback for TimelineCallback {
    fn on_stopwatch_stop(&self, split: &Split, _sample: &StopwatchSample) {
        if let Some(stopwatch) = split.stopwatch() {
            self.record(stopwatch.as_monitor(), split);
        }
    }

    fn on_stopwatch_add(&self, stopwatch: &dyn Stopwatch, split: &Split, _sample: &StopwatchSample) {
        self.record(stopwatch.as_monitor(), split);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::node::testing::Fixture;
    use std::sync::Arc;
    use watchtree_types::MonitorKind;

    const MINUTE: u64 = 60 * 1_000;
    const BASE: u64 = 1_000 * 5 * MINUTE;

    fn at(minutes: u64, seconds: u64) -> u64 {
        BASE + minutes * MINUTE + seconds * 1_000
    }

    #[test]
    fn splits_go_to_their_range() {
        let mut timeline = Timeline::new(10, 5 * MINUTE);
        timeline.add(at(1, 12), 100);
        timeline.add(at(2, 13), 200);
        timeline.add(at(3, 14), 300);
        timeline.add(at(6, 15), 100);
        timeline.add(at(7, 16), 200);
        timeline.add(at(4, 17), 200);
        timeline.add(BASE - 5 * MINUTE + 18_000, 400);
        timeline.add(at(11, 19), 100);
        timeline.add(at(12, 20), 200);
        timeline.add(at(13, 21), 200);
        timeline.add(at(4, 22), 250);

        let counters: Vec<u64> = timeline.ranges().iter().map(TimeRange::counter).collect();
        assert_eq!(counters, vec![5, 2, 3]);

        let first = &timeline.ranges()[0];
        assert_eq!((first.start(), first.end()), (BASE, BASE + 5 * MINUTE));
        assert_eq!(first.min(), 100);
        assert_eq!(first.max(), 300);
        assert_eq!(first.last(), 250);
        assert_eq!(first.mean(), Some(210.0));
    }

    #[test]
    fn oldest_range_is_dropped_when_full() {
        let mut timeline = Timeline::new(2, 1_000);
        for second in 0..4 {
            timeline.add(second * 1_000, 10);
        }
        let starts: Vec<u64> = timeline.ranges().iter().map(TimeRange::start).collect();
        assert_eq!(starts, vec![2_000, 3_000]);

        timeline.add(500, 10);
        assert_eq!(timeline.ranges().iter().map(TimeRange::counter).sum::<u64>(), 2);
    }

    #[test]
    fn range_statistics() {
        let mut range = TimeRange::new(0, 10);
        assert_eq!(range.mean(), None);
        assert_eq!(range.variance(), None);
        range.add(1, 2);
        range.add(2, 4);
        assert_eq!(range.mean(), Some(3.0));
        assert_eq!(range.variance(), Some(1.0));
        assert_eq!(range.standard_deviation(), Some(1.0));
        assert_eq!(range.last_timestamp(), 2);
    }

    #[test]
    fn callback_builds_timeline_lazily() {
        let fx = Fixture::new();
        let before = fx.node("before", MonitorKind::Stopwatch);
        let callback = Arc::new(TimelineCallback::new(4, 1_000));
        fx.shared.callback.add_callback(callback.clone());

        assert!(callback.timeline(&*before).is_none());
        let split = before.start();
        fx.clock.advance_millis(3);
        split.stop();
        fx.clock.advance_millis(2_000);
        before.add_time(5_000_000);

        let timeline = callback.timeline(&*before).unwrap();
        let counters: Vec<u64> = timeline.ranges().iter().map(TimeRange::counter).collect();
        assert_eq!(counters, vec![1, 1]);
        assert_eq!(timeline.ranges()[0].start(), 1_000);
        assert_eq!(timeline.ranges()[1].last(), 5_000_000);
    }

    #[test]
    fn properties_configure_the_timeline() {
        let props = BTreeMap::from([
            ("capacity".to_string(), "3".to_string()),
            ("width_ms".to_string(), "500".to_string()),
            ("attribute".to_string(), "tl".to_string()),
        ]);
        let callback = TimelineCallback::from_properties(&props).unwrap();
        assert_eq!(callback.attribute(), "tl");
        assert_eq!((callback.capacity, callback.width), (3, 500));

        let zero = BTreeMap::from([("width_ms".to_string(), "0".to_string())]);
        assert!(matches!(
            TimelineCallback::from_properties(&zero),
            Err(ConfigError::InvalidProperty { property, .. }) if property == "width_ms"
        ));
    }
}
