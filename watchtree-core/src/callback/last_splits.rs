//! The most recent splits of each stopwatch.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use watchtree_types::{Nanos, StopwatchSample};

use super::attached::AttributeSlot;
use super::{parse_property, Callback};
use crate::error::ConfigError;
use crate::monitor::{Monitor, Stopwatch};
use crate::split::Split;

/// Default minimum start distance, in nanoseconds, between two splits
/// compared by [`LastSplits::trend`].
pub const DEFAULT_TREND_THRESHOLD: u64 = 1_000;

/// Bounded history of `(start, duration)` pairs, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastSplits {
    capacity: usize,
    entries: VecDeque<(u64, u64)>,
}

impl LastSplits {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Records a split started at `start` (clock nanoseconds) lasting
    /// `duration`. Drops the oldest entry when full.
    pub fn push(&mut self, start: u64, duration: u64) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((start, duration));
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Durations, oldest first.
    pub fn durations(&self) -> Vec<u64> {
        self.entries.iter().map(|&(_, duration)| duration).collect()
    }

    pub fn min(&self) -> Option<u64> {
        self.entries.iter().map(|&(_, d)| d).min()
    }

    pub fn max(&self) -> Option<u64> {
        self.entries.iter().map(|&(_, d)| d).max()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let total: f64 = self.entries.iter().map(|&(_, d)| d as f64).sum();
        Some(total / self.entries.len() as f64)
    }

    /// Mean change in duration between successive splits whose starts are
    /// more than `threshold` nanoseconds apart. Positive when splits get
    /// slower. `None` without at least one such pair.
    pub fn trend(&self, threshold: u64) -> Option<f64> {
        let mut entries = self.entries.iter();
        let &(mut last_start, mut last_duration) = entries.next()?;
        let mut delta_sum = 0i128;
        let mut pairs = 0u32;
        for &(start, duration) in entries {
            if start.saturating_sub(last_start) > threshold {
                delta_sum += duration as i128 - last_duration as i128;
                pairs += 1;
                last_start = start;
                last_duration = duration;
            }
        }
        (pairs > 0).then(|| delta_sum as f64 / pairs as f64)
    }
}

impl fmt::Display for LastSplits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LastSplits[size={}", self.len())?;
        if let (Some(min), Some(mean), Some(max)) = (self.min(), self.mean(), self.max()) {
            let values: Vec<String> = self
                .durations()
                .into_iter()
                .map(|d| Nanos(d).to_string())
                .collect();
            write!(
                f,
                ",values=[{}],min={},mean={},max={}",
                values.join(","),
                Nanos(min),
                Nanos(mean as u64),
                Nanos(max)
            )?;
            if let Some(trend) = self.trend(DEFAULT_TREND_THRESHOLD) {
                let sign = if trend < 0.0 { "-" } else { "" };
                write!(f, ",trend={}{}", sign, Nanos(trend.abs() as u64))?;
            }
        }
        f.write_str("]")
    }
}

/// Keeps the last `capacity` splits of every stopwatch in the attribute
/// `last-splits`.
///
/// With logging on, the history is logged at debug level each time it
/// has been refilled.
#[derive(Debug)]
pub struct LastSplitsCallback {
    capacity: usize,
    log: bool,
    slot: AttributeSlot,
}

struct History {
    splits: LastSplits,
    since_log: usize,
}

impl LastSplitsCallback {
    pub const ATTRIBUTE: &'static str = "last-splits";

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            log: false,
            slot: AttributeSlot::new(Self::ATTRIBUTE),
        }
    }

    pub fn with_logging(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    /// Builds the callback from configuration properties: `capacity`
    /// (default 10, at least 1) and `log` (`true`/`false`).
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        const KIND: &str = "last-splits";
        let capacity = parse_property(KIND, properties, "capacity")?.unwrap_or(10);
        if capacity == 0 {
            return Err(ConfigError::InvalidProperty {
                kind: KIND.to_string(),
                property: "capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let log = parse_property(KIND, properties, "log")?.unwrap_or(false);
        Ok(Self::new(capacity).with_logging(log))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the history of `stopwatch`, if it recorded anything.
    pub fn last_splits(&self, stopwatch: &dyn Monitor) -> Option<LastSplits> {
        let history = self.slot.get::<History>(stopwatch)?;
        let splits = history.lock().splits.clone();
        Some(splits)
    }

    fn record(&self, stopwatch: &dyn Monitor, split: &Split) {
        let Some(history) = self.slot.get_or_insert_with(stopwatch, || History {
            splits: LastSplits::new(self.capacity),
            since_log: 0,
        }) else {
            return;
        };
        let mut history = history.lock();
        history.splits.push(split.start_nanos(), split.running_for());
        if self.log {
            history.since_log += 1;
            if history.since_log >= self.capacity {
                history.since_log = 0;
                tracing::debug!(
                    stopwatch = stopwatch.name().unwrap_or("<anonymous>"),
                    "{}",
                    history.splits
                );
            }
        }
    }
}

impl Default for LastSplitsCallback {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Callback for LastSplitsCallback {
    fn on_stopwatch_stop(&self, split: &Split, _sample: &StopwatchSample) {
        if let Some(stopwatch) = split.stopwatch() {
            self.record(stopwatch.as_monitor(), split);
        }
    }

    fn on_stopwatch_add(&self, stopwatch: &dyn Stopwatch, split: &Split, _sample: &StopwatchSample) {
        self.record(stopwatch.as_monitor(), split);
    }
}
