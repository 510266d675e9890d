//! Split durations sorted into fixed-width buckets, for estimating
//! quantiles without keeping the samples.
//!
//! For `min = 0`, `max = 500` and five buckets the layout is:
//!
//! ```text
//! index   0      1      2        3        4        5        6
//! range   <0     0-100  100-200  200-300  300-400  400-500  >=500
//! ```
//!
//! The two outer buckets only count outliers. A quantile is found by
//! walking the cumulative counts and interpolating linearly inside the
//! bucket that holds it.

use std::collections::BTreeMap;
use std::fmt;

use watchtree_types::{Nanos, StopwatchSample};

use super::attached::AttributeSlot;
use super::{parse_property, Callback};
use crate::error::{ConfigError, QuantileError};
use crate::monitor::{Monitor, Stopwatch};
use crate::split::Split;

/// One bucket. `min` is inclusive, `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub min: u64,
    pub max: u64,
    pub count: u64,
}

/// Regular buckets between `min` and `max`, plus one underflow and one
/// overflow bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets {
    min: u64,
    max: u64,
    width: u64,
    counts: Vec<u64>,
}

impl Buckets {
    /// `count` regular buckets of equal width; the last one absorbs the
    /// rounding remainder up to `max`.
    pub fn new(min: u64, max: u64, count: usize) -> Result<Self, QuantileError> {
        if count < 3 {
            return Err(QuantileError::TooFewBuckets(count));
        }
        let width = max.saturating_sub(min) / count as u64;
        if width == 0 {
            return Err(QuantileError::NarrowRange { min, max, count });
        }
        Ok(Self {
            min,
            max,
            width,
            counts: vec![0; count + 2],
        })
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    /// Number of regular buckets.
    pub fn count(&self) -> usize {
        self.counts.len() - 2
    }

    /// Values recorded so far, outliers included.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn bounds(&self, index: usize) -> (u64, u64) {
        let last = self.counts.len() - 1;
        if index == 0 {
            (0, self.min)
        } else if index == last {
            (self.max, u64::MAX)
        } else if index == last - 1 {
            (self.min + (index as u64 - 1) * self.width, self.max)
        } else {
            let lower = self.min + (index as u64 - 1) * self.width;
            (lower, lower + self.width)
        }
    }

    fn index_of(&self, value: u64) -> usize {
        if value < self.min {
            0
        } else if value >= self.max {
            self.counts.len() - 1
        } else {
            let regular = ((value - self.min) / self.width) as usize;
            1 + regular.min(self.count() - 1)
        }
    }

    pub fn add(&mut self, value: u64) {
        let index = self.index_of(value);
        self.counts[index] += 1;
    }

    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|count| *count = 0);
    }

    /// All buckets, underflow first.
    pub fn buckets(&self) -> Vec<Bucket> {
        self.counts
            .iter()
            .enumerate()
            .map(|(index, &count)| {
                let (min, max) = self.bounds(index);
                Bucket { min, max, count }
            })
            .collect()
    }

    /// Estimated value below which `ratio` of the recorded values fall.
    ///
    /// Needs values in at least three regular buckets, and the quantile
    /// must not land in an outlier bucket.
    pub fn quantile(&self, ratio: f64) -> Result<f64, QuantileError> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(QuantileError::InvalidRatio(ratio));
        }
        let last = self.counts.len() - 1;
        let used = self.counts[1..last].iter().filter(|&&c| c > 0).count();
        if used < 3 {
            return Err(QuantileError::NotEnoughBuckets(used));
        }

        let expected = ratio * self.total() as f64;
        let mut below = 0.0;
        let mut index = last;
        for (i, &count) in self.counts.iter().enumerate() {
            let through = below + count as f64;
            if expected >= below && expected <= through {
                index = i;
                break;
            }
            below = through;
        }

        if index == 0 {
            return Err(QuantileError::BelowRange);
        }
        if index == last {
            return Err(QuantileError::AboveRange);
        }
        let (lower, upper) = self.bounds(index);
        let count = self.counts[index];
        if count == 0 {
            return Ok(lower as f64);
        }
        Ok(lower as f64 + (expected - below) * (upper - lower) as f64 / count as f64)
    }

    pub fn median(&self) -> Result<f64, QuantileError> {
        self.quantile(0.5)
    }

    /// First, second and third quartile; `None` where not computable.
    pub fn quartiles(&self) -> [Option<f64>; 3] {
        [0.25, 0.5, 0.75].map(|ratio| self.quantile(ratio).ok())
    }
}

impl fmt::Display for Buckets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buckets[min={},max={},nb={},width={}] Quantiles[",
            Nanos(self.min),
            Nanos(self.max),
            self.count(),
            Nanos(self.width)
        )?;
        let labels = ["median", "75%", "90%"];
        let mut first = true;
        for (label, ratio) in labels.iter().zip([0.5, 0.75, 0.9]) {
            if let Ok(value) = self.quantile(ratio) {
                if !first {
                    f.write_str(",")?;
                }
                first = false;
                write!(f, "{}={}", label, Nanos(value as u64))?;
            }
        }
        f.write_str("]")
    }
}

/// How a stopwatch's buckets are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketLayout {
    /// The same range for every stopwatch, in nanoseconds.
    Fixed { min: u64, max: u64, count: usize },
    /// Keeps the first `warmup` durations, then derives the range from
    /// them: min -10% rounded down and max +10% rounded up, to the
    /// millisecond.
    Auto { warmup: usize, count: usize },
}

impl Default for BucketLayout {
    fn default() -> Self {
        BucketLayout::Auto {
            warmup: 10,
            count: 8,
        }
    }
}

enum QuantileState {
    WarmingUp(Vec<u64>),
    Ready(Buckets),
}

const NANOS_IN_MILLI: u64 = 1_000_000;

fn auto_buckets(values: &[u64], count: usize) -> Result<Buckets, QuantileError> {
    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);
    let low = (min / 100 * 90) / NANOS_IN_MILLI * NANOS_IN_MILLI;
    let high = (max / 100 * 110 / NANOS_IN_MILLI + 1) * NANOS_IN_MILLI;
    let mut buckets = Buckets::new(low, high, count)?;
    for &value in values {
        buckets.add(value);
    }
    Ok(buckets)
}

/// Sorts every stopped or added split into its stopwatch's [`Buckets`].
///
/// The buckets live in the stopwatch attribute `buckets`; read them back
/// with [`buckets`](QuantilesCallback::buckets).
#[derive(Debug)]
pub struct QuantilesCallback {
    layout: BucketLayout,
    slot: AttributeSlot,
}

impl QuantilesCallback {
    pub const ATTRIBUTE: &'static str = "buckets";

    /// Fails when a fixed layout cannot be built or asks for fewer than
    /// three buckets.
    pub fn new(layout: BucketLayout) -> Result<Self, QuantileError> {
        match layout {
            BucketLayout::Fixed { min, max, count } => {
                Buckets::new(min, max, count)?;
            }
            BucketLayout::Auto { count, .. } if count < 3 => {
                return Err(QuantileError::TooFewBuckets(count));
            }
            BucketLayout::Auto { .. } => {}
        }
        Ok(Self {
            layout,
            slot: AttributeSlot::new(Self::ATTRIBUTE),
        })
    }

    /// Builds the callback from configuration properties: `buckets`
    /// (count, default 8), then either `min_ms` and `max_ms` for a fixed
    /// layout or `warmup` (default 10) for an automatic one.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        const KIND: &str = "quantiles";
        let count = parse_property(KIND, properties, "buckets")?.unwrap_or(8);
        let min: Option<u64> = parse_property(KIND, properties, "min_ms")?;
        let max: Option<u64> = parse_property(KIND, properties, "max_ms")?;
        let layout = match (min, max) {
            (Some(min), Some(max)) => BucketLayout::Fixed {
                min: Nanos::from_millis(min).as_nanos(),
                max: Nanos::from_millis(max).as_nanos(),
                count,
            },
            (None, None) => BucketLayout::Auto {
                warmup: parse_property(KIND, properties, "warmup")?.unwrap_or(10),
                count,
            },
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::InvalidProperty {
                    kind: KIND.to_string(),
                    property: if min.is_some() { "max_ms" } else { "min_ms" }.to_string(),
                    reason: "min_ms and max_ms go together".to_string(),
                })
            }
        };
        Self::new(layout).map_err(|e| ConfigError::InvalidProperty {
            kind: KIND.to_string(),
            property: "buckets".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn layout(&self) -> BucketLayout {
        self.layout
    }

    /// Copy of the buckets of `stopwatch`, `None` while it warms up.
    pub fn buckets(&self, stopwatch: &dyn Monitor) -> Option<Buckets> {
        let state = self.slot.get::<QuantileState>(stopwatch)?;
        let state = state.lock();
        match &*state {
            QuantileState::Ready(buckets) => Some(buckets.clone()),
            QuantileState::WarmingUp(_) => None,
        }
    }

    fn initial_state(&self) -> QuantileState {
        match self.layout {
            BucketLayout::Fixed { min, max, count } => match Buckets::new(min, max, count) {
                Ok(buckets) => QuantileState::Ready(buckets),
                Err(_) => QuantileState::WarmingUp(Vec::new()),
            },
            BucketLayout::Auto { warmup, .. } => QuantileState::WarmingUp(Vec::with_capacity(warmup)),
        }
    }

    fn record(&self, stopwatch: &dyn Monitor, value: u64) {
        let Some(state) = self.slot.get_or_insert_with(stopwatch, || self.initial_state()) else {
            return;
        };
        let mut state = state.lock();
        let promoted = match &mut *state {
            QuantileState::Ready(buckets) => {
                buckets.add(value);
                None
            }
            QuantileState::WarmingUp(values) => {
                values.push(value);
                match self.layout {
                    BucketLayout::Auto { warmup, count } if values.len() >= warmup => {
                        match auto_buckets(values, count) {
                            Ok(buckets) => Some(buckets),
                            Err(e) => {
                                tracing::warn!(
                                    stopwatch = stopwatch.name().unwrap_or("<anonymous>"),
                                    error = %e,
                                    "Cannot lay out quantile buckets"
                                );
                                None
                            }
                        }
                    }
                    _ => None,
                }
            }
        };
        if let Some(buckets) = promoted {
            tracing::debug!(
                stopwatch = stopwatch.name().unwrap_or("<anonymous>"),
                min = %Nanos(buckets.min()),
                max = %Nanos(buckets.max()),
                "Quantile buckets ready"
            );
            *state = QuantileState::Ready(buckets);
        }
    }
}

impl Default for QuantilesCallback {
    fn default() -> Self {
        Self {
            layout: BucketLayout::default(),
            slot: AttributeSlot::new(Self::ATTRIBUTE),
        }
    }
}

impl Callback for QuantilesCallback {
    fn on_stopwatch_stop(&self, split: &Split, _sample: &StopwatchSample) {
        if let Some(stopwatch) = split.stopwatch() {
            self.record(stopwatch.as_monitor(), split.running_for());
        }
    }

    fn on_stopwatch_add(&self, stopwatch: &dyn Stopwatch, split: &Split, _sample: &StopwatchSample) {
        self.record(stopwatch.as_monitor(), split.running_for());
    }
}
