//! Samples - immutable snapshots of monitor accumulators.

use alloc::string::String;

use crate::MonitorKind;

/// Snapshot of a counter.
///
/// `min` and `max` hold sentinels (`i64::MAX` and `i64::MIN`) until the
/// counter has moved below or above anything seen before; their timestamps
/// stay 0 until then.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterSample {
    /// Name of the counter, `None` for anonymous counters.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub name: Option<String>,

    /// Free-form note attached to the counter.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub note: Option<String>,

    /// Millisecond timestamp of the first recorded update, 0 if never used.
    pub first_usage: u64,

    /// Millisecond timestamp of the latest recorded update.
    pub last_usage: u64,

    /// Millisecond timestamp of the latest reset, 0 if never reset.
    pub last_reset: u64,

    /// Current value.
    pub counter: i64,

    /// Lowest value observed.
    pub min: i64,

    /// When `min` was observed.
    pub min_timestamp: u64,

    /// Highest value observed.
    pub max: i64,

    /// When `max` was observed.
    pub max_timestamp: u64,

    /// Sum of all increments.
    pub increment_sum: i64,

    /// Sum of all decrements.
    pub decrement_sum: i64,
}

impl CounterSample {
    /// A sample of a counter nothing happened to.
    pub fn empty(name: Option<String>) -> Self {
        Self {
            name,
            note: None,
            first_usage: 0,
            last_usage: 0,
            last_reset: 0,
            counter: 0,
            min: i64::MAX,
            min_timestamp: 0,
            max: i64::MIN,
            max_timestamp: 0,
            increment_sum: 0,
            decrement_sum: 0,
        }
    }

    /// Lowest observed value, if any value was ever observed as a minimum.
    pub fn defined_min(&self) -> Option<i64> {
        (self.min != i64::MAX || self.min_timestamp != 0).then_some(self.min)
    }

    /// Highest observed value, if any value was ever observed as a maximum.
    pub fn defined_max(&self) -> Option<i64> {
        (self.max != i64::MIN || self.max_timestamp != 0).then_some(self.max)
    }
}

/// Snapshot of a stopwatch. All durations are in nanoseconds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopwatchSample {
    /// Name of the stopwatch, `None` for anonymous stopwatches.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub name: Option<String>,

    /// Free-form note attached to the stopwatch.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub note: Option<String>,

    /// Millisecond timestamp of the first recorded update, 0 if never used.
    pub first_usage: u64,

    /// Millisecond timestamp of the latest recorded update.
    pub last_usage: u64,

    /// Millisecond timestamp of the latest reset, 0 if never reset.
    pub last_reset: u64,

    /// Sum of all measured durations.
    pub total: u64,

    /// Number of measured durations.
    pub counter: u64,

    /// Shortest duration, `u64::MAX` when nothing was measured.
    pub min: u64,

    /// When `min` was measured.
    pub min_timestamp: u64,

    /// Longest duration, 0 when nothing was measured.
    pub max: u64,

    /// When `max` was measured.
    pub max_timestamp: u64,

    /// Most recent duration.
    pub last: u64,

    /// Splits currently running.
    pub active: u64,

    /// Peak of `active`.
    pub max_active: u64,

    /// When `max_active` was reached.
    pub max_active_timestamp: u64,

    /// Mean duration.
    pub mean: f64,

    /// Sample variance (divides by `counter - 1`).
    pub variance: f64,

    /// Population variance (divides by `counter`).
    pub variance_n: f64,

    /// Square root of the population variance.
    pub standard_deviation: f64,
}

impl StopwatchSample {
    /// A sample of a stopwatch nothing happened to.
    pub fn empty(name: Option<String>) -> Self {
        Self {
            name,
            note: None,
            first_usage: 0,
            last_usage: 0,
            last_reset: 0,
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
            mean: 0.0,
            variance: 0.0,
            variance_n: 0.0,
            standard_deviation: 0.0,
        }
    }

    /// Shortest duration, if anything was measured.
    pub fn defined_min(&self) -> Option<u64> {
        (self.counter > 0).then_some(self.min)
    }
}

/// Snapshot of a placeholder monitor, which has nothing but metadata.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnknownSample {
    /// Name of the placeholder.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub name: Option<String>,

    /// Free-form note.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none", default))]
    pub note: Option<String>,

    /// Millisecond timestamp of the first usage.
    pub first_usage: u64,

    /// Millisecond timestamp of the latest usage.
    pub last_usage: u64,

    /// Millisecond timestamp of the latest reset.
    pub last_reset: u64,
}

/// A sample of any monitor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "lowercase"))]
pub enum Sample {
    Unknown(UnknownSample),
    Counter(CounterSample),
    Stopwatch(StopwatchSample),
}

impl Sample {
    /// Kind of the sampled monitor.
    pub fn kind(&self) -> MonitorKind {
        match self {
            Sample::Unknown(_) => MonitorKind::Unknown,
            Sample::Counter(_) => MonitorKind::Counter,
            Sample::Stopwatch(_) => MonitorKind::Stopwatch,
        }
    }

    /// Name of the sampled monitor.
    pub fn name(&self) -> Option<&str> {
        match self {
            Sample::Unknown(s) => s.name.as_deref(),
            Sample::Counter(s) => s.name.as_deref(),
            Sample::Stopwatch(s) => s.name.as_deref(),
        }
    }

    /// Note of the sampled monitor.
    pub fn note(&self) -> Option<&str> {
        match self {
            Sample::Unknown(s) => s.note.as_deref(),
            Sample::Counter(s) => s.note.as_deref(),
            Sample::Stopwatch(s) => s.note.as_deref(),
        }
    }

    pub fn first_usage(&self) -> u64 {
        match self {
            Sample::Unknown(s) => s.first_usage,
            Sample::Counter(s) => s.first_usage,
            Sample::Stopwatch(s) => s.first_usage,
        }
    }

    pub fn last_usage(&self) -> u64 {
        match self {
            Sample::Unknown(s) => s.last_usage,
            Sample::Counter(s) => s.last_usage,
            Sample::Stopwatch(s) => s.last_usage,
        }
    }

    /// The counter sample, if this is one.
    pub fn as_counter(&self) -> Option<&CounterSample> {
        match self {
            Sample::Counter(s) => Some(s),
            _ => None,
        }
    }

    /// The stopwatch sample, if this is one.
    pub fn as_stopwatch(&self) -> Option<&StopwatchSample> {
        match self {
            Sample::Stopwatch(s) => Some(s),
            _ => None,
        }
    }
}

impl From<CounterSample> for Sample {
    fn from(sample: CounterSample) -> Self {
        Sample::Counter(sample)
    }
}

impl From<StopwatchSample> for Sample {
    fn from(sample: StopwatchSample) -> Self {
        Sample::Stopwatch(sample)
    }
}

impl From<UnknownSample> for Sample {
    fn from(sample: UnknownSample) -> Self {
        Sample::Unknown(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_counter_sample_has_sentinels() {
        let sample = CounterSample::empty(None);
        assert_eq!(sample.min, i64::MAX);
        assert_eq!(sample.max, i64::MIN);
        assert_eq!(sample.defined_min(), None);
        assert_eq!(sample.defined_max(), None);
    }

    #[test]
    fn defined_extremes_follow_timestamps() {
        let mut sample = CounterSample::empty(None);
        sample.max = 5;
        sample.max_timestamp = 100;
        assert_eq!(sample.defined_max(), Some(5));
        assert_eq!(sample.defined_min(), None);
    }

    #[test]
    fn empty_stopwatch_sample_has_no_min() {
        let sample = StopwatchSample::empty(Some("sw".into()));
        assert_eq!(sample.min, u64::MAX);
        assert_eq!(sample.max, 0);
        assert_eq!(sample.defined_min(), None);
        assert_eq!(sample.name.as_deref(), Some("sw"));
    }

    #[test]
    fn sample_accessors_dispatch_on_kind() {
        let sample: Sample = CounterSample::empty(Some("c".into())).into();
        assert_eq!(sample.kind(), MonitorKind::Counter);
        assert_eq!(sample.name(), Some("c"));
        assert!(sample.as_counter().is_some());
        assert!(sample.as_stopwatch().is_none());

        let sample: Sample = UnknownSample::default().into();
        assert_eq!(sample.kind(), MonitorKind::Unknown);
        assert_eq!(sample.name(), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn sample_serializes_with_kind_tag() {
        let sample: Sample = StopwatchSample::empty(Some("sw".into())).into();
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["kind"], "stopwatch");
        assert_eq!(json["name"], "sw");
        assert!(json.get("note").is_none());
    }
}
