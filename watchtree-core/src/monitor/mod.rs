//! Monitors - the nodes of the tree.
//!
//! Every node is one `MonitorNode` carrying a payload that says what it
//! measures. Application code sees it through the [`Monitor`], [`Counter`]
//! and [`Stopwatch`] traits. A disabled manager hands out inert
//! implementations of the same traits (see [`null`]).

mod counter;
mod incremental;
pub(crate) mod node;
pub mod null;
mod stopwatch;

use std::any::Any;
use std::sync::Arc;

use watchtree_types::{CounterSample, MonitorKind, MonitorState, Sample, StopwatchSample};

use crate::split::Split;

pub(crate) use node::{ManagerShared, MonitorNode};

/// Value stored in an attribute bag.
pub type Attribute = Arc<dyn Any + Send + Sync>;

/// Behaviour shared by every monitor.
pub trait Monitor: Send + Sync {
    /// Full dotted name, `None` for anonymous monitors. The root is `""`.
    fn name(&self) -> Option<&str>;

    fn kind(&self) -> MonitorKind;

    /// Parent monitor, `None` for the root and for unlinked monitors.
    fn parent(&self) -> Option<Arc<dyn Monitor>>;

    fn children(&self) -> Vec<Arc<dyn Monitor>>;

    /// Explicit state as set, possibly `Inherit`.
    fn state(&self) -> MonitorState;

    /// Sets the explicit state and propagates the effective state down the
    /// subtree. With `overrule` every descendant is reset to `Inherit`;
    /// without it, descendants holding their own explicit state are left
    /// alone. The root and anonymous monitors ignore `Inherit`.
    fn set_state(&self, state: MonitorState, overrule: bool);

    /// Effective state.
    fn is_enabled(&self) -> bool;

    fn note(&self) -> Option<String>;

    fn set_note(&self, note: Option<String>);

    /// Millisecond timestamp of the first update, 0 if never used.
    fn first_usage(&self) -> u64;

    fn last_usage(&self) -> u64;

    /// Millisecond timestamp of the latest reset, 0 if never reset.
    fn last_reset(&self) -> u64;

    fn sample(&self) -> Sample;

    /// Samples, then resets the accumulators in the same atomic step.
    fn sample_and_reset(&self) -> Sample;

    /// Zeroes the accumulators. Usage timestamps, name and note survive.
    fn reset(&self);

    /// Delta sample for `key` since the previous call with the same key.
    ///
    /// The first call for a key returns the full sample of the monitor and
    /// starts a fresh keyed accumulator.
    fn sample_increment(&self, key: &str) -> Sample;

    /// Drops the keyed accumulator; returns whether it existed.
    fn stop_incremental_sampling(&self, key: &str) -> bool;

    fn set_attribute(&self, name: &str, value: Attribute);

    fn attribute(&self, name: &str) -> Option<Attribute>;

    fn remove_attribute(&self, name: &str) -> Option<Attribute>;

    fn attribute_names(&self) -> Vec<String>;

    fn as_monitor(&self) -> &dyn Monitor;

    fn as_counter(&self) -> Option<&dyn Counter> {
        None
    }

    fn as_stopwatch(&self) -> Option<&dyn Stopwatch> {
        None
    }
}

/// A monitor tracking an integer value.
///
/// Mutators are no-ops while the counter is disabled and return the
/// receiver so calls can be chained.
pub trait Counter: Monitor {
    /// Adds one. Updates only the maximum.
    fn increase(&self) -> &dyn Counter;

    /// Adds `inc`, crediting it to the increment sum even when negative.
    fn increase_by(&self, inc: i64) -> &dyn Counter;

    /// Subtracts one. Updates only the minimum.
    fn decrease(&self) -> &dyn Counter;

    /// Subtracts `dec`, crediting it to the decrement sum even when negative.
    fn decrease_by(&self, dec: i64) -> &dyn Counter;

    /// Sets the value without touching either sum.
    fn set(&self, value: i64) -> &dyn Counter;

    fn value(&self) -> i64;

    fn min(&self) -> i64;

    fn min_timestamp(&self) -> u64;

    fn max(&self) -> i64;

    fn max_timestamp(&self) -> u64;

    fn increment_sum(&self) -> i64;

    fn decrement_sum(&self) -> i64;

    fn sample_counter(&self) -> CounterSample;
}

/// A monitor measuring durations in nanoseconds.
pub trait Stopwatch: Monitor {
    /// Starts a measurement. Returns an inert split while disabled.
    fn start(&self) -> Split;

    /// Folds an externally measured duration.
    fn add_time(&self, nanos: u64) -> &dyn Stopwatch;

    /// Folds the duration of a split measured elsewhere.
    fn add_split(&self, split: &Split) -> &dyn Stopwatch;

    fn total(&self) -> u64;

    fn counter(&self) -> u64;

    fn min(&self) -> u64;

    fn min_timestamp(&self) -> u64;

    fn max(&self) -> u64;

    fn max_timestamp(&self) -> u64;

    fn last(&self) -> u64;

    /// Splits started and not yet stopped.
    fn active(&self) -> u64;

    fn max_active(&self) -> u64;

    fn max_active_timestamp(&self) -> u64;

    fn mean(&self) -> f64;

    fn variance(&self) -> f64;

    fn variance_n(&self) -> f64;

    fn standard_deviation(&self) -> f64;

    fn sample_stopwatch(&self) -> StopwatchSample;
}
