//! The callback fabric.
//!
//! Monitors report every mutation to their manager's root
//! [`CompositeCallback`], which fans the event out to registered callbacks
//! in registration order. [`FilterCallback`] gates a sub-tree of callbacks
//! with rules, [`LoggingCallback`] writes events to `tracing`.
//!
//! [`QuantilesCallback`], [`LastSplitsCallback`] and [`TimelineCallback`]
//! keep statistics per stopwatch in the stopwatch's attribute bag.
//!
//! Events are delivered synchronously on the thread that caused them, while
//! the affected monitor is still locked. Callbacks may read that monitor but
//! should stay short.

mod attached;
mod composite;
pub mod expr;
mod filter;
mod last_splits;
mod logging;
mod quantiles;
mod timeline;

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use watchtree_types::{CounterSample, StopwatchSample};

use crate::error::ConfigError;
use crate::monitor::{Counter, Monitor, Stopwatch};
use crate::split::Split;

pub use composite::CompositeCallback;
pub use filter::{Event, FilterCallback, FilterRule, RuleType};
pub use last_splits::{LastSplits, LastSplitsCallback, DEFAULT_TREND_THRESHOLD};
pub use logging::LoggingCallback;
pub use quantiles::{Bucket, BucketLayout, Buckets, QuantilesCallback};
pub use timeline::{TimeRange, Timeline, TimelineCallback};

/// Receiver of monitor and manager events. Every method defaults to a no-op.
pub trait Callback: Send + Sync {
    /// Called when the callback becomes reachable from a manager.
    fn initialize(&self, _context: &CallbackContext) {}

    /// Called when the callback is detached from a live manager.
    fn deactivate(&self) {}

    fn on_stopwatch_start(&self, _split: &Split) {}

    fn on_stopwatch_stop(&self, _split: &Split, _sample: &StopwatchSample) {}

    /// A duration measured elsewhere was folded into `stopwatch`.
    fn on_stopwatch_add(
        &self,
        _stopwatch: &dyn Stopwatch,
        _split: &Split,
        _sample: &StopwatchSample,
    ) {
    }

    fn on_counter_increase(&self, _counter: &dyn Counter, _inc: i64, _sample: &CounterSample) {}

    fn on_counter_decrease(&self, _counter: &dyn Counter, _dec: i64, _sample: &CounterSample) {}

    fn on_counter_set(&self, _counter: &dyn Counter, _value: i64, _sample: &CounterSample) {}

    fn on_monitor_created(&self, _monitor: &dyn Monitor) {}

    fn on_monitor_destroyed(&self, _monitor: &dyn Monitor) {}

    fn on_manager_clear(&self) {}

    fn on_manager_message(&self, _message: &str) {}

    fn on_manager_warning(&self, _warning: &str, _cause: Option<&(dyn StdError + 'static)>) {}
}

/// Handle a callback receives on [`Callback::initialize`].
///
/// It lets callbacks report problems back through the manager that owns
/// them without keeping that manager alive.
#[derive(Debug, Clone, Default)]
pub struct CallbackContext {
    manager_callback: Option<Weak<CompositeCallback>>,
}

impl CallbackContext {
    pub(crate) fn new(manager_callback: Weak<CompositeCallback>) -> Self {
        Self {
            manager_callback: Some(manager_callback),
        }
    }

    /// A context attached to no manager. Warnings are only logged.
    pub fn detached() -> Self {
        Self::default()
    }

    /// The manager's root callback, while the manager lives.
    pub fn manager_callback(&self) -> Option<Arc<CompositeCallback>> {
        self.manager_callback.as_ref().and_then(Weak::upgrade)
    }

    /// Logs `warning` and dispatches it as a manager warning.
    pub fn warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        match self.manager_callback() {
            Some(root) => report_warning(&root, warning, cause),
            None => log_warning(warning, cause),
        }
    }
}

fn log_warning(warning: &str, cause: Option<&(dyn StdError + 'static)>) {
    match cause {
        Some(cause) => tracing::warn!(error = %cause, "{}", warning),
        None => tracing::warn!("{}", warning),
    }
}

/// Logs a manager warning and fans it out to `root`.
pub(crate) fn report_warning(
    root: &CompositeCallback,
    warning: &str,
    cause: Option<&(dyn StdError + 'static)>,
) {
    log_warning(warning, cause);
    root.on_manager_warning(warning, cause);
}

/// Parses the optional property `name` of a callback of `kind`.
pub(crate) fn parse_property<T>(
    kind: &str,
    properties: &BTreeMap<String, String>,
    name: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    properties
        .get(name)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidProperty {
                kind: kind.to_string(),
                property: name.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
