//! Callback that writes events to `tracing`.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::str::FromStr;

use tracing::Level;
use watchtree_types::{CounterSample, Nanos, StopwatchSample};

use super::Callback;
use crate::error::ConfigError;
use crate::monitor::{Counter, Monitor, Stopwatch};
use crate::split::Split;

macro_rules! log_at {
    ($level:expr, $($arg:tt)+) => {
        if $level == Level::ERROR {
            tracing::error!($($arg)+)
        } else if $level == Level::WARN {
            tracing::warn!($($arg)+)
        } else if $level == Level::INFO {
            tracing::info!($($arg)+)
        } else if $level == Level::DEBUG {
            tracing::debug!($($arg)+)
        } else {
            tracing::trace!($($arg)+)
        }
    };
}

/// Logs stopwatch stops, counter changes and manager events at one level.
/// Stopwatch starts are not logged.
#[derive(Debug, Clone)]
pub struct LoggingCallback {
    level: Level,
}

impl LoggingCallback {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Builds the callback from configuration properties. Recognised
    /// property: `level` (`trace`, `debug`, `info`, `warn`, `error`).
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let level = match properties.get("level") {
            Some(level) => Level::from_str(level).map_err(|e| ConfigError::InvalidProperty {
                kind: "logging".to_string(),
                property: "level".to_string(),
                reason: e.to_string(),
            })?,
            None => Level::INFO,
        };
        Ok(Self::new(level))
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LoggingCallback {
    fn default() -> Self {
        Self::new(Level::INFO)
    }
}

fn name_of(name: Option<&str>) -> &str {
    name.unwrap_or("<anonymous>")
}

impl Callback for LoggingCallback {
    fn on_stopwatch_stop(&self, split: &Split, sample: &StopwatchSample) {
        log_at!(
            self.level,
            stopwatch = name_of(sample.name.as_deref()),
            split = %Nanos(split.running_for()),
            count = sample.counter,
            mean = %Nanos(sample.mean as u64),
            "Stopwatch stopped"
        );
    }

    fn on_stopwatch_add(&self, stopwatch: &dyn Stopwatch, split: &Split, sample: &StopwatchSample) {
        log_at!(
            self.level,
            stopwatch = name_of(stopwatch.name()),
            split = %Nanos(split.running_for()),
            count = sample.counter,
            "Stopwatch time added"
        );
    }

    fn on_counter_increase(&self, counter: &dyn Counter, inc: i64, sample: &CounterSample) {
        log_at!(
            self.level,
            counter = name_of(counter.name()),
            inc,
            value = sample.counter,
            "Counter increased"
        );
    }

    fn on_counter_decrease(&self, counter: &dyn Counter, dec: i64, sample: &CounterSample) {
        log_at!(
            self.level,
            counter = name_of(counter.name()),
            dec,
            value = sample.counter,
            "Counter decreased"
        );
    }

    fn on_counter_set(&self, counter: &dyn Counter, value: i64, _sample: &CounterSample) {
        log_at!(
            self.level,
            counter = name_of(counter.name()),
            value,
            "Counter set"
        );
    }

    fn on_monitor_created(&self, monitor: &dyn Monitor) {
        log_at!(
            self.level,
            monitor = name_of(monitor.name()),
            kind = %monitor.kind(),
            "Monitor created"
        );
    }

    fn on_monitor_destroyed(&self, monitor: &dyn Monitor) {
        log_at!(
            self.level,
            monitor = name_of(monitor.name()),
            "Monitor destroyed"
        );
    }

    fn on_manager_clear(&self) {
        log_at!(self.level, "Manager cleared");
    }

    fn on_manager_message(&self, message: &str) {
        log_at!(self.level, text = message, "Manager message");
    }

    fn on_manager_warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        match cause {
            Some(cause) => log_at!(self.level, warning, error = %cause, "Manager warning"),
            None => log_at!(self.level, warning, "Manager warning"),
        }
    }
}
