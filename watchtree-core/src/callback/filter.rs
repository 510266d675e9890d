//! Rule-gated callback.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use watchtree_types::{CounterSample, MonitorKind, StopwatchSample};

use super::expr::{Condition, Expression, Variable, Variables};
use super::{Callback, CallbackContext, CompositeCallback};
use crate::error::ConfigError;
use crate::monitor::{Counter, Monitor, Stopwatch};
use crate::pattern::Pattern;
use crate::split::Split;

/// Event kinds rules can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Event {
    /// Wildcard bucket consulted after the event-specific rules.
    All,
    Start,
    Stop,
    Add,
    Increase,
    Decrease,
    Set,
    Created,
    Destroyed,
    Clear,
    Message,
    Warning,
}

impl Event {
    /// Manager-level events have no monitor, so rule patterns do not apply.
    fn is_manager_event(self) -> bool {
        matches!(self, Event::Clear | Event::Message | Event::Warning)
    }
}

/// How a rule's outcome decides the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleType {
    /// Failing rejects the event.
    Must,
    /// Passing accepts the event without looking at further rules.
    Suffice,
    /// Passing rejects the event.
    MustNot,
}

/// One filter rule: a type plus an optional pattern and condition.
///
/// A rule passes when its condition holds; a rule without a condition
/// always passes.
#[derive(Debug, Clone)]
pub struct FilterRule {
    rule_type: RuleType,
    pattern: Option<Pattern>,
    condition: Option<Arc<dyn Condition>>,
}

impl FilterRule {
    pub fn new(rule_type: RuleType) -> Self {
        Self {
            rule_type,
            pattern: None,
            condition: None,
        }
    }

    /// Builds a rule from its textual parts.
    pub fn parse(
        rule_type: RuleType,
        pattern: Option<&str>,
        condition: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut rule = Self::new(rule_type);
        if let Some(pattern) = pattern {
            rule = rule.with_pattern(Pattern::new(pattern)?);
        }
        if let Some(condition) = condition {
            rule = rule.with_condition(Arc::new(Expression::parse(condition)?));
        }
        Ok(rule)
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn with_condition(mut self, condition: Arc<dyn Condition>) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn condition(&self) -> Option<&Arc<dyn Condition>> {
        self.condition.as_ref()
    }

    fn applies_to(&self, event: Event, name: Option<&str>) -> bool {
        match &self.pattern {
            Some(pattern) if !event.is_manager_event() => name.is_some_and(|n| pattern.matches(n)),
            _ => true,
        }
    }
}

type Rules = HashMap<Event, Vec<FilterRule>>;

/// A composite callback that only forwards events its rules accept.
///
/// Rules for the event's own kind are checked first, then the
/// [`Event::All`] rules, each list in insertion order. The first decisive
/// rule wins: a failing `Must` or a passing `MustNot` rejects, a passing
/// `Suffice` accepts. Exhausting both lists accepts. A condition that cannot
/// be evaluated counts as failed and raises a manager warning.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use watchtree_core::callback::{Event, FilterCallback, FilterRule, LoggingCallback, RuleType};
///
/// let slow_queries = FilterCallback::new();
/// slow_queries
///     .add_rule(
///         FilterRule::parse(RuleType::Must, Some("db.*"), Some("split > 50ms")).unwrap(),
///         &[Event::Stop],
///     );
/// slow_queries.add_callback(Arc::new(LoggingCallback::default()));
/// ```
pub struct FilterCallback {
    inner: CompositeCallback,
    rules: RwLock<Arc<Rules>>,
}

impl FilterCallback {
    pub fn new() -> Self {
        Self {
            inner: CompositeCallback::new(),
            rules: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Appends `rule` to the list of every event in `events`. An empty
    /// slice means [`Event::All`].
    pub fn add_rule(&self, rule: FilterRule, events: &[Event]) {
        let events = if events.is_empty() {
            &[Event::All][..]
        } else {
            events
        };
        let mut rules = self.rules.write();
        let next = Arc::make_mut(&mut rules);
        for event in events {
            next.entry(*event).or_default().push(rule.clone());
        }
    }

    /// Rules registered for exactly `event`.
    pub fn rules_for(&self, event: Event) -> Vec<FilterRule> {
        self.rules.read().get(&event).cloned().unwrap_or_default()
    }

    pub fn clear_rules(&self) {
        *self.rules.write() = Arc::new(HashMap::new());
    }

    pub fn add_callback(&self, callback: Arc<dyn Callback>) {
        self.inner.add_callback(callback);
    }

    pub fn remove_callback(&self, callback: &Arc<dyn Callback>) -> bool {
        self.inner.remove_callback(callback)
    }

    pub fn callbacks(&self) -> Vec<Arc<dyn Callback>> {
        self.inner.callbacks()
    }

    fn accepts(&self, event: Event, name: Option<&str>, variables: impl FnOnce() -> Variables) -> bool {
        if !self.inner.has_callbacks() {
            return false;
        }
        // Lock released before evaluation: warnings re-enter this filter.
        let rules = self.rules.read().clone();
        let specific = rules.get(&event).map(Vec::as_slice).unwrap_or_default();
        let wildcard = rules.get(&Event::All).map(Vec::as_slice).unwrap_or_default();
        if specific.is_empty() && wildcard.is_empty() {
            return true;
        }

        let variables = variables();
        for rule in specific.iter().chain(wildcard) {
            if !rule.applies_to(event, name) {
                continue;
            }
            let passed = self.check_condition(rule, &variables);
            match (rule.rule_type, passed) {
                (RuleType::Must, false) | (RuleType::MustNot, true) => return false,
                (RuleType::Suffice, true) => return true,
                _ => {}
            }
        }
        true
    }

    fn check_condition(&self, rule: &FilterRule, variables: &Variables) -> bool {
        let Some(condition) = &rule.condition else {
            return true;
        };
        if variables.is_empty() {
            return true;
        }
        match condition.evaluate(variables) {
            Ok(passed) => passed,
            Err(e) => {
                let warning = format!("Filter condition '{}' failed", condition.source());
                self.inner
                    .context()
                    .unwrap_or_else(CallbackContext::detached)
                    .warning(&warning, Some(&e));
                false
            }
        }
    }
}

impl Default for FilterCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules = self.rules.read();
        f.debug_struct("FilterCallback")
            .field("rules", &rules.values().map(Vec::len).sum::<usize>())
            .field("inner", &self.inner)
            .finish()
    }
}

fn counter_variables(value: i64, sample: &CounterSample) -> Variables {
    Variables::new()
        .with(Variable::Value, value as f64)
        .with(Variable::Counter, sample.counter as f64)
        .with(Variable::Min, sample.min as f64)
        .with(Variable::Max, sample.max as f64)
}

fn stopwatch_variables(sample: &StopwatchSample) -> Variables {
    Variables::new()
        .with(Variable::Counter, sample.counter as f64)
        .with(Variable::Total, sample.total as f64)
        .with(Variable::Min, sample.min as f64)
        .with(Variable::Max, sample.max as f64)
        .with(Variable::Active, sample.active as f64)
        .with(Variable::MaxActive, sample.max_active as f64)
        .with(Variable::Mean, sample.mean)
        .with(Variable::Last, sample.last as f64)
}

fn split_variables(split: &Split, sample: &StopwatchSample) -> Variables {
    stopwatch_variables(sample).with(Variable::Split, split.running_for() as f64)
}

fn monitor_variables(monitor: &dyn Monitor) -> Variables {
    match monitor.kind() {
        MonitorKind::Counter => monitor
            .as_counter()
            .map(|c| {
                let sample = c.sample_counter();
                counter_variables(sample.counter, &sample)
            })
            .unwrap_or_default(),
        MonitorKind::Stopwatch => monitor
            .as_stopwatch()
            .map(|s| stopwatch_variables(&s.sample_stopwatch()))
            .unwrap_or_default(),
        MonitorKind::Unknown => Variables::new(),
    }
}

impl Callback for FilterCallback {
    fn initialize(&self, context: &CallbackContext) {
        self.inner.initialize(context);
    }

    fn deactivate(&self) {
        self.inner.deactivate();
    }

    fn on_stopwatch_start(&self, split: &Split) {
        let Some(stopwatch) = split.stopwatch() else {
            return;
        };
        if self.accepts(Event::Start, stopwatch.name(), || {
            split_variables(split, &stopwatch.sample_stopwatch())
        }) {
            self.inner.on_stopwatch_start(split);
        }
    }

    fn on_stopwatch_stop(&self, split: &Split, sample: &StopwatchSample) {
        if self.accepts(Event::Stop, sample.name.as_deref(), || split_variables(split, sample)) {
            self.inner.on_stopwatch_stop(split, sample);
        }
    }

    fn on_stopwatch_add(&self, stopwatch: &dyn Stopwatch, split: &Split, sample: &StopwatchSample) {
        if self.accepts(Event::Add, stopwatch.name(), || {
            split_variables(split, sample).with(Variable::Value, split.running_for() as f64)
        }) {
            self.inner.on_stopwatch_add(stopwatch, split, sample);
        }
    }

    fn on_counter_increase(&self, counter: &dyn Counter, inc: i64, sample: &CounterSample) {
        if self.accepts(Event::Increase, counter.name(), || counter_variables(inc, sample)) {
            self.inner.on_counter_increase(counter, inc, sample);
        }
    }

    fn on_counter_decrease(&self, counter: &dyn Counter, dec: i64, sample: &CounterSample) {
        if self.accepts(Event::Decrease, counter.name(), || counter_variables(dec, sample)) {
            self.inner.on_counter_decrease(counter, dec, sample);
        }
    }

    fn on_counter_set(&self, counter: &dyn Counter, value: i64, sample: &CounterSample) {
        if self.accepts(Event::Set, counter.name(), || counter_variables(value, sample)) {
            self.inner.on_counter_set(counter, value, sample);
        }
    }

    fn on_monitor_created(&self, monitor: &dyn Monitor) {
        if self.accepts(Event::Created, monitor.name(), || monitor_variables(monitor)) {
            self.inner.on_monitor_created(monitor);
        }
    }

    fn on_monitor_destroyed(&self, monitor: &dyn Monitor) {
        if self.accepts(Event::Destroyed, monitor.name(), || monitor_variables(monitor)) {
            self.inner.on_monitor_destroyed(monitor);
        }
    }

    fn on_manager_clear(&self) {
        if self.accepts(Event::Clear, None, Variables::new) {
            self.inner.on_manager_clear();
        }
    }

    fn on_manager_message(&self, message: &str) {
        if self.accepts(Event::Message, None, Variables::new) {
            self.inner.on_manager_message(message);
        }
    }

    fn on_manager_warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        if self.accepts(Event::Warning, None, Variables::new) {
            self.inner.on_manager_warning(warning, cause);
        }
    }
}
