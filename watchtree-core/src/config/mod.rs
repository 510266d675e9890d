//! Monitor configuration.
//!
//! A [`Configuration`] is an ordered list of pattern rules consulted when a
//! monitor is created. Rules usually arrive through a [`ConfigDocument`],
//! which can also attach callbacks built by a [`CallbackRegistry`].

mod document;
mod registry;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use watchtree_types::{MonitorKind, MonitorState};

use crate::pattern::Pattern;

pub use document::{apply, CallbackSpec, ConfigDocument, MonitorRuleSpec, RuleSpec};
pub use registry::{CallbackFactory, CallbackRegistry};

/// What a rule sets on matching monitors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub state: Option<MonitorState>,
}

impl MonitorConfig {
    pub fn with_state(state: MonitorState) -> Self {
        Self { state: Some(state) }
    }
}

/// Ordered pattern rules for newly created monitors.
///
/// For a given monitor the last matching rule that carries a state wins.
/// Adding a rule whose pattern equals an existing one replaces that rule in
/// place, keeping its position.
#[derive(Debug, Default)]
pub struct Configuration {
    rules: RwLock<Vec<(Pattern, MonitorConfig)>>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&self, pattern: Pattern, config: MonitorConfig) {
        let mut rules = self.rules.write();
        match rules.iter_mut().find(|(existing, _)| *existing == pattern) {
            Some(rule) => rule.1 = config,
            None => rules.push((pattern, config)),
        }
    }

    /// Effective configuration for a monitor named `name` of `kind`.
    pub fn config_for(&self, name: &str, kind: MonitorKind) -> MonitorConfig {
        let rules = self.rules.read();
        let state = rules
            .iter()
            .filter(|(pattern, config)| {
                config.state.is_some()
                    && pattern.kind().map_or(true, |k| k == kind)
                    && pattern.matches(name)
            })
            .last()
            .and_then(|(_, config)| config.state);
        MonitorConfig { state }
    }

    /// Snapshot of the rules in evaluation order.
    pub fn rules(&self) -> Vec<(Pattern, MonitorConfig)> {
        self.rules.read().clone()
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(config: &Configuration, pattern: &str, state: MonitorState) {
        config.add_rule(pattern.parse().unwrap(), MonitorConfig::with_state(state));
    }

    #[test]
    fn last_matching_rule_wins() {
        let config = Configuration::new();
        rule(&config, "*", MonitorState::Disabled);
        rule(&config, "db.*", MonitorState::Enabled);

        assert_eq!(
            config.config_for("web.hits", MonitorKind::Counter).state,
            Some(MonitorState::Disabled)
        );
        assert_eq!(
            config.config_for("db.query", MonitorKind::Stopwatch).state,
            Some(MonitorState::Enabled)
        );
    }

    #[test]
    fn rules_without_state_are_skipped() {
        let config = Configuration::new();
        rule(&config, "db.*", MonitorState::Disabled);
        config.add_rule(Pattern::new("db.query").unwrap(), MonitorConfig::default());
        assert_eq!(
            config.config_for("db.query", MonitorKind::Stopwatch).state,
            Some(MonitorState::Disabled)
        );
        assert_eq!(config.config_for("web", MonitorKind::Counter).state, None);
    }

    #[test]
    fn same_pattern_replaces_in_place() {
        let config = Configuration::new();
        rule(&config, "a.*", MonitorState::Disabled);
        rule(&config, "a.b", MonitorState::Enabled);
        rule(&config, "a.*", MonitorState::Enabled);

        let rules = config.rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].0.as_str(), "a.*");
        assert_eq!(rules[0].1.state, Some(MonitorState::Enabled));
    }

    #[test]
    fn typed_rules_only_match_their_kind() {
        let config = Configuration::new();
        rule(&config, "stopwatch:db.*", MonitorState::Disabled);
        assert_eq!(
            config.config_for("db.query", MonitorKind::Stopwatch).state,
            Some(MonitorState::Disabled)
        );
        assert_eq!(config.config_for("db.rows", MonitorKind::Counter).state, None);

        config.clear();
        assert!(config.rules().is_empty());
    }
}
