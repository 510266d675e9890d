//! Configuration documents and their ingestion.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use watchtree_types::MonitorState;

use super::{CallbackRegistry, MonitorConfig};
use crate::callback::{Callback, Event, RuleType};
use crate::error::ConfigError;
use crate::manager::Manager;
use crate::pattern::Pattern;

/// Declarative configuration for one manager.
///
/// ```json
/// {
///   "monitors": [
///     { "pattern": "*", "state": "disabled" },
///     { "pattern": "db.*", "state": "enabled" }
///   ],
///   "callbacks": [
///     {
///       "kind": "filter",
///       "rules": [{ "type": "must", "pattern": "db.*", "condition": "split > 50ms", "events": ["stop"] }],
///       "callbacks": [{ "kind": "logging", "properties": { "level": "warn" } }]
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub monitors: Vec<MonitorRuleSpec>,
    pub callbacks: Vec<CallbackSpec>,
}

impl ConfigDocument {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses every pattern and condition and builds every callback without
    /// applying anything.
    pub fn validate(&self, registry: &CallbackRegistry) -> Result<(), ConfigError> {
        prepare(self, registry).map(|_| ())
    }
}

/// A pattern rule. The pattern may carry a kind prefix such as
/// `stopwatch:db.*`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRuleSpec {
    pub pattern: String,
    #[serde(default)]
    pub state: Option<MonitorState>,
}

fn default_kind() -> String {
    "composite".to_string()
}

/// A callback to build through the [`CallbackRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackSpec {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub callbacks: Vec<CallbackSpec>,
}

impl Default for CallbackSpec {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            properties: BTreeMap::new(),
            rules: Vec::new(),
            callbacks: Vec::new(),
        }
    }
}

/// A filter rule. An empty `events` list means every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Everything a document produces, built before any of it is applied.
struct Prepared {
    rules: Vec<(Pattern, MonitorConfig)>,
    callbacks: Vec<Arc<dyn Callback>>,
}

fn prepare(document: &ConfigDocument, registry: &CallbackRegistry) -> Result<Prepared, ConfigError> {
    let rules = document
        .monitors
        .iter()
        .map(|spec| -> Result<(Pattern, MonitorConfig), ConfigError> {
            let pattern: Pattern = spec.pattern.parse()?;
            Ok((pattern, MonitorConfig { state: spec.state }))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    let callbacks = document
        .callbacks
        .iter()
        .map(|spec| registry.build(spec))
        .collect::<Result<Vec<_>, ConfigError>>()?;
    Ok(Prepared { rules, callbacks })
}

/// Validates `document` completely, then adds its rules to the manager's
/// configuration and its callbacks to the manager's root callback.
///
/// Nothing is applied if any part is invalid; the failure is reported as a
/// single manager warning and `false` is returned.
pub fn apply<M: Manager + ?Sized>(manager: &M, document: &ConfigDocument) -> bool {
    let prepared = match prepare(document, manager.callback_registry()) {
        Ok(prepared) => prepared,
        Err(e) => {
            manager.warning("Configuration document rejected", Some(&e));
            return false;
        }
    };

    let configuration = manager.configuration();
    let rules = prepared.rules.len();
    for (pattern, config) in prepared.rules {
        configuration.add_rule(pattern, config);
    }
    let root = manager.callback();
    let callbacks = prepared.callbacks.len();
    for callback in prepared.callbacks {
        root.add_callback(callback);
    }
    tracing::debug!(rules, callbacks, "Applied configuration document");
    true
}
