//! Callback kinds available to configuration documents.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::document::CallbackSpec;
use crate::callback::{
    Callback, CompositeCallback, FilterCallback, FilterRule, LastSplitsCallback, LoggingCallback,
    QuantilesCallback, TimelineCallback,
};
use crate::error::ConfigError;

/// Builds a callback from its spec. The registry is passed along so
/// factories can build nested callbacks.
pub type CallbackFactory =
    dyn Fn(&CallbackSpec, &CallbackRegistry) -> Result<Arc<dyn Callback>, ConfigError> + Send + Sync;

/// Maps callback kinds to factories.
///
/// Comes with `composite`, `filter`, `logging`, `quantiles`, `last-splits`
/// and `timeline`; applications register their own kinds with
/// [`register`](CallbackRegistry::register).
pub struct CallbackRegistry {
    factories: RwLock<HashMap<String, Arc<CallbackFactory>>>,
}

impl CallbackRegistry {
    /// A registry holding only the built-in kinds.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register("composite", build_composite);
        registry.register("filter", build_filter);
        registry.register("logging", build_logging);
        registry.register("quantiles", |spec, _| {
            reject_nesting(spec)?;
            Ok(Arc::new(QuantilesCallback::from_properties(&spec.properties)?))
        });
        registry.register("last-splits", |spec, _| {
            reject_nesting(spec)?;
            Ok(Arc::new(LastSplitsCallback::from_properties(&spec.properties)?))
        });
        registry.register("timeline", |spec, _| {
            reject_nesting(spec)?;
            Ok(Arc::new(TimelineCallback::from_properties(&spec.properties)?))
        });
        registry
    }

    /// A registry with no kinds at all.
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `factory` for `kind`, replacing any previous one.
    pub fn register<F>(&self, kind: &str, factory: F)
    where
        F: Fn(&CallbackSpec, &CallbackRegistry) -> Result<Arc<dyn Callback>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .write()
            .insert(kind.to_string(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.read().contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Builds the callback described by `spec`, recursively.
    pub fn build(&self, spec: &CallbackSpec) -> Result<Arc<dyn Callback>, ConfigError> {
        let factory = self
            .factories
            .read()
            .get(&spec.kind)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownCallbackKind(spec.kind.clone()))?;
        factory(spec, self)
    }

    fn build_children(&self, spec: &CallbackSpec) -> Result<Vec<Arc<dyn Callback>>, ConfigError> {
        spec.callbacks.iter().map(|child| self.build(child)).collect()
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn reject_rules(spec: &CallbackSpec) -> Result<(), ConfigError> {
    if spec.rules.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::InvalidRule(format!(
            "callback kind '{}' does not take rules",
            spec.kind
        )))
    }
}

/// Leaf kinds take neither rules nor children.
fn reject_nesting(spec: &CallbackSpec) -> Result<(), ConfigError> {
    reject_rules(spec)?;
    if spec.callbacks.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::InvalidProperty {
            kind: spec.kind.clone(),
            property: "callbacks".to_string(),
            reason: format!("{} callbacks have no children", spec.kind),
        })
    }
}

fn build_composite(
    spec: &CallbackSpec,
    registry: &CallbackRegistry,
) -> Result<Arc<dyn Callback>, ConfigError> {
    reject_rules(spec)?;
    let composite = CompositeCallback::new();
    for child in registry.build_children(spec)? {
        composite.add_callback(child);
    }
    Ok(Arc::new(composite))
}

fn build_filter(
    spec: &CallbackSpec,
    registry: &CallbackRegistry,
) -> Result<Arc<dyn Callback>, ConfigError> {
    let filter = FilterCallback::new();
    for rule in &spec.rules {
        let built = FilterRule::parse(
            rule.rule_type,
            rule.pattern.as_deref(),
            rule.condition.as_deref(),
        )?;
        filter.add_rule(built, &rule.events);
    }
    for child in registry.build_children(spec)? {
        filter.add_callback(child);
    }
    Ok(Arc::new(filter))
}

fn build_logging(
    spec: &CallbackSpec,
    _registry: &CallbackRegistry,
) -> Result<Arc<dyn Callback>, ConfigError> {
    reject_nesting(spec)?;
    Ok(Arc::new(LoggingCallback::from_properties(&spec.properties)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{Event, RuleType};
    use crate::config::RuleSpec;

    fn spec(kind: &str) -> CallbackSpec {
        CallbackSpec {
            kind: kind.to_string(),
            ..CallbackSpec::default()
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = CallbackRegistry::new();
        assert_eq!(
            registry.kinds(),
            vec!["composite", "filter", "last-splits", "logging", "quantiles", "timeline"]
        );
        assert!(CallbackRegistry::empty().kinds().is_empty());
    }

    #[test]
    fn builds_nested_filter() {
        let registry = CallbackRegistry::new();
        let mut filter = spec("filter");
        filter.rules.push(RuleSpec {
            rule_type: RuleType::Must,
            pattern: Some("db.*".to_string()),
            condition: Some("split > 10ms".to_string()),
            events: vec![Event::Stop],
        });
        filter.callbacks.push(spec("logging"));
        assert!(registry.build(&filter).is_ok());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let registry = CallbackRegistry::new();
        let mut composite = spec("composite");
        composite.callbacks.push(spec("carrier-pigeon"));
        let err = registry.build(&composite).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownCallbackKind(kind) if kind == "carrier-pigeon"));
    }

    #[test]
    fn bad_condition_is_an_error() {
        let registry = CallbackRegistry::new();
        let mut filter = spec("filter");
        filter.rules.push(RuleSpec {
            rule_type: RuleType::Must,
            pattern: None,
            condition: Some("split >".to_string()),
            events: Vec::new(),
        });
        let err = registry.build(&filter).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidCondition { .. }));
    }

    #[test]
    fn rules_on_composite_are_rejected() {
        let registry = CallbackRegistry::new();
        let mut composite = spec("composite");
        composite.rules.push(RuleSpec {
            rule_type: RuleType::Suffice,
            pattern: None,
            condition: None,
            events: Vec::new(),
        });
        assert!(matches!(
            registry.build(&composite).err().unwrap(),
            ConfigError::InvalidRule(_)
        ));
    }

    #[test]
    fn statistics_kinds_read_their_properties() {
        let registry = CallbackRegistry::new();
        let mut quantiles = spec("quantiles");
        quantiles.properties.insert("min_ms".to_string(), "0".to_string());
        quantiles.properties.insert("max_ms".to_string(), "100".to_string());
        assert!(registry.build(&quantiles).is_ok());

        let mut timeline = spec("timeline");
        timeline.properties.insert("width_ms".to_string(), "0".to_string());
        assert!(matches!(
            registry.build(&timeline).err().unwrap(),
            ConfigError::InvalidProperty { .. }
        ));

        let mut last = spec("last-splits");
        last.callbacks.push(spec("logging"));
        assert!(matches!(
            registry.build(&last).err().unwrap(),
            ConfigError::InvalidProperty { property, .. } if property == "callbacks"
        ));
    }

    #[test]
    fn user_factories_can_be_registered() {
        struct Quiet;
        impl Callback for Quiet {}

        let registry = CallbackRegistry::new();
        registry.register("quiet", |_spec, _registry| Ok(Arc::new(Quiet)));
        assert!(registry.contains("quiet"));
        assert!(registry.build(&spec("quiet")).is_ok());
    }
}
