//! The manager that actually measures.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use watchtree_types::{MonitorKind, HIERARCHY_DELIMITER, ROOT_NAME};

use super::Manager;
use crate::callback::{report_warning, Callback, CompositeCallback};
use crate::clock::{Clock, SystemClock};
use crate::config::{CallbackRegistry, Configuration};
use crate::error::MonitorError;
use crate::monitor::{Counter, ManagerShared, Monitor, MonitorNode, Stopwatch};
use crate::utils::check_name;

type NameMap = HashMap<String, Arc<MonitorNode>>;

/// A manager with a live monitor tree.
///
/// Lookups read a copy-on-write snapshot of the name map and take no lock.
/// Creating, retyping and destroying monitors serialize on one structure
/// lock.
///
/// # Example
///
/// ```rust
/// use watchtree_core::{EnabledManager, Manager, Monitor};
///
/// let manager = EnabledManager::new();
/// manager.counter("http.requests").unwrap().increase();
///
/// let http = manager.monitor("http").unwrap();
/// assert_eq!(http.children().len(), 1);
/// ```
pub struct EnabledManager {
    shared: Arc<ManagerShared>,
    root: ArcSwap<MonitorNode>,
    monitors: ArcSwap<NameMap>,
    structure: Mutex<()>,
    configuration: Configuration,
    registry: CallbackRegistry,
}

impl EnabledManager {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// A manager reading time from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let shared = Arc::new(ManagerShared {
            clock,
            callback: CompositeCallback::new_root(),
        });
        let root = MonitorNode::new(Some(ROOT_NAME.to_string()), MonitorKind::Unknown, shared.clone());
        let monitors = NameMap::from([(ROOT_NAME.to_string(), root.clone())]);
        Self {
            shared,
            root: ArcSwap::new(root),
            monitors: ArcSwap::from_pointee(monitors),
            structure: Mutex::new(()),
            configuration: Configuration::new(),
            registry: CallbackRegistry::new(),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.shared.clock.clone()
    }

    fn get_or_create(&self, name: &str, kind: MonitorKind) -> Result<Arc<MonitorNode>, MonitorError> {
        if name.is_empty() {
            return Ok(MonitorNode::new(None, kind, self.shared.clone()));
        }
        if let Some(node) = self.monitors.load().get(name) {
            if node.kind() == kind {
                return Ok(node.clone());
            }
        }
        check_name(name)?;

        let (node, created) = {
            let _structure = self.structure.lock();
            self.create_or_retype(name, kind)?
        };
        for monitor in &created {
            self.shared.callback.on_monitor_created(monitor.as_monitor());
        }
        Ok(node)
    }

    /// Called with the structure lock held. Returns the node plus every node
    /// that was created or retyped, outermost first.
    fn create_or_retype(
        &self,
        name: &str,
        kind: MonitorKind,
    ) -> Result<(Arc<MonitorNode>, Vec<Arc<MonitorNode>>), MonitorError> {
        let current = self.monitors.load_full();
        if let Some(node) = current.get(name) {
            let existing = node.kind();
            if existing == kind {
                return Ok((node.clone(), Vec::new()));
            }
            if existing == MonitorKind::Unknown && node.retype(kind) {
                self.apply_config(node, kind);
                return Ok((node.clone(), vec![node.clone()]));
            }
            return Err(MonitorError::TypeMismatch {
                name: name.to_string(),
                existing,
                requested: kind,
            });
        }

        let mut next = NameMap::clone(&current);
        let mut created = Vec::new();
        let node = self.insert(&mut next, name, kind, &mut created);
        self.monitors.store(Arc::new(next));
        Ok((node, created))
    }

    fn insert(
        &self,
        next: &mut NameMap,
        name: &str,
        kind: MonitorKind,
        created: &mut Vec<Arc<MonitorNode>>,
    ) -> Arc<MonitorNode> {
        let parent = match name.rfind(HIERARCHY_DELIMITER) {
            Some(ix) => {
                let parent_name = &name[..ix];
                match next.get(parent_name) {
                    Some(parent) => parent.clone(),
                    None => self.insert(next, parent_name, MonitorKind::Unknown, created),
                }
            }
            None => self.root.load_full(),
        };

        let node = MonitorNode::new(Some(name.to_string()), kind, self.shared.clone());
        parent.link_child(&node);
        self.apply_config(&node, kind);
        next.insert(name.to_string(), node.clone());
        created.push(node.clone());
        node
    }

    fn apply_config(&self, node: &MonitorNode, kind: MonitorKind) {
        let Some(name) = node.name() else {
            return;
        };
        if let Some(state) = self.configuration.config_for(name, kind).state {
            node.set_state(state, false);
        }
    }

    fn tracked(&self) -> Vec<Arc<MonitorNode>> {
        let mut nodes: Vec<Arc<MonitorNode>> = self.monitors.load().values().cloned().collect();
        nodes.sort_by(|a, b| a.name().cmp(&b.name()));
        nodes
    }
}

impl Default for EnabledManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnabledManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnabledManager")
            .field("monitors", &self.monitors.load().len())
            .field("callback", &self.shared.callback)
            .finish()
    }
}

impl Manager for EnabledManager {
    fn root_monitor(&self) -> Arc<dyn Monitor> {
        self.root.load_full()
    }

    fn monitor(&self, name: &str) -> Option<Arc<dyn Monitor>> {
        self.monitors
            .load()
            .get(name)
            .map(|node| node.clone() as Arc<dyn Monitor>)
    }

    fn counter(&self, name: &str) -> Result<Arc<dyn Counter>, MonitorError> {
        Ok(self.get_or_create(name, MonitorKind::Counter)?)
    }

    fn stopwatch(&self, name: &str) -> Result<Arc<dyn Stopwatch>, MonitorError> {
        Ok(self.get_or_create(name, MonitorKind::Stopwatch)?)
    }

    fn monitor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.monitors.load().keys().cloned().collect();
        names.sort();
        names
    }

    fn monitors(&self, filter: &dyn Fn(&dyn Monitor) -> bool) -> Vec<Arc<dyn Monitor>> {
        self.tracked()
            .into_iter()
            .filter(|node| filter(node.as_monitor()))
            .map(|node| node as Arc<dyn Monitor>)
            .collect()
    }

    fn destroy_monitor(&self, name: &str) -> Result<(), MonitorError> {
        if name == ROOT_NAME {
            return Err(MonitorError::DestroyRoot);
        }
        let destroyed = {
            let _structure = self.structure.lock();
            let current = self.monitors.load_full();
            let node = current
                .get(name)
                .cloned()
                .ok_or_else(|| MonitorError::NotFound(name.to_string()))?;

            let mut next = NameMap::clone(&current);
            if node.child_nodes().is_empty() {
                if let Some(parent) = node.parent_node() {
                    parent.unlink_child(&node);
                }
                next.remove(name);
            } else {
                next.insert(name.to_string(), node.replace_with_placeholder());
            }
            self.monitors.store(Arc::new(next));
            node
        };
        self.shared.callback.on_monitor_destroyed(destroyed.as_monitor());
        Ok(())
    }

    fn clear(&self) {
        {
            let _structure = self.structure.lock();
            let root = MonitorNode::new(
                Some(ROOT_NAME.to_string()),
                MonitorKind::Unknown,
                self.shared.clone(),
            );
            self.root.store(root.clone());
            self.monitors
                .store(Arc::new(NameMap::from([(ROOT_NAME.to_string(), root)])));
        }
        self.shared.callback.on_manager_clear();
    }

    fn callback(&self) -> Arc<CompositeCallback> {
        self.shared.callback.clone()
    }

    fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn callback_registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn message(&self, message: &str) {
        self.shared.callback.on_manager_message(message);
    }

    fn warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>) {
        report_warning(&self.shared.callback, warning, cause);
    }

    fn purge_incrementals_older_than(&self, threshold: u64) -> usize {
        self.monitors
            .load()
            .values()
            .map(|node| node.purge_incrementals(threshold))
            .sum()
    }

    fn milli_time(&self) -> u64 {
        self.shared.clock.milli_time()
    }
}
