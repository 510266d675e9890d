//! The tree node behind every real monitor.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use watchtree_types::{
    CounterSample, MonitorKind, MonitorState, Sample, StopwatchSample, UnknownSample, ROOT_NAME,
};

use super::counter::CounterStats;
use super::incremental::Incrementals;
use super::stopwatch::StopwatchStats;
use super::{Attribute, Counter, Monitor, Stopwatch};
use crate::callback::CompositeCallback;
use crate::clock::Clock;

/// What every node of one manager shares.
#[derive(Debug)]
pub(crate) struct ManagerShared {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) callback: Arc<CompositeCallback>,
}

/// Usage timestamps in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Usage {
    pub(crate) first: u64,
    pub(crate) last: u64,
    pub(crate) reset: u64,
}

impl Usage {
    pub(crate) fn since(now: u64) -> Self {
        Self {
            first: 0,
            last: 0,
            reset: now,
        }
    }

    pub(crate) fn touch(&mut self, now: u64) {
        if self.first == 0 {
            self.first = now;
        }
        self.last = now;
    }
}

/// What a node measures.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Unknown,
    Counter(CounterStats),
    Stopwatch(StopwatchStats),
}

impl Payload {
    pub(crate) fn of_kind(kind: MonitorKind) -> Self {
        match kind {
            MonitorKind::Unknown => Payload::Unknown,
            MonitorKind::Counter => Payload::Counter(CounterStats::new()),
            MonitorKind::Stopwatch => Payload::Stopwatch(StopwatchStats::new()),
        }
    }

    pub(crate) fn kind(&self) -> MonitorKind {
        match self {
            Payload::Unknown => MonitorKind::Unknown,
            Payload::Counter(_) => MonitorKind::Counter,
            Payload::Stopwatch(_) => MonitorKind::Stopwatch,
        }
    }

    pub(crate) fn reset(&mut self) {
        match self {
            Payload::Unknown => {}
            Payload::Counter(stats) => stats.reset(),
            Payload::Stopwatch(stats) => stats.reset(),
        }
    }

    pub(crate) fn sample(&self, name: Option<String>, note: Option<String>, usage: Usage) -> Sample {
        match self {
            Payload::Unknown => Sample::Unknown(UnknownSample {
                name,
                note,
                first_usage: usage.first,
                last_usage: usage.last,
                last_reset: usage.reset,
            }),
            Payload::Counter(stats) => Sample::Counter(stats.sample(name, note, usage)),
            Payload::Stopwatch(stats) => Sample::Stopwatch(stats.sample(name, note, usage)),
        }
    }
}

/// Everything guarded by the node's data lock.
#[derive(Debug)]
pub(crate) struct MonitorData {
    pub(crate) usage: Usage,
    pub(crate) note: Option<String>,
    pub(crate) payload: Payload,
    pub(crate) incrementals: Incrementals,
}

impl MonitorData {
    fn new(kind: MonitorKind) -> Self {
        Self {
            usage: Usage::default(),
            note: None,
            payload: Payload::of_kind(kind),
            incrementals: Incrementals::default(),
        }
    }

    pub(crate) fn sample(&self, name: Option<&str>) -> Sample {
        self.payload
            .sample(name.map(str::to_string), self.note.clone(), self.usage)
    }

    pub(crate) fn counter_sample(&self, name: Option<&str>) -> Option<CounterSample> {
        match &self.payload {
            Payload::Counter(stats) => {
                Some(stats.sample(name.map(str::to_string), self.note.clone(), self.usage))
            }
            _ => None,
        }
    }

    pub(crate) fn stopwatch_sample(&self, name: Option<&str>) -> Option<StopwatchSample> {
        match &self.payload {
            Payload::Stopwatch(stats) => {
                Some(stats.sample(name.map(str::to_string), self.note.clone(), self.usage))
            }
            _ => None,
        }
    }
}

/// A node of the monitor tree.
///
/// The parent owns its children; children point back through a weak
/// reference. Accumulators live behind a reentrant lock so a callback that
/// runs inside an update can still read the monitor that triggered it.
pub(crate) struct MonitorNode {
    name: Option<String>,
    self_ref: Weak<MonitorNode>,
    pub(crate) shared: Arc<ManagerShared>,
    parent: RwLock<Weak<MonitorNode>>,
    children: RwLock<Vec<Arc<MonitorNode>>>,
    /// Explicit state; also serializes propagation through this subtree.
    state: Mutex<MonitorState>,
    enabled: AtomicBool,
    data: ReentrantMutex<RefCell<MonitorData>>,
    attributes: RwLock<HashMap<String, Attribute>>,
}

impl MonitorNode {
    /// Creates an unlinked node. The root and anonymous nodes start
    /// explicitly enabled; everything else inherits.
    pub(crate) fn new(
        name: Option<String>,
        kind: MonitorKind,
        shared: Arc<ManagerShared>,
    ) -> Arc<Self> {
        let explicit = match name.as_deref() {
            Some(n) if n != ROOT_NAME => MonitorState::Inherit,
            _ => MonitorState::Enabled,
        };
        Arc::new_cyclic(|self_ref| Self {
            name,
            self_ref: self_ref.clone(),
            shared,
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(Vec::new()),
            state: Mutex::new(explicit),
            enabled: AtomicBool::new(true),
            data: ReentrantMutex::new(RefCell::new(MonitorData::new(kind))),
            attributes: RwLock::new(HashMap::new()),
        })
    }

    /// Strong handle to this node.
    pub(crate) fn arc(&self) -> Option<Arc<Self>> {
        self.self_ref.upgrade()
    }

    fn accepts_inherit(&self) -> bool {
        matches!(self.name.as_deref(), Some(n) if n != ROOT_NAME)
    }

    pub(crate) fn now_millis(&self) -> u64 {
        self.shared.clock.milli_time()
    }

    pub(crate) fn has_listeners(&self) -> bool {
        self.shared.callback.has_callbacks()
    }

    /// Runs `f` with shared access to the accumulators.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&MonitorData) -> R) -> R {
        let guard = self.data.lock();
        let data = guard.borrow();
        f(&data)
    }

    /// Applies `mutate` and, if it produced an event, runs `notify` before
    /// the lock is released. Other callers of this monitor never observe the
    /// mutation without its notification.
    pub(crate) fn update<E>(
        &self,
        mutate: impl FnOnce(&mut MonitorData) -> Option<E>,
        notify: impl FnOnce(E),
    ) {
        let guard = self.data.lock();
        let event = {
            let mut data = guard.borrow_mut();
            mutate(&mut data)
        };
        if let Some(event) = event {
            notify(event);
        }
        drop(guard);
    }

    /// Swaps an `Unknown` payload for a fresh one of `kind`, keeping the
    /// node and its edges. Returns false when the node already has a type.
    pub(crate) fn retype(&self, kind: MonitorKind) -> bool {
        let guard = self.data.lock();
        let mut data = guard.borrow_mut();
        if data.payload.kind() != MonitorKind::Unknown {
            return false;
        }
        data.payload = Payload::of_kind(kind);
        data.incrementals.clear();
        true
    }

    pub(crate) fn parent_node(&self) -> Option<Arc<MonitorNode>> {
        self.parent.read().upgrade()
    }

    pub(crate) fn child_nodes(&self) -> Vec<Arc<MonitorNode>> {
        self.children.read().clone()
    }

    /// Links `child` under this node and copies this node's effective state
    /// onto it.
    pub(crate) fn link_child(&self, child: &Arc<MonitorNode>) {
        let _state = self.state.lock();
        *child.parent.write() = self.self_ref.clone();
        child
            .enabled
            .store(self.enabled.load(Ordering::Acquire), Ordering::Release);
        self.children.write().push(child.clone());
    }

    pub(crate) fn unlink_child(&self, child: &Arc<MonitorNode>) {
        let _state = self.state.lock();
        self.children.write().retain(|c| !Arc::ptr_eq(c, child));
        *child.parent.write() = Weak::new();
    }

    /// Creates an `Unknown` node with this node's name and state, moves all
    /// children under it and puts it in this node's place in the parent.
    ///
    /// Holds the parent's state lock, then this node's, for the whole swap,
    /// so a concurrent state change either lands before the copy or reaches
    /// the placeholder afterwards.
    pub(crate) fn replace_with_placeholder(&self) -> Arc<MonitorNode> {
        let placeholder = MonitorNode::new(self.name.clone(), MonitorKind::Unknown, self.shared.clone());
        let parent = self.parent_node();
        let _parent_state = parent.as_ref().map(|p| p.state.lock());
        let explicit = self.state.lock();

        *placeholder.state.lock() = *explicit;
        placeholder
            .enabled
            .store(self.enabled.load(Ordering::Acquire), Ordering::Release);

        let children = std::mem::take(&mut *self.children.write());
        for child in &children {
            *child.parent.write() = placeholder.self_ref.clone();
        }
        *placeholder.children.write() = children;

        if let Some(parent) = &parent {
            let mut siblings = parent.children.write();
            for sibling in siblings.iter_mut() {
                if std::ptr::eq(Arc::as_ptr(sibling), self) {
                    *sibling = placeholder.clone();
                }
            }
            *placeholder.parent.write() = Arc::downgrade(parent);
        }
        *self.parent.write() = Weak::new();
        placeholder
    }

    fn propagate(&self, parent_enabled: bool, overrule: bool) {
        let mut explicit = self.state.lock();
        if overrule {
            *explicit = MonitorState::Inherit;
        } else if *explicit != MonitorState::Inherit {
            return;
        }
        self.enabled.store(parent_enabled, Ordering::Release);
        for child in self.children.read().iter() {
            child.propagate(parent_enabled, overrule);
        }
    }

    /// Drops keyed accumulators untouched since `threshold` (ms).
    pub(crate) fn purge_incrementals(&self, threshold: u64) -> usize {
        let guard = self.data.lock();
        let mut data = guard.borrow_mut();
        data.incrementals.purge_older_than(threshold)
    }
}

impl std::fmt::Debug for MonitorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorNode")
            .field("name", &self.name)
            .field("enabled", &self.enabled.load(Ordering::Relaxed))
            .finish()
    }
}

impl Monitor for MonitorNode {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn kind(&self) -> MonitorKind {
        self.read(|data| data.payload.kind())
    }

    fn parent(&self) -> Option<Arc<dyn Monitor>> {
        self.parent_node().map(|p| p as Arc<dyn Monitor>)
    }

    fn children(&self) -> Vec<Arc<dyn Monitor>> {
        self.children
            .read()
            .iter()
            .map(|c| c.clone() as Arc<dyn Monitor>)
            .collect()
    }

    fn state(&self) -> MonitorState {
        *self.state.lock()
    }

    fn set_state(&self, state: MonitorState, overrule: bool) {
        if state == MonitorState::Inherit && !self.accepts_inherit() {
            return;
        }
        let mut explicit = self.state.lock();
        *explicit = state;
        let enabled = match state {
            MonitorState::Enabled => true,
            MonitorState::Disabled => false,
            MonitorState::Inherit => self
                .parent_node()
                .map(|p| p.is_enabled())
                .unwrap_or_else(|| self.enabled.load(Ordering::Acquire)),
        };
        self.enabled.store(enabled, Ordering::Release);
        for child in self.children.read().iter() {
            child.propagate(enabled, overrule);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn note(&self) -> Option<String> {
        self.read(|data| data.note.clone())
    }

    fn set_note(&self, note: Option<String>) {
        let guard = self.data.lock();
        guard.borrow_mut().note = note;
    }

    fn first_usage(&self) -> u64 {
        self.read(|data| data.usage.first)
    }

    fn last_usage(&self) -> u64 {
        self.read(|data| data.usage.last)
    }

    fn last_reset(&self) -> u64 {
        self.read(|data| data.usage.reset)
    }

    fn sample(&self) -> Sample {
        self.read(|data| data.sample(self.name()))
    }

    fn sample_and_reset(&self) -> Sample {
        let now = self.now_millis();
        let guard = self.data.lock();
        let mut data = guard.borrow_mut();
        let sample = data.sample(self.name());
        data.payload.reset();
        data.usage.reset = now;
        sample
    }

    fn reset(&self) {
        let now = self.now_millis();
        let guard = self.data.lock();
        let mut data = guard.borrow_mut();
        data.payload.reset();
        data.usage.reset = now;
    }

    fn sample_increment(&self, key: &str) -> Sample {
        let now = self.now_millis();
        let guard = self.data.lock();
        let mut data = guard.borrow_mut();
        let data = &mut *data;
        match data.incrementals.take_sample(key, self.name(), data.note.as_deref(), now) {
            Some(sample) => sample,
            None => {
                data.incrementals.install(key, data.payload.kind(), now);
                data.sample(self.name())
            }
        }
    }

    fn stop_incremental_sampling(&self, key: &str) -> bool {
        let guard = self.data.lock();
        let removed = guard.borrow_mut().incrementals.remove(key);
        removed
    }

    fn set_attribute(&self, name: &str, value: Attribute) {
        self.attributes.write().insert(name.to_string(), value);
    }

    fn attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.read().get(name).cloned()
    }

    fn remove_attribute(&self, name: &str) -> Option<Attribute> {
        self.attributes.write().remove(name)
    }

    fn attribute_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attributes.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn as_monitor(&self) -> &dyn Monitor {
        self
    }

    fn as_counter(&self) -> Option<&dyn Counter> {
        (self.kind() == MonitorKind::Counter).then_some(self as &dyn Counter)
    }

    fn as_stopwatch(&self) -> Option<&dyn Stopwatch> {
        (self.kind() == MonitorKind::Stopwatch).then_some(self as &dyn Stopwatch)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::clock::ManualClock;

    /// A manual clock plus node factory sharing one callback fabric.
    pub(crate) struct Fixture {
        pub(crate) clock: Arc<ManualClock>,
        pub(crate) shared: Arc<ManagerShared>,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let clock = Arc::new(ManualClock::at_millis(1_000));
            let shared = Arc::new(ManagerShared {
                clock: clock.clone(),
                callback: CompositeCallback::new_root(),
            });
            Self { clock, shared }
        }

        pub(crate) fn node(&self, name: &str, kind: MonitorKind) -> Arc<MonitorNode> {
            MonitorNode::new(Some(name.to_string()), kind, self.shared.clone())
        }

        pub(crate) fn root(&self) -> Arc<MonitorNode> {
            self.node(ROOT_NAME, MonitorKind::Unknown)
        }
    }
}
