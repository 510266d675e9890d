//! Managers own a monitor tree, its callbacks and its configuration.
//!
//! [`EnabledManager`] does the real work, [`DisabledManager`] hands out
//! inert monitors, and [`SwitchingManager`] flips between the two at
//! runtime. [`global`] returns a process-wide switching manager.

mod disabled;
mod enabled;
mod switching;

use std::error::Error as StdError;
use std::sync::{Arc, OnceLock};

use crate::callback::CompositeCallback;
use crate::config::{self, CallbackRegistry, ConfigDocument, Configuration};
use crate::error::MonitorError;
use crate::monitor::{Counter, Monitor, Stopwatch};
use crate::pattern::Pattern;

pub use disabled::DisabledManager;
pub use enabled::EnabledManager;
pub use switching::SwitchingManager;

/// Environment variable naming a JSON document for [`global`].
pub const CONFIG_ENV: &str = "WATCHTREE_CONFIG";

/// Entry point for obtaining and administering monitors.
pub trait Manager: Send + Sync {
    /// The root of the tree, named `""`.
    fn root_monitor(&self) -> Arc<dyn Monitor>;

    /// Monitor of any kind by full name.
    fn monitor(&self, name: &str) -> Option<Arc<dyn Monitor>>;

    /// Returns the counter named `name`, creating it (and any missing
    /// ancestors) first. An empty name creates an anonymous counter the
    /// manager does not track.
    fn counter(&self, name: &str) -> Result<Arc<dyn Counter>, MonitorError>;

    /// Like [`counter`](Manager::counter), for stopwatches.
    fn stopwatch(&self, name: &str) -> Result<Arc<dyn Stopwatch>, MonitorError>;

    /// Names of all tracked monitors, sorted. Includes the root.
    fn monitor_names(&self) -> Vec<String>;

    /// Tracked monitors accepted by `filter`, sorted by name.
    fn monitors(&self, filter: &dyn Fn(&dyn Monitor) -> bool) -> Vec<Arc<dyn Monitor>>;

    fn monitors_matching(&self, pattern: &Pattern) -> Vec<Arc<dyn Monitor>> {
        self.monitors(&|monitor| pattern.matches_monitor(monitor))
    }

    /// Removes a monitor. One with children is replaced by an `Unknown`
    /// placeholder so the subtree stays linked.
    fn destroy_monitor(&self, name: &str) -> Result<(), MonitorError>;

    /// Drops the whole tree, keeping configuration and callbacks.
    fn clear(&self);

    /// Root of the callback tree.
    fn callback(&self) -> Arc<CompositeCallback>;

    fn configuration(&self) -> &Configuration;

    /// Callback kinds available to [`apply_document`](Manager::apply_document).
    fn callback_registry(&self) -> &CallbackRegistry;

    fn enable(&self) -> Result<(), MonitorError> {
        Err(MonitorError::Unsupported("enable"))
    }

    fn disable(&self) -> Result<(), MonitorError> {
        Err(MonitorError::Unsupported("disable"))
    }

    fn is_enabled(&self) -> bool;

    /// Broadcasts a message to the callbacks.
    fn message(&self, message: &str);

    /// Logs a warning and broadcasts it to the callbacks.
    fn warning(&self, warning: &str, cause: Option<&(dyn StdError + 'static)>);

    /// Drops keyed accumulators untouched since `threshold` (ms) across all
    /// tracked monitors. Returns how many were dropped.
    fn purge_incrementals_older_than(&self, threshold: u64) -> usize;

    /// Current wall-clock time of this manager's clock, in milliseconds.
    fn milli_time(&self) -> u64;

    /// Applies a configuration document; see [`config::apply`].
    fn apply_document(&self, document: &ConfigDocument) -> bool {
        config::apply(self, document)
    }

    /// Parses and applies a JSON configuration document. A parse failure is
    /// reported as a warning, like any other invalid document.
    fn configure_from_json(&self, json: &str) -> bool {
        match ConfigDocument::from_json(json) {
            Ok(document) => self.apply_document(&document),
            Err(e) => {
                self.warning("Configuration document rejected", Some(&e));
                false
            }
        }
    }
}

/// The process-wide manager.
///
/// Built on first use. If [`CONFIG_ENV`] names a file, its JSON document is
/// applied; a missing or invalid file becomes a manager warning.
pub fn global() -> Arc<SwitchingManager> {
    static GLOBAL: OnceLock<Arc<SwitchingManager>> = OnceLock::new();
    GLOBAL
        .get_or_init(|| {
            let manager = Arc::new(SwitchingManager::new());
            if let Ok(path) = std::env::var(CONFIG_ENV) {
                match std::fs::read_to_string(&path) {
                    Ok(json) => {
                        manager.configure_from_json(&json);
                    }
                    Err(e) => manager.warning(
                        &format!("Failed to read configuration file '{}'", path),
                        Some(&e),
                    ),
                }
            }
            manager
        })
        .clone()
}
