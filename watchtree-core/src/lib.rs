//! # watchtree-core
//!
//! Hierarchical counters and stopwatches that can be switched on and off at
//! runtime, with a callback fabric for reacting to what they measure.
//!
//! Monitors are named with dotted paths (`org.example.db.query`) and live in
//! a tree owned by a [`Manager`]. Disabling a subtree turns every monitor in
//! it into a near no-op without touching the code that uses them.
//!
//! ## Quick Start
//!
//! ```rust
//! use watchtree_core::{EnabledManager, Manager, MonitorState};
//!
//! let manager = EnabledManager::new();
//!
//! let stopwatch = manager.stopwatch("app.db.query").unwrap();
//! let split = stopwatch.start();
//! // ... run the query ...
//! split.stop();
//! assert_eq!(stopwatch.counter(), 1);
//!
//! let hits = manager.counter("app.cache.hits").unwrap();
//! hits.increase_by(3);
//!
//! // Switch off everything under `app.cache`
//! manager
//!     .monitor("app.cache")
//!     .unwrap()
//!     .set_state(MonitorState::Disabled, false);
//! hits.increase();
//! assert_eq!(hits.value(), 3);
//! ```
//!
//! ## Features
//!
//! - **Inherited state**: monitors inherit enabled/disabled from ancestors
//! - **Incremental sampling**: keyed deltas for several independent readers
//! - **Callbacks**: composite, filtering and logging callbacks out of the box
//! - **Split statistics**: quantile buckets, last splits and timelines kept
//!   per stopwatch
//! - **Declarative configuration**: JSON documents with pattern rules
//! - **Switching**: [`SwitchingManager`] swaps in inert monitors at runtime
//! - `tokio` feature: [`TokioScheduler`] for the incremental purger

pub mod callback;
pub mod clock;
pub mod config;
mod error;
pub mod manager;
pub mod monitor;
mod pattern;
pub mod purger;
mod split;
mod stat;
pub mod utils;

pub use callback::{
    Callback, CallbackContext, CompositeCallback, FilterCallback, LastSplitsCallback,
    LoggingCallback, QuantilesCallback, TimelineCallback,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigDocument, Configuration, MonitorConfig};
pub use error::{ConfigError, EvalError, MonitorError, PurgerError, QuantileError};
pub use manager::{global, DisabledManager, EnabledManager, Manager, SwitchingManager};
pub use monitor::{Attribute, Counter, Monitor, Stopwatch};
pub use pattern::Pattern;
#[cfg(feature = "tokio")]
pub use purger::TokioScheduler;
pub use purger::{IncrementalPurger, ThreadScheduler};
pub use split::{Split, SplitGuard};
pub use stat::StatAccumulator;

// Re-export types for convenience
pub use watchtree_types::{
    CounterAggregate, CounterSample, MonitorKind, MonitorState, Nanos, Sample, StopwatchAggregate,
    StopwatchSample, UnknownSample,
};
