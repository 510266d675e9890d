//! # watchtree
//!
//! Command-line companion for the watchtree monitoring library.
//!
//! - **[`settings`]**: loads configuration documents from TOML, YAML or JSON
//!   files with environment overrides and applies them to a manager
//! - **[`demo`]**: a synthetic workload that exercises counters, stopwatches
//!   and callbacks, then reports every sample
//!
//! The monitoring library itself lives in `watchtree-core`; its sample types
//! in `watchtree-types`.

pub mod demo;
pub mod settings;

pub use watchtree_core as core;
pub use watchtree_types as types;
