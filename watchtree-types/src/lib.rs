//! # watchtree-types
//!
//! Plain data types produced by watchtree monitors: immutable samples of
//! counters and stopwatches, the monitor state and kind enums, and
//! aggregates that fold many samples together.
//!
//! Samples are snapshots. They are taken atomically with respect to the
//! monitor that produced them and live on after that monitor is destroyed,
//! so exporters, consoles and alerting code can hold on to them freely.
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: Serialization of samples and enums via serde
//!
//! ## Example
//!
//! ```rust
//! use watchtree_types::{StopwatchAggregate, StopwatchSample};
//!
//! let mut a = StopwatchSample::empty(Some("db.query".into()));
//! a.total = 30_000_000;
//! a.counter = 2;
//! a.min = 10_000_000;
//! a.max = 20_000_000;
//!
//! let mut aggregate = StopwatchAggregate::new();
//! aggregate.add_sample(&a);
//! assert_eq!(aggregate.counter(), 2);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod aggregate;
mod duration;
mod sample;
mod state;

pub use aggregate::*;
pub use duration::*;
pub use sample::*;
pub use state::*;

/// Name of the root monitor of every tree.
pub const ROOT_NAME: &str = "";

/// Delimiter between the segments of a hierarchical monitor name.
pub const HIERARCHY_DELIMITER: char = '.';
