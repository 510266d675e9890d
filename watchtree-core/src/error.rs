//! Error types.

use thiserror::Error;
use watchtree_types::MonitorKind;

/// Invalid configuration, reported when the offending value is constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Wildcard placed somewhere other than the start and/or end.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Monitor name with characters outside the allowed set.
    #[error("Invalid monitor name '{0}'")]
    InvalidName(String),

    /// Condition expression that does not parse or is not boolean.
    #[error("Invalid condition '{expression}': {reason}")]
    InvalidCondition { expression: String, reason: String },

    /// Rule definition that cannot be built.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Callback kind nobody registered a factory for.
    #[error("Unknown callback kind '{0}'")]
    UnknownCallbackKind(String),

    /// Callback property with an unusable value.
    #[error("Invalid property '{property}' for callback '{kind}': {reason}")]
    InvalidProperty {
        kind: String,
        property: String,
        reason: String,
    },

    /// Configuration document that is not valid JSON for the document model.
    #[error("Failed to parse configuration document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Misuse of the monitor tree.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Monitor name with characters outside the allowed set.
    #[error("Invalid monitor name '{0}'")]
    InvalidName(String),

    /// A monitor of another concrete type already lives at this name.
    #[error("Monitor '{name}' is a {existing}, not a {requested}")]
    TypeMismatch {
        name: String,
        existing: MonitorKind,
        requested: MonitorKind,
    },

    /// The root monitor cannot be destroyed.
    #[error("Root monitor cannot be destroyed")]
    DestroyRoot,

    /// No monitor with this name.
    #[error("Monitor '{0}' not found")]
    NotFound(String),

    /// Operation not offered by this manager variant.
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Purger started twice or cancelled while idle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PurgerError {
    #[error("Purger already started")]
    AlreadyStarted,

    #[error("Purger not started")]
    NotStarted,
}

/// Condition evaluation failure at event time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    /// The event does not provide a variable the condition reads.
    #[error("Variable '{0}' is not available for this event")]
    MissingVariable(&'static str),
}

/// Bucket layout that cannot be built or quantile that cannot be estimated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QuantileError {
    #[error("Expected at least 3 buckets, got {0}")]
    TooFewBuckets(usize),

    /// `max - min` must leave every bucket at least 1ns wide.
    #[error("Range {min}..{max} is too narrow for {count} buckets")]
    NarrowRange { min: u64, max: u64, count: usize },

    #[error("Quantile ratio {0} is not strictly between 0 and 1")]
    InvalidRatio(f64),

    /// Fewer than three regular buckets hold values.
    #[error("Only {0} buckets used, not enough for interpolation")]
    NotEnoughBuckets(usize),

    #[error("Quantile below the bucket range, decrease min")]
    BelowRange,

    #[error("Quantile above the bucket range, increase max")]
    AboveRange,
}
