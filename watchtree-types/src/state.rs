//! Monitor state and kind.

use core::fmt;
use core::str::FromStr;

/// Explicit state of a monitor.
///
/// The effective state of a monitor is derived from this: `Enabled` and
/// `Disabled` are taken as they are, `Inherit` resolves to the effective
/// state of the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MonitorState {
    /// Monitor records measurements.
    Enabled,
    /// Monitor ignores mutators; reads keep working.
    Disabled,
    /// Monitor follows its parent.
    #[default]
    Inherit,
}

impl MonitorState {
    /// Lowercase name, as used in configuration documents.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Enabled => "enabled",
            MonitorState::Disabled => "disabled",
            MonitorState::Inherit => "inherit",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a valid [`MonitorState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStateError(alloc::string::String);

impl fmt::Display for ParseStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown monitor state '{}'", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseStateError {}

impl FromStr for MonitorState {
    type Err = ParseStateError;

    /// Parses case-insensitively, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("enabled") {
            Ok(MonitorState::Enabled)
        } else if trimmed.eq_ignore_ascii_case("disabled") {
            Ok(MonitorState::Disabled)
        } else if trimmed.eq_ignore_ascii_case("inherit") {
            Ok(MonitorState::Inherit)
        } else {
            Err(ParseStateError(trimmed.into()))
        }
    }
}

/// What a monitor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MonitorKind {
    /// Placeholder for an ancestor nobody asked for by type yet.
    Unknown,
    /// Counts up and down.
    Counter,
    /// Measures durations.
    Stopwatch,
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MonitorKind::Unknown => "unknown",
            MonitorKind::Counter => "counter",
            MonitorKind::Stopwatch => "stopwatch",
        })
    }
}
