//! Nanosecond durations and their human-readable form.
//!
//! Stopwatches measure in nanoseconds. Consoles and log lines want
//! something shorter, so [`Nanos`] renders with the largest unit that keeps
//! the number above 1 (`ns`, `us`, `ms`, `s`).

use core::fmt;
use core::time::Duration;

/// Duration in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Nanos(pub u64);

const NANOS_IN_MICRO: u64 = 1_000;
const NANOS_IN_MILLI: u64 = 1_000_000;
const NANOS_IN_SECOND: u64 = 1_000_000_000;

impl Nanos {
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * NANOS_IN_MILLI)
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Value in milliseconds (truncated).
    pub const fn as_millis(&self) -> u64 {
        self.0 / NANOS_IN_MILLI
    }

    pub const fn to_duration(&self) -> Duration {
        Duration::from_nanos(self.0)
    }
}

impl From<Duration> for Nanos {
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl From<Nanos> for Duration {
    fn from(n: Nanos) -> Self {
        Duration::from_nanos(n.0)
    }
}

impl fmt::Display for Nanos {
    /// Three significant digits in the largest fitting unit, e.g. `12.3 ms`.
    /// `u64::MAX` is the "never measured" sentinel and renders as `undef`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.0;
        if nanos == u64::MAX {
            return f.write_str("undef");
        }
        let (divisor, unit) = if nanos < NANOS_IN_MICRO {
            return write!(f, "{} ns", nanos);
        } else if nanos < NANOS_IN_MILLI {
            (NANOS_IN_MICRO, "us")
        } else if nanos < NANOS_IN_SECOND {
            (NANOS_IN_MILLI, "ms")
        } else {
            (NANOS_IN_SECOND, "s")
        };

        let value = nanos as f64 / divisor as f64;
        if value >= 100.0 {
            write!(f, "{:.0} {}", value, unit)
        } else if value >= 10.0 {
            write!(f, "{:.1} {}", value, unit)
        } else {
            write!(f, "{:.2} {}", value, unit)
        }
    }
}
