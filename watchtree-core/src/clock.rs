//! Time sources.
//!
//! Monitors never read the system time directly. They go through a
//! [`Clock`] owned by their manager so tests can drive time by hand.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Nanoseconds in one millisecond.
pub const NANOS_IN_MILLIS: u64 = 1_000_000;

/// A source of monotonic nanoseconds and wall-clock milliseconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic time in nanoseconds; only differences are meaningful.
    fn nano_time(&self) -> u64;

    /// Wall-clock time in milliseconds since the Unix epoch.
    fn milli_time(&self) -> u64;

    /// Converts a value returned by [`nano_time`](Clock::nano_time) into
    /// wall-clock milliseconds.
    fn millis_for_nano(&self, nanos: u64) -> u64;
}

/// Clock backed by [`Instant`] and [`SystemTime`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
    origin_millis: u64,
}

impl SystemClock {
    pub fn new() -> Self {
        let origin_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin: Instant::now(),
            origin_millis,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn nano_time(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn milli_time(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn millis_for_nano(&self, nanos: u64) -> u64 {
        self.origin_millis + nanos / NANOS_IN_MILLIS
    }
}

/// Clock that only moves when told to.
///
/// Milliseconds follow nanoseconds: `milli_time() == nano_time() / 1_000_000`.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at the given millisecond.
    pub fn at_millis(millis: u64) -> Self {
        let clock = Self::new();
        clock.set_millis(millis);
        clock
    }

    pub fn set_nanos(&self, nanos: u64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: u64) {
        self.set_nanos(millis * NANOS_IN_MILLIS);
    }

    pub fn advance_nanos(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance_nanos(millis * NANOS_IN_MILLIS);
    }
}

impl Clock for ManualClock {
    fn nano_time(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }

    fn milli_time(&self) -> u64 {
        self.nano_time() / NANOS_IN_MILLIS
    }

    fn millis_for_nano(&self, nanos: u64) -> u64 {
        nanos / NANOS_IN_MILLIS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.nano_time();
        let b = clock.nano_time();
        assert!(b >= a);
    }

    #[test]
    fn system_clock_maps_nanos_near_wall_time() {
        let clock = SystemClock::new();
        let mapped = clock.millis_for_nano(clock.nano_time());
        let wall = clock.milli_time();
        assert!(wall.abs_diff(mapped) < 1_000);
    }

    #[test]
    fn manual_clock_millis_follow_nanos() {
        let clock = ManualClock::at_millis(5);
        assert_eq!(clock.nano_time(), 5_000_000);
        assert_eq!(clock.milli_time(), 5);

        clock.advance_millis(10);
        assert_eq!(clock.milli_time(), 15);

        clock.advance_nanos(999_999);
        assert_eq!(clock.milli_time(), 15);
        assert_eq!(clock.millis_for_nano(clock.nano_time()), 15);
    }
}
