//! Simulated time abstractions

use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanoseconds in one simulated second
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point in simulated time
///
/// Stored as a normalized `(seconds, nanoseconds)` pair: `nanoseconds` is
/// always below one second. Unlike wall-clock time this only moves when the
/// master advances it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime {
    seconds: u64,
    nanoseconds: u32,
}

impl SimTime {
    /// The start of the simulation
    pub const ZERO: SimTime = SimTime {
        seconds: 0,
        nanoseconds: 0,
    };

    /// Creates a time from a pair, carrying any nanosecond overflow
    pub fn from_parts(seconds: u64, nanoseconds: u64) -> Self {
        Self::from_nanos(
            seconds
                .saturating_mul(NANOS_PER_SEC)
                .saturating_add(nanoseconds),
        )
    }

    /// Creates a time from nanoseconds since the start of the simulation
    pub const fn from_nanos(nanos: u64) -> Self {
        Self {
            seconds: nanos / NANOS_PER_SEC,
            nanoseconds: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    /// Nanoseconds since the start of the simulation
    pub const fn as_nanos(&self) -> u64 {
        self.seconds * NANOS_PER_SEC + self.nanoseconds as u64
    }

    pub const fn seconds(&self) -> u64 {
        self.seconds
    }

    pub const fn nanoseconds(&self) -> u32 {
        self.nanoseconds
    }

    /// Returns the duration since another instant (zero if `earlier` is later)
    pub fn duration_since(&self, earlier: SimTime) -> SimDuration {
        SimDuration::from_nanos(self.as_nanos().saturating_sub(earlier.as_nanos()))
    }
}

impl Add<SimDuration> for SimTime {
    type Output = SimTime;

    fn add(self, duration: SimDuration) -> Self::Output {
        SimTime::from_nanos(self.as_nanos().saturating_add(duration.as_nanos()))
    }
}

impl Sub<SimDuration> for SimTime {
    type Output = SimTime;

    fn sub(self, duration: SimDuration) -> Self::Output {
        SimTime::from_nanos(self.as_nanos().saturating_sub(duration.as_nanos()))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s {}ns", self.seconds, self.nanoseconds)
    }
}

/// A span of simulated time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimDuration {
    nanos: u64,
}

impl SimDuration {
    pub const ZERO: SimDuration = SimDuration { nanos: 0 };

    /// Creates a duration from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    /// Creates a duration from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    /// Creates a duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self {
            nanos: secs * NANOS_PER_SEC,
        }
    }

    /// Creates a duration from fractional seconds
    ///
    /// The whole part becomes seconds and the fractional part is truncated to
    /// nanoseconds. Negative and non-finite inputs give zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        let whole = secs.trunc();
        let fraction = ((secs - whole) * NANOS_PER_SEC as f64) as u64;
        Self::from_parts(whole as u64, fraction)
    }

    /// Creates a duration from a `(seconds, nanoseconds)` pair
    pub fn from_parts(seconds: u64, nanoseconds: u64) -> Self {
        Self {
            nanos: seconds
                .saturating_mul(NANOS_PER_SEC)
                .saturating_add(nanoseconds),
        }
    }

    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    /// Whole seconds
    pub const fn as_secs(&self) -> u64 {
        self.nanos / NANOS_PER_SEC
    }

    /// Nanoseconds beyond the whole seconds
    pub const fn subsec_nanos(&self) -> u32 {
        (self.nanos % NANOS_PER_SEC) as u32
    }

    pub const fn is_zero(&self) -> bool {
        self.nanos == 0
    }
}

impl Add for SimDuration {
    type Output = SimDuration;

    fn add(self, other: SimDuration) -> Self::Output {
        SimDuration::from_nanos(self.nanos.saturating_add(other.nanos))
    }
}

impl Sub for SimDuration {
    type Output = SimDuration;

    fn sub(self, other: SimDuration) -> Self::Output {
        SimDuration::from_nanos(self.nanos.saturating_sub(other.nanos))
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s {}ns", self.as_secs(), self.subsec_nanos())
    }
}
