//! Shared simulated clock
//!
//! The clock is one atomic nanosecond counter shared between the master and
//! every worker. Ownership is split by type:
//!
//! - [`ClockWriter`] is held by the master alone (it is not `Clone`) and is
//!   the only way to move time forward.
//! - [`ClockReader`] is handed to workers; it can be cloned freely and only
//!   exposes snapshots.
//!
//! Because seconds and nanoseconds are packed into one word, a reader can
//! never observe a half-updated pair.

use crate::{SimDuration, SimTime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Write handle for the simulated clock
///
/// # Examples
///
/// ```
/// use kernel_api::{ClockWriter, SimDuration};
///
/// let mut clock = ClockWriter::new();
/// let reader = clock.reader();
///
/// clock.tick(SimDuration::from_nanos(10_000));
/// assert_eq!(reader.now().as_nanos(), 10_000);
/// ```
#[derive(Debug)]
pub struct ClockWriter {
    nanos: Arc<AtomicU64>,
}

impl ClockWriter {
    /// Creates a clock at simulated time zero
    pub fn new() -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advances the clock by `quantum` and returns the new time
    ///
    /// A zero quantum is clamped up to one nanosecond so every tick moves
    /// time strictly forward.
    pub fn tick(&mut self, quantum: SimDuration) -> SimTime {
        let step = quantum.as_nanos().max(1);
        let previous = self.nanos.fetch_add(step, Ordering::AcqRel);
        SimTime::from_nanos(previous.saturating_add(step))
    }

    /// Current time
    pub fn now(&self) -> SimTime {
        SimTime::from_nanos(self.nanos.load(Ordering::Acquire))
    }

    /// Creates a read-only handle onto the same clock
    pub fn reader(&self) -> ClockReader {
        ClockReader {
            nanos: Arc::clone(&self.nanos),
        }
    }
}

impl Default for ClockWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle for the simulated clock
#[derive(Debug, Clone)]
pub struct ClockReader {
    nanos: Arc<AtomicU64>,
}

impl ClockReader {
    /// Snapshot of the current simulated time
    ///
    /// The master may advance the clock between two reads; callers must not
    /// assume time is quiescent.
    pub fn now(&self) -> SimTime {
        SimTime::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_clock_starts_at_zero() {
        let clock = ClockWriter::new();
        assert_eq!(clock.now(), SimTime::ZERO);
    }

    #[test]
    fn test_tick_advances_and_normalizes() {
        let mut clock = ClockWriter::new();
        clock.tick(SimDuration::from_nanos(999_999_999));
        let now = clock.tick(SimDuration::from_nanos(2));
        assert_eq!(now.seconds(), 1);
        assert_eq!(now.nanoseconds(), 1);
    }

    #[test]
    fn test_zero_quantum_is_clamped() {
        let mut clock = ClockWriter::new();
        let t1 = clock.tick(SimDuration::ZERO);
        let t2 = clock.tick(SimDuration::ZERO);
        assert_eq!(t1.as_nanos(), 1);
        assert!(t2 > t1);
    }

    #[test]
    fn test_reader_sees_writer_updates() {
        let mut clock = ClockWriter::new();
        let reader = clock.reader();
        let other = reader.clone();
        clock.tick(SimDuration::from_millis(5));
        assert_eq!(reader.now(), SimTime::from_parts(0, 5_000_000));
        assert_eq!(other.now(), reader.now());
    }

    #[test]
    fn test_readers_observe_monotonic_time_across_threads() {
        let mut clock = ClockWriter::new();
        let reader = clock.reader();
        let observer = thread::spawn(move || {
            let mut last = SimTime::ZERO;
            for _ in 0..10_000 {
                let now = reader.now();
                assert!(now >= last);
                last = now;
            }
        });
        for _ in 0..10_000 {
            clock.tick(SimDuration::from_nanos(10_000));
        }
        observer.join().unwrap();
    }
}
