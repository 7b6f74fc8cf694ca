//! Identifiers for processes and process-table slots

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process identifier
///
/// Identifies the master or a worker. Workers are addressed by their pid on
/// the mailbox, and the master is addressed by its own pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(u32);

impl Pid {
    /// Pid of the master scheduler; workers are numbered above it
    pub const MASTER: Pid = Pid(1);

    /// Creates a pid from its raw value
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index of a process-table slot
///
/// The same index selects the worker's row in the allocation matrix, so the
/// slot and the ledger row always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn get(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_roundtrip() {
        let pid = Pid::new(4242);
        assert_eq!(pid.as_u32(), 4242);
        assert_eq!(pid.to_string(), "4242");
    }

    #[test]
    fn test_pid_ordering() {
        assert!(Pid::new(1) < Pid::new(2));
    }

    #[test]
    fn test_slot_index_display() {
        assert_eq!(SlotIndex::new(3).to_string(), "slot 3");
        assert_eq!(SlotIndex::new(3).get(), 3);
    }

    #[test]
    fn test_pid_serializes_transparently_as_number() {
        let json = serde_json::to_string(&Pid::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: Pid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Pid::new(7));
    }
}
