//! Resource audit log
//!
//! Test-visible record of every admission, grant, queue, release, reclaim,
//! discard, and kill the master performs. Each entry carries the simulated
//! time it happened and, where the ledger changed, the resulting available
//! vector.
//!
//! The audit log is an observer only: nothing in the master reads it back.
//! It is bounded, so a long run keeps only its most recent history.

use core_types::{Pid, SlotIndex};
use kernel_api::SimTime;
use resources::ResourceVector;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Resource bookkeeping event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceEvent {
    /// Worker spawned and bound to a slot
    Admitted { pid: Pid, slot: SlotIndex },

    /// Worker spawned but no slot was free; it was killed
    AdmissionKilled { pid: Pid },

    /// Request satisfied
    Granted {
        pid: Pid,
        slot: SlotIndex,
        amounts: ResourceVector,
        /// Whether the request waited in the pending queue first
        queued: bool,
        available: ResourceVector,
    },

    /// Request could not be satisfied and was queued
    Queued { pid: Pid, amounts: ResourceVector },

    /// Instances returned by a worker
    Released {
        pid: Pid,
        slot: SlotIndex,
        amounts: ResourceVector,
        mass: bool,
        available: ResourceVector,
    },

    /// Whole row returned when a worker left
    Reclaimed {
        pid: Pid,
        slot: SlotIndex,
        amounts: ResourceVector,
        available: ResourceVector,
    },

    /// Queued request dropped because its worker is gone
    StaleRequestDiscarded { pid: Pid, amounts: ResourceVector },

    /// Message from a pid with no process-table slot
    MessageDropped { pid: Pid, kind: String },
}

impl ResourceEvent {
    /// Pid the event concerns
    pub fn pid(&self) -> Pid {
        match self {
            ResourceEvent::Admitted { pid, .. }
            | ResourceEvent::AdmissionKilled { pid }
            | ResourceEvent::Granted { pid, .. }
            | ResourceEvent::Queued { pid, .. }
            | ResourceEvent::Released { pid, .. }
            | ResourceEvent::Reclaimed { pid, .. }
            | ResourceEvent::StaleRequestDiscarded { pid, .. }
            | ResourceEvent::MessageDropped { pid, .. } => *pid,
        }
    }
}

/// Audit entry with timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAuditEntry {
    pub timestamp: SimTime,
    pub event: ResourceEvent,
}

/// Default number of entries kept before the oldest are dropped
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// Resource audit log
///
/// Keeps the most recent `capacity` entries; older ones are dropped as new
/// ones arrive.
#[derive(Debug, Clone)]
pub struct ResourceAuditLog {
    entries: VecDeque<ResourceAuditEntry>,
    capacity: usize,
    dropped: u64,
}

impl ResourceAuditLog {
    /// Creates a new empty audit log with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Creates a new empty audit log holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Records a resource event
    pub fn record_event(&mut self, timestamp: SimTime, event: ResourceEvent) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(ResourceAuditEntry { timestamp, event });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries evicted to stay within capacity
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Returns all retained entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &ResourceAuditEntry> {
        self.entries.iter()
    }

    /// Checks if any entry matches a predicate
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&ResourceEvent) -> bool,
    {
        self.entries.iter().any(|entry| predicate(&entry.event))
    }

    /// Counts events matching a predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&ResourceEvent) -> bool,
    {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.event))
            .count()
    }

    /// Entries concerning one worker, oldest first
    pub fn entries_for(&self, pid: Pid) -> Vec<&ResourceAuditEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.event.pid() == pid)
            .collect()
    }

    /// Most recent event
    pub fn last_event(&self) -> Option<&ResourceEvent> {
        self.entries.back().map(|entry| &entry.event)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ResourceAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_log_creation() {
        let log = ResourceAuditLog::new();
        assert_eq!(log.len(), 0);
        assert!(log.is_empty());
        assert!(log.last_event().is_none());
    }

    #[test]
    fn test_record_and_query() {
        let mut log = ResourceAuditLog::new();
        let pid = Pid::new(7);
        log.record_event(
            SimTime::from_nanos(1000),
            ResourceEvent::Admitted {
                pid,
                slot: SlotIndex::new(0),
            },
        );
        log.record_event(
            SimTime::from_nanos(2000),
            ResourceEvent::Queued {
                pid,
                amounts: [1, 0].into(),
            },
        );
        log.record_event(
            SimTime::from_nanos(3000),
            ResourceEvent::AdmissionKilled { pid: Pid::new(8) },
        );

        assert_eq!(log.len(), 3);
        assert!(log.has_event(|e| matches!(e, ResourceEvent::Queued { .. })));
        assert_eq!(
            log.count_events(|e| matches!(e, ResourceEvent::AdmissionKilled { .. })),
            1
        );
        let for_pid = log.entries_for(pid);
        assert_eq!(for_pid.len(), 2);
        assert_eq!(for_pid[1].timestamp, SimTime::from_nanos(2000));
    }

    #[test]
    fn test_events_serialize() {
        let event = ResourceEvent::Released {
            pid: Pid::new(3),
            slot: SlotIndex::new(1),
            amounts: [0, 2].into(),
            mass: true,
            available: [5, 5].into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ResourceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut log = ResourceAuditLog::with_capacity(2);
        for pid in 1..=3 {
            log.record_event(
                SimTime::from_nanos(u64::from(pid)),
                ResourceEvent::AdmissionKilled { pid: Pid::new(pid) },
            );
        }

        assert_eq!(log.len(), 2);
        assert_eq!(log.dropped(), 1);
        assert!(log.entries_for(Pid::new(1)).is_empty());
        let kept: Vec<Pid> = log.entries().map(|entry| entry.event.pid()).collect();
        assert_eq!(kept, vec![Pid::new(2), Pid::new(3)]);
        assert_eq!(
            log.last_event(),
            Some(&ResourceEvent::AdmissionKilled { pid: Pid::new(3) })
        );
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut log = ResourceAuditLog::with_capacity(0);
        log.record_event(SimTime::ZERO, ResourceEvent::AdmissionKilled { pid: Pid::new(4) });
        assert!(log.is_empty());
        assert_eq!(log.dropped(), 1);
    }

    #[test]
    fn test_clear() {
        let mut log = ResourceAuditLog::new();
        log.record_event(SimTime::ZERO, ResourceEvent::AdmissionKilled { pid: Pid::new(1) });
        log.clear();
        assert!(log.is_empty());
    }
}
