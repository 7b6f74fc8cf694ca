//! Fixed-capacity process table
//!
//! Each slot is either empty or bound to one live worker. The slot index is
//! also the worker's row in the resource ledger.

use core_types::{Pid, SlotIndex};
use kernel_api::SimTime;
use thiserror::Error;

/// A bound process-table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: Pid,
    /// Simulated time the worker was admitted
    pub admitted_at: SimTime,
    pub slot: SlotIndex,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessTableError {
    #[error("{slot} is out of range (capacity {capacity})")]
    SlotOutOfRange { slot: SlotIndex, capacity: usize },

    #[error("{slot} is already bound to worker {pid}")]
    SlotOccupied { slot: SlotIndex, pid: Pid },
}

/// Process table
#[derive(Debug, Clone)]
pub struct ProcessTable {
    slots: Vec<Option<ProcessEntry>>,
}

impl ProcessTable {
    /// Creates a table with `capacity` empty slots
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// First unoccupied slot
    pub fn find_empty(&self) -> Option<SlotIndex> {
        self.slots
            .iter()
            .position(Option::is_none)
            .map(SlotIndex::new)
    }

    /// Slot bound to `pid`
    pub fn find_by_id(&self, pid: Pid) -> Option<SlotIndex> {
        self.iter().find(|entry| entry.pid == pid).map(|entry| entry.slot)
    }

    /// Entry in `slot`, if bound
    pub fn get(&self, slot: SlotIndex) -> Option<&ProcessEntry> {
        self.slots.get(slot.get()).and_then(Option::as_ref)
    }

    /// Binds `pid` to an empty slot
    pub fn bind(
        &mut self,
        slot: SlotIndex,
        pid: Pid,
        admitted_at: SimTime,
    ) -> Result<(), ProcessTableError> {
        let capacity = self.capacity();
        let cell = self
            .slots
            .get_mut(slot.get())
            .ok_or(ProcessTableError::SlotOutOfRange { slot, capacity })?;
        if let Some(existing) = cell {
            return Err(ProcessTableError::SlotOccupied {
                slot,
                pid: existing.pid,
            });
        }
        *cell = Some(ProcessEntry {
            pid,
            admitted_at,
            slot,
        });
        Ok(())
    }

    /// Frees the slot bound to `pid` and returns its index
    pub fn remove(&mut self, pid: Pid) -> Option<SlotIndex> {
        let slot = self.find_by_id(pid)?;
        self.slots[slot.get()] = None;
        Some(slot)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.find_empty().is_none()
    }

    /// Bound entries in slot order
    pub fn iter(&self) -> impl Iterator<Item = &ProcessEntry> + '_ {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Every slot in order, bound or not
    pub fn slots(&self) -> &[Option<ProcessEntry>] {
        &self.slots
    }

    /// Pids of every bound worker
    pub fn pids(&self) -> Vec<Pid> {
        self.iter().map(|entry| entry.pid).collect()
    }
}
