//! Pending request queue
//!
//! Requests the ledger could not satisfy wait here. The drain scans from the
//! front and restarts from the front after every grant or discard, so service
//! is not FIFO: a small request behind a large one can be granted first, and a
//! large request can starve under steady small demand.

use crate::process_table::ProcessTable;
use core_types::{Pid, SlotIndex};
use kernel_api::SimTime;
use resources::{ResourceError, ResourceLedger, ResourceVector};

/// A request waiting for resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub pid: Pid,
    pub amounts: ResourceVector,
    pub queued_at: SimTime,
}

/// A queued request granted by a drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainGrant {
    pub request: PendingRequest,
    pub slot: SlotIndex,
}

/// Outcome of one drain, in the order things happened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub granted: Vec<DrainGrant>,
    /// Requests whose owner no longer has a process-table slot
    pub discarded: Vec<PendingRequest>,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.granted.is_empty() && self.discarded.is_empty()
    }
}

/// Ordered queue of pending requests
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    entries: Vec<PendingRequest>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request at the back
    pub fn push(&mut self, request: PendingRequest) {
        self.entries.push(request);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> + '_ {
        self.entries.iter()
    }

    /// Whether `pid` has a request waiting
    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.iter().any(|entry| entry.pid == pid)
    }

    /// Grants every request that can now be satisfied
    ///
    /// Repeats front-to-back scans until one completes without a grant or a
    /// discard. Each pass either removes an entry or ends the drain, so the
    /// drain always terminates.
    pub fn drain(
        &mut self,
        table: &ProcessTable,
        ledger: &mut ResourceLedger,
    ) -> Result<DrainReport, ResourceError> {
        let mut report = DrainReport::default();

        'scan: loop {
            for index in 0..self.entries.len() {
                let Some(slot) = table.find_by_id(self.entries[index].pid) else {
                    report.discarded.push(self.entries.remove(index));
                    continue 'scan;
                };
                if ledger.try_allocate(slot, &self.entries[index].amounts)? {
                    let request = self.entries.remove(index);
                    report.granted.push(DrainGrant { request, slot });
                    continue 'scan;
                }
            }
            break;
        }

        Ok(report)
    }
}
