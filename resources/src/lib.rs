//! # Resources
//!
//! This crate provides the resource ledger for the simulated kernel.
//!
//! ## Philosophy
//!
//! - **Resources are finite and must be explicit**
//! - **Accounting is deterministic and testable**
//! - **Conservation is an invariant, not a hope**: the available pool plus
//!   every slot's allocation always equals the class totals
//! - **Violations are loud**: releasing more than a slot holds is an error,
//!   never silently clamped
//!
//! ## Core Concepts
//!
//! - [`ResourceVector`]: per-class instance counts
//! - [`ResourceLedger`]: totals, available pool, and the per-slot allocation matrix
//! - [`ResourceError`]: ledger consistency errors
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A deadlock detector (no wait-for graph, no banker's algorithm)
//! - A fair allocator (queueing policy lives with the scheduler)
//!
//! The ledger is owned by exactly one writer, the master scheduler.

pub mod ledger;
pub mod vector;

pub use ledger::ResourceLedger;
pub use vector::{DeltaDisplay, ResourceVector};

use core_types::SlotIndex;
use thiserror::Error;

/// Resource-related errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("Resource vector has {actual} classes, ledger has {expected}")]
    ClassCountMismatch { expected: usize, actual: usize },

    #[error("{slot} out of range: ledger has {rows} rows")]
    SlotOutOfRange { slot: SlotIndex, rows: usize },

    #[error("Release exceeds holding: {slot} holds {held} of R{class}, tried to release {requested}")]
    ReleaseExceedsHolding {
        slot: SlotIndex,
        class: usize,
        held: u32,
        requested: u32,
    },

    #[error("Instance count overflow on {slot}")]
    CountOverflow { slot: SlotIndex },

    #[error("Conservation violated for R{class}: available {available} + allocated {allocated} != total {total}")]
    ConservationViolated {
        class: usize,
        available: u64,
        allocated: u64,
        total: u64,
    },
}
