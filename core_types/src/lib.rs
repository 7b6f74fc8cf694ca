//! # Core Types
//!
//! This crate defines the fundamental types shared by the master scheduler,
//! the resource ledger, and the workers.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: process ids and slot indices are distinct types
//!   and cannot be confused with resource counts.
//! - **Fixed limits**: the size of the system (resource classes, instances per
//!   class, process table rows) is a compile-time constant with a single home.
//!
//! ## Key Types
//!
//! - [`Pid`]: identifier of a master or worker unit
//! - [`SlotIndex`]: row index into the process table and the allocation matrix

pub mod ids;
pub mod limits;

pub use ids::{Pid, SlotIndex};
pub use limits::{INSTANCES_PER_CLASS, PROCESS_TABLE_CAPACITY, RESOURCE_CLASSES};
