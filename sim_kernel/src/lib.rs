//! # Simulated Kernel
//!
//! This crate implements the master side of the simulated kernel: the
//! scheduler loop that owns the clock, admits workers into the process table,
//! and serves their resource requests from the ledger.
//!
//! ## Purpose
//!
//! - Admission control bounded by total, simultaneous, and table capacity
//! - Multi-instance resource allocation with a pending queue for requests
//!   that cannot be served yet
//! - Reclamation of everything a departing worker held
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! Workers are reached only through the [`kernel_api::WorkerSpawner`] seam
//! and the mailbox, so the whole master can be driven tick by tick from a
//! test with [`test_utils::RecordingSpawner`] and
//! [`test_utils::ScriptedWorker`]. Every bookkeeping decision is also
//! recorded in a [`resource_audit::ResourceAuditLog`] that tests can query.

pub mod config;
pub mod pending;
pub mod process_table;
pub mod report;
pub mod resource_audit;
pub mod scheduler;
pub mod stats;
pub mod test_utils;

pub use config::{ConfigError, KernelConfig};
pub use pending::{DrainGrant, DrainReport, PendingQueue, PendingRequest};
pub use process_table::{ProcessEntry, ProcessTable, ProcessTableError};
pub use resource_audit::{
    ResourceAuditEntry, ResourceAuditLog, ResourceEvent, DEFAULT_AUDIT_CAPACITY,
};
pub use scheduler::{Master, RunOutcome, SchedulerError, StepOutcome};
pub use stats::{RunStats, RunSummary};
