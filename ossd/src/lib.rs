//! # OSS Host Runtime
//!
//! This crate provides the host binary for the simulated kernel.
//!
//! ## Philosophy
//!
//! - **Host owns the process**: flags, signals, and exit codes live here;
//!   the kernel crates never exit or print on their own
//! - **One cleanup path**: completion, interruption, the run alarm, and
//!   fatal errors all pass through [`HostRuntime::run`], which tears down
//!   the clock, the mailbox, and every worker before returning
//! - **Workers are threads**: the host wires a
//!   [`services_worker::ThreadSpawner`] into the master
//!
//! ## Non-Responsibilities
//!
//! The host does NOT:
//! - Make scheduling or allocation decisions
//! - Touch the ledger or the process table
//! - Retry a failed run

pub mod cli;
pub mod runtime;

pub use cli::{CliArgs, CliError, USAGE};
pub use runtime::{
    init_tracing, HostExit, HostRuntime, HostRuntimeConfig, HostRuntimeError, TEARDOWN_NOTICE,
};
