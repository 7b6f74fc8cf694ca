//! # Worker Service
//!
//! This crate implements the worker side of the simulated kernel.
//!
//! ## Philosophy
//!
//! - **Workers own only their view**: a worker's holdings are private state
//!   that mirror its ledger row; they change only after the master
//!   acknowledges a request or release.
//! - **Ordered acquisition**: requests always name classes above everything
//!   the worker holds. Asking for a lower class means giving back the higher
//!   ones first and asking for everything again in one message.
//! - **Stoppable**: a worker blocked on the master wakes regularly to check
//!   its stop flag, so the master can always tear it down.
//!
//! ## Pieces
//!
//! - [`AcquisitionPolicy`]: randomized decisions plus the ordering rule
//! - [`ResourceClient`] / [`MailboxClient`]: blocking request/release exchanges
//! - [`WorkerTask`]: the clock-driven worker loop
//! - [`ThreadSpawner`]: the [`kernel_api::WorkerSpawner`] that runs workers on
//!   OS threads

pub mod client;
pub mod policy;
pub mod spawner;
pub mod task;

pub use client::{MailboxClient, ResourceClient};
pub use policy::{AcquisitionPolicy, Action, REQUEST_PROBABILITY};
pub use spawner::{ThreadSpawner, WorkerSettings};
pub use task::{WorkerExit, WorkerStatus, WorkerTask};
