//! # Kernel API
//!
//! This crate defines the interface between the master scheduler and the
//! workers it supervises.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**, not policies:
//! - Simulated time (explicit, advanced only by the master)
//! - Worker creation through a spawner seam (not a hard-wired fork/exec)
//! - Named IPC objects resolved through derived keys
//!
//! ## Design Goals
//!
//! 1. **Testability**: spawning can be replaced by a recording fake
//! 2. **Single writer**: only the holder of a [`ClockWriter`] can move time
//! 3. **Type safety**: simulated time is distinct from wall-clock time

pub mod clock;
pub mod error;
pub mod kernel;
pub mod namespace;
pub mod time;

pub use clock::{ClockReader, ClockWriter};
pub use error::KernelError;
pub use kernel::{WorkerDescriptor, WorkerSpawner};
pub use namespace::{IpcKey, IpcNamespace, CHANNEL_DISCRIMINANT, CLOCK_DISCRIMINANT, IPC_SEED};
pub use time::{SimDuration, SimTime, NANOS_PER_SEC};
