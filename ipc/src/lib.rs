//! # Inter-Process Communication (IPC)
//!
//! This crate defines the message-passing primitives between the master
//! scheduler and its workers.
//!
//! ## Philosophy
//!
//! - **Messages, not shared memory**: workers never touch the ledger or the
//!   process table; every mutation is requested by message
//! - **Typed at the edges, fixed-shape on the wire**: code works with
//!   [`KernelMessage`], the transport carries [`MessageRecord`] frames
//! - **Malformed input is an error**: decoding validates flag domains and
//!   class counts instead of guessing
//!
//! ## Architecture
//!
//! A single [`Mailbox`] multiplexes all traffic. Every frame carries a
//! recipient tag (a pid); a receiver drains only the frames tagged with its
//! own pid. Requests, releases and termination notices are tagged with the
//! master's pid, acknowledgements with the worker's pid.

pub mod mailbox;
pub mod message;

pub use mailbox::{ChannelError, Mailbox};
pub use message::{KernelMessage, MessageError, MessageRecord};
