//! Kernel error types

use core_types::Pid;
use ipc::{ChannelError, MessageError};
use thiserror::Error;

/// Errors that can occur when interacting with the kernel
#[derive(Debug, Error)]
pub enum KernelError {
    /// Worker spawn failed
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    /// Mailbox has been destroyed
    #[error("Channel closed")]
    ChannelClosed,

    /// A frame on the mailbox could not be interpreted
    #[error("Malformed message: {0}")]
    Message(#[from] MessageError),

    /// No IPC object is registered under the key
    #[error("No {kind} registered under key {key:#018x}")]
    NamespaceMissing { kind: &'static str, key: u64 },

    /// An IPC object is already registered under the key
    #[error("A {kind} is already registered under key {key:#018x}")]
    NamespaceOccupied { kind: &'static str, key: u64 },

    /// The worker was told to stop while waiting
    #[error("Worker {0} stopped")]
    Stopped(Pid),

    /// The master answered with something other than an acknowledgement
    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

impl From<ChannelError> for KernelError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Closed => KernelError::ChannelClosed,
            ChannelError::Message(inner) => KernelError::Message(inner),
        }
    }
}
