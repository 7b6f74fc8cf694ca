//! IPC namespace with deterministic keys
//!
//! The master and its workers find the shared clock and the mailbox by key.
//! Keys are derived from a fixed seed string plus a small discriminant, so
//! both sides compute the same key without exchanging it.

use crate::{ClockReader, KernelError};
use ipc::Mailbox;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Seed string both sides derive their keys from
pub const IPC_SEED: &str = "oss.kernel";

/// Discriminant for the shared clock region
pub const CLOCK_DISCRIMINANT: u8 = 0;

/// Discriminant for the mailbox
pub const CHANNEL_DISCRIMINANT: u8 = 1;

/// Key naming an IPC object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpcKey(u64);

impl IpcKey {
    /// Derives a key from `seed` and `discriminant`
    ///
    /// SHA-256 over the seed bytes followed by the discriminant byte,
    /// truncated to the first eight bytes (big endian).
    pub fn derive(seed: &str, discriminant: u8) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        hasher.update([discriminant]);
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(prefix))
    }

    /// Key of the shared clock for the default seed
    pub fn clock() -> Self {
        Self::derive(IPC_SEED, CLOCK_DISCRIMINANT)
    }

    /// Key of the mailbox for the default seed
    pub fn channel() -> Self {
        Self::derive(IPC_SEED, CHANNEL_DISCRIMINANT)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for IpcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Registry of live IPC objects
///
/// The master registers the clock and creates the mailbox; workers attach by
/// key. Removing an entry makes later attaches fail, and removing a mailbox
/// also destroys it.
#[derive(Default)]
pub struct IpcNamespace {
    clocks: Mutex<HashMap<IpcKey, ClockReader>>,
    mailboxes: Mutex<HashMap<IpcKey, Arc<Mailbox>>>,
}

impl IpcNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a clock under `key`
    pub fn register_clock(&self, key: IpcKey, reader: ClockReader) -> Result<(), KernelError> {
        let mut clocks = self.clocks.lock();
        if clocks.contains_key(&key) {
            return Err(KernelError::NamespaceOccupied {
                kind: "clock",
                key: key.as_u64(),
            });
        }
        clocks.insert(key, reader);
        Ok(())
    }

    /// Creates a fresh mailbox under `key`
    pub fn create_mailbox(&self, key: IpcKey) -> Result<Arc<Mailbox>, KernelError> {
        let mut mailboxes = self.mailboxes.lock();
        if mailboxes.contains_key(&key) {
            return Err(KernelError::NamespaceOccupied {
                kind: "mailbox",
                key: key.as_u64(),
            });
        }
        let mailbox = Arc::new(Mailbox::new());
        mailboxes.insert(key, Arc::clone(&mailbox));
        Ok(mailbox)
    }

    /// Looks up the clock registered under `key`
    pub fn attach_clock(&self, key: IpcKey) -> Result<ClockReader, KernelError> {
        self.clocks
            .lock()
            .get(&key)
            .cloned()
            .ok_or(KernelError::NamespaceMissing {
                kind: "clock",
                key: key.as_u64(),
            })
    }

    /// Looks up the mailbox registered under `key`
    pub fn attach_mailbox(&self, key: IpcKey) -> Result<Arc<Mailbox>, KernelError> {
        self.mailboxes
            .lock()
            .get(&key)
            .cloned()
            .ok_or(KernelError::NamespaceMissing {
                kind: "mailbox",
                key: key.as_u64(),
            })
    }

    /// Unregisters the clock; returns whether one was registered
    pub fn remove_clock(&self, key: IpcKey) -> bool {
        self.clocks.lock().remove(&key).is_some()
    }

    /// Unregisters and destroys the mailbox; returns whether one was registered
    pub fn remove_mailbox(&self, key: IpcKey) -> bool {
        match self.mailboxes.lock().remove(&key) {
            Some(mailbox) => {
                mailbox.close();
                true
            }
            None => false,
        }
    }
}
