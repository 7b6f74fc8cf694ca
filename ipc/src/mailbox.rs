//! Recipient-routed mailbox shared by the master and every worker.

use crate::{MessageError, MessageRecord};
use core_types::Pid;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Mailbox errors
///
/// "No message available" is not an error; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Mailbox has been destroyed")]
    Closed,

    #[error("Malformed frame: {0}")]
    Message(#[from] MessageError),
}

#[derive(Clone)]
struct Route {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl Route {
    fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }
}

/// Single mailbox multiplexing all master/worker traffic
///
/// Frames are routed by the record's recipient tag. A route is created the
/// first time either side touches a pid, so a frame sent before its reader
/// starts listening is kept until read. Delivery order is per-route FIFO;
/// nothing is guaranteed across routes.
pub struct Mailbox {
    routes: Mutex<HashMap<Pid, Route>>,
    closed: AtomicBool,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueues a record for its recipient
    pub fn send(&self, record: &MessageRecord) -> Result<(), ChannelError> {
        let frame = record.encode()?;
        let route = self.route(record.recipient())?;
        route.tx.send(frame).map_err(|_| ChannelError::Closed)
    }

    /// Non-blocking receive for `recipient`
    pub fn try_recv(&self, recipient: Pid) -> Result<Option<MessageRecord>, ChannelError> {
        let route = self.route(recipient)?;
        match route.rx.try_recv() {
            Ok(frame) => Ok(Some(MessageRecord::decode(&frame)?)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    /// Blocking receive for `recipient`, giving up after `timeout`
    ///
    /// Returns `Ok(None)` on timeout. A reader blocked here when the mailbox
    /// is destroyed wakes with [`ChannelError::Closed`].
    pub fn recv_timeout(
        &self,
        recipient: Pid,
        timeout: Duration,
    ) -> Result<Option<MessageRecord>, ChannelError> {
        let rx = self.route(recipient)?.rx;
        match rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(MessageRecord::decode(&frame)?)),
            Err(RecvTimeoutError::Timeout) => {
                if self.is_closed() {
                    Err(ChannelError::Closed)
                } else {
                    Ok(None)
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    /// Number of frames waiting for `recipient`
    pub fn pending(&self, recipient: Pid) -> usize {
        self.routes
            .lock()
            .get(&recipient)
            .map(|route| route.rx.len())
            .unwrap_or(0)
    }

    /// Drops the route for a departed reader
    ///
    /// Frames still queued for `pid` are discarded. A later send to `pid`
    /// opens a fresh, empty route.
    pub fn remove_route(&self, pid: Pid) {
        self.routes.lock().remove(&pid);
    }

    /// Number of routes currently open
    pub fn route_count(&self) -> usize {
        self.routes.lock().len()
    }

    /// Destroys the mailbox
    ///
    /// Queued frames are discarded and every later operation fails with
    /// [`ChannelError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.routes.lock().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn route(&self, pid: Pid) -> Result<Route, ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        let mut routes = self.routes.lock();
        Ok(routes.entry(pid).or_insert_with(Route::new).clone())
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
