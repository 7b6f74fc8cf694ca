//! Worker side of the request/release protocol

use core_types::Pid;
use ipc::{KernelMessage, Mailbox};
use kernel_api::KernelError;
use resources::ResourceVector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a worker talks to the master
///
/// `request` and `release` return only once the master has acknowledged
/// them. `terminate` does not wait; the master never acknowledges it.
pub trait ResourceClient {
    fn request(&mut self, amounts: &ResourceVector) -> Result<(), KernelError>;

    fn release(&mut self, amounts: &ResourceVector, mass: bool) -> Result<(), KernelError>;

    fn terminate(&mut self) -> Result<(), KernelError>;
}

/// [`ResourceClient`] over the shared mailbox
///
/// While waiting for an acknowledgement the client wakes every `poll`
/// interval to check its stop flag, so a killed worker never stays blocked.
pub struct MailboxClient {
    pid: Pid,
    master: Pid,
    mailbox: Arc<Mailbox>,
    classes: usize,
    stop: Arc<AtomicBool>,
    poll: Duration,
}

impl MailboxClient {
    pub fn new(
        pid: Pid,
        master: Pid,
        mailbox: Arc<Mailbox>,
        classes: usize,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            pid,
            master,
            mailbox,
            classes,
            stop,
            poll: Duration::from_millis(10),
        }
    }

    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    fn send(&self, message: KernelMessage) -> Result<(), KernelError> {
        self.mailbox
            .send(&message.to_record(self.master, self.classes))?;
        Ok(())
    }

    fn wait_ack(&self) -> Result<(), KernelError> {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return Err(KernelError::Stopped(self.pid));
            }
            let Some(record) = self.mailbox.recv_timeout(self.pid, self.poll)? else {
                continue;
            };
            return match record.into_ack(self.classes)? {
                KernelMessage::Ack {
                    process_running: true,
                    ..
                } => Ok(()),
                other => Err(KernelError::UnexpectedReply(other.to_string())),
            };
        }
    }
}

impl ResourceClient for MailboxClient {
    fn request(&mut self, amounts: &ResourceVector) -> Result<(), KernelError> {
        self.send(KernelMessage::Request {
            sender: self.pid,
            amounts: amounts.clone(),
        })?;
        self.wait_ack()
    }

    fn release(&mut self, amounts: &ResourceVector, mass: bool) -> Result<(), KernelError> {
        self.send(KernelMessage::Release {
            sender: self.pid,
            amounts: amounts.clone(),
            mass,
        })?;
        self.wait_ack()
    }

    fn terminate(&mut self) -> Result<(), KernelError> {
        self.send(KernelMessage::Terminating { sender: self.pid })
    }
}
