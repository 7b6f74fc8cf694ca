//! Test utilities for scheduler and resilience testing
//!
//! This module provides helpers for driving a [`Master`] deterministically:
//! a spawner that only records what it was asked to do, a scripted worker that
//! speaks the wire protocol from the test thread, and a builder for a master
//! that logs nowhere.

use crate::config::KernelConfig;
use crate::scheduler::Master;
use core_types::Pid;
use ipc::{KernelMessage, Mailbox};
use kernel_api::{IpcNamespace, KernelError, WorkerDescriptor, WorkerSpawner};
use resources::ResourceVector;
use services_logger::KernelLog;
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT_LOGGING: Once = Once::new();

/// Installs a test-writer tracing subscriber once per process
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// Spawner that starts nothing
///
/// Hands out increasing pids and records every spawn and kill. Tests mark
/// workers as exited with [`RecordingSpawner::exit`]; the next reap reports
/// them.
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    next_pid: u32,
    pub spawned: Vec<(Pid, WorkerDescriptor)>,
    pub killed: Vec<Pid>,
    pub kill_all_called: bool,
    /// Fail the next spawn with `SpawnFailed`
    pub fail_next_spawn: bool,
    exits: Vec<Pid>,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self {
            next_pid: Pid::MASTER.as_u32() + 1,
            ..Self::default()
        }
    }

    /// Marks `pid` as exited; the next reap reports it
    pub fn exit(&mut self, pid: Pid) {
        self.exits.push(pid);
    }

    /// Pids spawned so far, in order
    pub fn spawned_pids(&self) -> Vec<Pid> {
        self.spawned.iter().map(|(pid, _)| *pid).collect()
    }
}

impl WorkerSpawner for RecordingSpawner {
    fn spawn(&mut self, descriptor: WorkerDescriptor) -> Result<Pid, KernelError> {
        if std::mem::take(&mut self.fail_next_spawn) {
            return Err(KernelError::SpawnFailed("scripted failure".to_string()));
        }
        let pid = Pid::new(self.next_pid.max(Pid::MASTER.as_u32() + 1));
        self.next_pid = pid.as_u32() + 1;
        self.spawned.push((pid, descriptor));
        Ok(pid)
    }

    fn kill(&mut self, pid: Pid) {
        self.killed.push(pid);
    }

    fn reap(&mut self) -> Vec<Pid> {
        std::mem::take(&mut self.exits)
    }

    fn kill_all(&mut self) {
        self.kill_all_called = true;
    }
}

/// Builds a master with a recording spawner and a silent log
pub fn quiet_master(config: KernelConfig, namespace: Arc<IpcNamespace>) -> Master<RecordingSpawner> {
    init_test_logging();
    match Master::with_log(
        config,
        namespace,
        RecordingSpawner::new(),
        KernelLog::with_console(std::io::sink()),
    ) {
        Ok(master) => master,
        Err(err) => panic!("failed to build test master: {err}"),
    }
}

/// Worker played by the test thread
///
/// Sends protocol messages to the master and reads acknowledgements from the
/// worker's own route.
pub struct ScriptedWorker {
    pid: Pid,
    mailbox: Arc<Mailbox>,
    classes: usize,
}

impl ScriptedWorker {
    pub fn new(pid: Pid, mailbox: Arc<Mailbox>, classes: usize) -> Self {
        Self {
            pid,
            mailbox,
            classes,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn request(&self, amounts: impl Into<ResourceVector>) -> Result<(), KernelError> {
        self.send(KernelMessage::Request {
            sender: self.pid,
            amounts: amounts.into(),
        })
    }

    pub fn release(&self, amounts: impl Into<ResourceVector>, mass: bool) -> Result<(), KernelError> {
        self.send(KernelMessage::Release {
            sender: self.pid,
            amounts: amounts.into(),
            mass,
        })
    }

    pub fn terminate(&self) -> Result<(), KernelError> {
        self.send(KernelMessage::Terminating { sender: self.pid })
    }

    /// Takes one acknowledgement if the master has sent it
    pub fn try_ack(&self) -> Result<Option<KernelMessage>, KernelError> {
        match self.mailbox.try_recv(self.pid)? {
            Some(record) => Ok(Some(record.into_ack(self.classes)?)),
            None => Ok(None),
        }
    }

    /// Waits up to `timeout` for an acknowledgement
    pub fn wait_ack(&self, timeout: Duration) -> Result<Option<KernelMessage>, KernelError> {
        match self.mailbox.recv_timeout(self.pid, timeout)? {
            Some(record) => Ok(Some(record.into_ack(self.classes)?)),
            None => Ok(None),
        }
    }

    fn send(&self, message: KernelMessage) -> Result<(), KernelError> {
        self.mailbox
            .send(&message.to_record(Pid::MASTER, self.classes))?;
        Ok(())
    }
}
