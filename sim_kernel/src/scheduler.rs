//! Master scheduler loop
//!
//! ## Philosophy
//!
//! - **Single writer**: the master alone advances the clock and mutates the
//!   process table and the resource ledger. Workers only see snapshots of the
//!   clock and talk through the mailbox.
//! - **One message per tick**: every iteration advances the clock, considers
//!   one admission, drains the pending queue, and handles at most one inbound
//!   message. A tick without a message still makes progress.
//! - **Invariant violations are fatal**: a release beyond holdings, a
//!   malformed frame, or a broken conservation check ends the run with an
//!   error. Bookkeeping exhaustion on admission only costs the new worker.
//!
//! ## Tick order
//!
//! 1. advance the clock by the quantum
//! 2. admit one worker if every admission condition holds
//! 3. drain the pending queue
//! 4. handle one inbound message, if any
//! 5. reclaim workers that exited without notice
//! 6. dump the process table and allocation matrix when the report interval
//!    has elapsed

use crate::config::{ConfigError, KernelConfig};
use crate::pending::{PendingQueue, PendingRequest};
use crate::process_table::{ProcessTable, ProcessTableError};
use crate::report::{allocation_matrix_report, process_table_report};
use crate::resource_audit::{ResourceAuditLog, ResourceEvent};
use crate::stats::{RunStats, RunSummary};
use core_types::{Pid, SlotIndex};
use ipc::{ChannelError, KernelMessage, Mailbox, MessageError};
use kernel_api::{
    ClockWriter, IpcKey, IpcNamespace, KernelError, SimDuration, SimTime, WorkerDescriptor,
    WorkerSpawner,
};
use resources::{ResourceError, ResourceLedger, ResourceVector};
use services_logger::{KernelLog, LogEntry};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use thiserror::Error;

/// Errors that end a run
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("Ledger invariant violated: {0}")]
    Ledger(#[from] ResourceError),

    #[error("Process table error: {0}")]
    ProcessTable(#[from] ProcessTableError),

    #[error("Unexpected payload: {0}")]
    Message(#[from] MessageError),

    #[error("Could not open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ChannelError> for SchedulerError {
    fn from(err: ChannelError) -> Self {
        SchedulerError::Kernel(err.into())
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Workers remain to launch or are still running
    Running,
    /// Every worker was launched and has left
    Finished,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Normal completion, with the ending report
    Completed(RunSummary),
    /// The interrupt flag was raised
    Interrupted,
    /// The run alarm fired
    AlarmExpired,
}

/// The master scheduler
///
/// Owns the clock writer, the process table, the ledger, and the pending
/// queue. Creating a master registers the clock and creates the mailbox in
/// the namespace; [`Master::shutdown`] (also run on drop) removes both and
/// stops every remaining worker.
pub struct Master<S: WorkerSpawner> {
    config: KernelConfig,
    namespace: Arc<IpcNamespace>,
    clock_key: IpcKey,
    channel_key: IpcKey,
    clock: ClockWriter,
    mailbox: Arc<Mailbox>,
    spawner: S,
    table: ProcessTable,
    ledger: ResourceLedger,
    pending: PendingQueue,
    stats: RunStats,
    audit: ResourceAuditLog,
    log: KernelLog,
    launched: usize,
    running: usize,
    next_launch: SimTime,
    next_report: SimTime,
    grants_since_matrix: u32,
    /// Reaped workers whose slot has not been freed yet
    exited: Vec<Pid>,
    started: Instant,
    shut_down: bool,
}

impl<S: WorkerSpawner> Master<S> {
    /// Creates a master logging to stdout and, if configured, to a file
    pub fn new(
        config: KernelConfig,
        namespace: Arc<IpcNamespace>,
        spawner: S,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let mut log = KernelLog::stdout().with_max_lines(config.max_log_lines);
        if let Some(path) = &config.log_path {
            log.attach_file(path).map_err(|source| SchedulerError::LogFile {
                path: path.clone(),
                source,
            })?;
        }
        Self::with_log(config, namespace, spawner, log)
    }

    /// Creates a master writing to the given log sink
    pub fn with_log(
        config: KernelConfig,
        namespace: Arc<IpcNamespace>,
        spawner: S,
        log: KernelLog,
    ) -> Result<Self, SchedulerError> {
        config.validate()?;
        let clock_key = IpcKey::clock();
        let channel_key = IpcKey::channel();

        let clock = ClockWriter::new();
        namespace.register_clock(clock_key, clock.reader())?;
        let mailbox = match namespace.create_mailbox(channel_key) {
            Ok(mailbox) => mailbox,
            Err(err) => {
                namespace.remove_clock(clock_key);
                return Err(err.into());
            }
        };

        let ledger = ResourceLedger::new(config.resource_totals.clone(), config.table_capacity);
        let table = ProcessTable::new(config.table_capacity);
        let next_report = SimTime::ZERO + config.report_interval;
        let audit = ResourceAuditLog::with_capacity(config.audit_capacity);

        Ok(Self {
            config,
            namespace,
            clock_key,
            channel_key,
            clock,
            mailbox,
            spawner,
            table,
            ledger,
            pending: PendingQueue::new(),
            stats: RunStats::new(),
            audit,
            log,
            launched: 0,
            running: 0,
            next_launch: SimTime::ZERO,
            next_report,
            grants_since_matrix: 0,
            exited: Vec::new(),
            started: Instant::now(),
            shut_down: false,
        })
    }

    /// Logs the startup banner with the run parameters
    pub fn announce(&mut self) {
        let banner = format!(
            "OSS starting, PID:{}\nCalled With:\n-n: {}\n-s: {}\n-t: {}\n-i: {}",
            Pid::MASTER,
            self.config.total_workers,
            self.config.max_simultaneous,
            format_secs(self.config.worker_budget),
            format_secs(self.config.launch_interval),
        );
        self.log.emit(&LogEntry::info(banner));
    }

    /// Runs one tick of the loop
    pub fn step(&mut self) -> Result<StepOutcome, SchedulerError> {
        let now = self.clock.tick(self.config.tick_quantum);

        if self.admission_open(now) {
            self.admit(now)?;
        }

        if !self.pending.is_empty() {
            self.drain_pending(now)?;
        }

        if let Some(record) = self.mailbox.try_recv(Pid::MASTER)? {
            let message = record.into_inbound(self.ledger.classes())?;
            self.handle(message, now)?;
        }

        self.reap_exited(now)?;
        self.periodic_report(now);

        Ok(if self.is_finished() {
            StepOutcome::Finished
        } else {
            StepOutcome::Running
        })
    }

    /// Steps until completion, interruption, or the run alarm
    ///
    /// On completion the ending report is logged. The caller still owns
    /// cleanup through [`Master::shutdown`].
    pub fn run(&mut self, interrupt: &AtomicBool) -> Result<RunOutcome, SchedulerError> {
        loop {
            if interrupt.load(Ordering::SeqCst) {
                tracing::warn!(now = %self.clock.now(), "interrupted; tearing down");
                return Ok(RunOutcome::Interrupted);
            }
            if self.wall_elapsed() >= self.config.run_alarm {
                tracing::warn!(alarm = ?self.config.run_alarm, "run alarm expired; tearing down");
                return Ok(RunOutcome::AlarmExpired);
            }
            if self.step()? == StepOutcome::Finished {
                let summary = self.stats.summary();
                self.log.emit(&LogEntry::info(summary.to_string()));
                return Ok(RunOutcome::Completed(summary));
            }
            thread::yield_now();
        }
    }

    /// Removes the IPC objects and stops every remaining worker
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.namespace.remove_clock(self.clock_key);
        self.namespace.remove_mailbox(self.channel_key);
        self.spawner.kill_all();
        self.log.flush();
        tracing::debug!(
            launched = self.launched,
            running = self.running,
            "master shut down"
        );
    }

    fn admission_open(&self, now: SimTime) -> bool {
        self.launched < self.config.total_workers
            && self.running < self.config.max_simultaneous
            && self.running < self.table.capacity()
            && now >= self.next_launch
            && self.wall_elapsed() < self.config.admission_wall_limit
    }

    fn admit(&mut self, now: SimTime) -> Result<(), SchedulerError> {
        let descriptor = WorkerDescriptor::new(Pid::MASTER, self.config.worker_budget);
        let pid = self.spawner.spawn(descriptor)?;

        match self.table.find_empty() {
            Some(slot) => {
                self.table.bind(slot, pid, now)?;
                self.launched += 1;
                self.running += 1;
                self.stats.admissions += 1;
                self.audit
                    .record_event(now, ResourceEvent::Admitted { pid, slot });
                tracing::debug!(%pid, %slot, %now, "worker admitted");
            }
            None => {
                self.spawner.kill(pid);
                self.stats.admission_kills += 1;
                self.audit
                    .record_event(now, ResourceEvent::AdmissionKilled { pid });
                tracing::warn!(%pid, "no free process-table slot; worker killed");
                self.log.emit(
                    &LogEntry::warn("OSS: no free process-table slot, killing worker")
                        .with_source(pid)
                        .with_field("pid", pid),
                );
            }
        }

        self.next_launch = now + self.config.launch_interval;
        self.log
            .emit(&LogEntry::info(process_table_report(&self.table)));
        Ok(())
    }

    fn drain_pending(&mut self, now: SimTime) -> Result<(), SchedulerError> {
        let report = self.pending.drain(&self.table, &mut self.ledger)?;

        for stale in report.discarded {
            tracing::debug!(pid = %stale.pid, "discarding queued request of departed worker");
            self.audit.record_event(
                now,
                ResourceEvent::StaleRequestDiscarded {
                    pid: stale.pid,
                    amounts: stale.amounts,
                },
            );
        }

        for grant in report.granted {
            let pid = grant.request.pid;
            self.stats.queued_grants += 1;
            self.log.emit(
                &LogEntry::info(format!(
                    "OSS: Allocated queued resources to worker {} {} at time {}\nOSS: available resources: {}",
                    pid,
                    grant.request.amounts.delta_display(),
                    now,
                    self.ledger.available()
                ))
                .with_source(pid),
            );
            self.audit.record_event(
                now,
                ResourceEvent::Granted {
                    pid,
                    slot: grant.slot,
                    amounts: grant.request.amounts,
                    queued: true,
                    available: self.ledger.available().clone(),
                },
            );
            self.send_ack(pid)?;
        }

        self.ledger.check_conservation()?;
        Ok(())
    }

    fn handle(&mut self, message: KernelMessage, now: SimTime) -> Result<(), SchedulerError> {
        match message {
            KernelMessage::Request { sender, amounts } => {
                self.handle_request(sender, amounts, now)?
            }
            KernelMessage::Release {
                sender,
                amounts,
                mass,
            } => self.handle_release(sender, amounts, mass, now)?,
            KernelMessage::Terminating { sender } => self.handle_terminating(sender, now)?,
            KernelMessage::Ack { sender, .. } => {
                return Err(MessageError::UnexpectedPayload {
                    sender,
                    reason: "acknowledgement addressed to the master",
                }
                .into());
            }
        }
        self.ledger.check_conservation()?;
        Ok(())
    }

    fn handle_request(
        &mut self,
        sender: Pid,
        amounts: ResourceVector,
        now: SimTime,
    ) -> Result<(), SchedulerError> {
        self.stats.record_request(&amounts);
        let Some(slot) = self.table.find_by_id(sender) else {
            self.drop_message(sender, "request", now);
            return Ok(());
        };

        if self.ledger.try_allocate(slot, &amounts)? {
            self.stats.immediate_grants += 1;
            self.log.emit(
                &LogEntry::info(format!(
                    "OSS: Resources allocated to worker {} {} at time {}\nOSS: available resources: {}",
                    sender,
                    amounts.delta_display(),
                    now,
                    self.ledger.available()
                ))
                .with_source(sender),
            );
            self.audit.record_event(
                now,
                ResourceEvent::Granted {
                    pid: sender,
                    slot,
                    amounts,
                    queued: false,
                    available: self.ledger.available().clone(),
                },
            );
            self.grants_since_matrix += 1;
            if self.config.verbose && self.grants_since_matrix >= 20 {
                self.log
                    .emit(&LogEntry::info(allocation_matrix_report(&self.ledger)));
                self.grants_since_matrix = 0;
            }
            self.send_ack(sender)?;
        } else {
            self.stats.queued_requests += 1;
            self.log.emit_to(
                &LogEntry::info(format!(
                    "OSS: Resources not available for worker {}, request queued at time {}",
                    sender, now
                ))
                .with_source(sender),
                self.config.verbose,
            );
            self.audit.record_event(
                now,
                ResourceEvent::Queued {
                    pid: sender,
                    amounts: amounts.clone(),
                },
            );
            self.pending.push(PendingRequest {
                pid: sender,
                amounts,
                queued_at: now,
            });
        }
        Ok(())
    }

    fn handle_release(
        &mut self,
        sender: Pid,
        amounts: ResourceVector,
        mass: bool,
        now: SimTime,
    ) -> Result<(), SchedulerError> {
        self.stats.record_release(mass);
        let Some(slot) = self.table.find_by_id(sender) else {
            self.drop_message(sender, "release", now);
            return Ok(());
        };

        self.ledger.release(slot, &amounts)?;
        self.log.emit_to(
            &LogEntry::info(format!(
                "OSS: Resources {}released by worker {} {} at time {}\nOSS: available resources: {}",
                if mass { "mass " } else { "" },
                sender,
                amounts.delta_display(),
                now,
                self.ledger.available()
            ))
            .with_source(sender),
            self.config.verbose,
        );
        self.audit.record_event(
            now,
            ResourceEvent::Released {
                pid: sender,
                slot,
                amounts,
                mass,
                available: self.ledger.available().clone(),
            },
        );
        self.send_ack(sender)
    }

    fn handle_terminating(&mut self, sender: Pid, now: SimTime) -> Result<(), SchedulerError> {
        self.log.emit(
            &LogEntry::info(format!(
                "OSS: Worker {} indicates it is terminating at time {}",
                sender, now
            ))
            .with_source(sender),
        );
        match self.table.find_by_id(sender) {
            Some(slot) => {
                self.stats.terminations += 1;
                self.free_slot(sender, slot, now)
            }
            None => {
                self.drop_message(sender, "terminating", now);
                Ok(())
            }
        }
    }

    /// Reclaims a worker's row, frees its slot, and drops its mailbox route
    fn free_slot(&mut self, pid: Pid, slot: SlotIndex, now: SimTime) -> Result<(), SchedulerError> {
        let reclaimed = self.ledger.reclaim(slot)?;
        self.table.remove(pid);
        self.mailbox.remove_route(pid);
        self.running = self.running.saturating_sub(1);
        let held = if reclaimed.is_zero() {
            format!("OSS: Worker {} held no resources", pid)
        } else {
            format!("OSS: Reclaimed {} from worker {}", reclaimed.delta_display(), pid)
        };
        self.log.emit(
            &LogEntry::info(format!(
                "{}\nOSS: available resources: {}",
                held,
                self.ledger.available()
            ))
            .with_source(pid),
        );
        self.audit.record_event(
            now,
            ResourceEvent::Reclaimed {
                pid,
                slot,
                amounts: reclaimed,
                available: self.ledger.available().clone(),
            },
        );
        Ok(())
    }

    /// Frees the slots of workers that exited without a termination notice
    ///
    /// A worker that sent its notice before exiting is left alone while any
    /// message for the master is still queued, so the notice is handled
    /// first.
    fn reap_exited(&mut self, now: SimTime) -> Result<(), SchedulerError> {
        self.exited.extend(self.spawner.reap());
        if self.exited.is_empty() {
            return Ok(());
        }
        let table = &self.table;
        self.exited.retain(|pid| table.find_by_id(*pid).is_some());
        if self.mailbox.pending(Pid::MASTER) > 0 {
            return Ok(());
        }

        for pid in std::mem::take(&mut self.exited) {
            if let Some(slot) = self.table.find_by_id(pid) {
                tracing::warn!(%pid, "worker exited without a termination notice");
                self.stats.abnormal_exits += 1;
                self.free_slot(pid, slot, now)?;
            }
        }
        self.ledger.check_conservation()?;
        Ok(())
    }

    fn periodic_report(&mut self, now: SimTime) {
        while now >= self.next_report {
            self.log
                .emit(&LogEntry::info(process_table_report(&self.table)));
            self.log
                .emit(&LogEntry::info(allocation_matrix_report(&self.ledger)));
            self.next_report = self.next_report + self.config.report_interval;
        }
    }

    fn drop_message(&mut self, pid: Pid, kind: &str, now: SimTime) {
        tracing::warn!(%pid, kind, "message from pid without a process-table slot dropped");
        self.stats.dropped_messages += 1;
        self.audit.record_event(
            now,
            ResourceEvent::MessageDropped {
                pid,
                kind: kind.to_string(),
            },
        );
    }

    fn send_ack(&self, worker: Pid) -> Result<(), SchedulerError> {
        let ack = KernelMessage::Ack {
            sender: Pid::MASTER,
            process_running: true,
        };
        self.mailbox
            .send(&ack.to_record(worker, self.ledger.classes()))?;
        Ok(())
    }

    /// Whether every worker was launched and none is running
    pub fn is_finished(&self) -> bool {
        self.launched >= self.config.total_workers && self.running == 0
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Current simulated time
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn process_table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn audit(&self) -> &ResourceAuditLog {
        &self.audit
    }

    pub fn log(&self) -> &KernelLog {
        &self.log
    }

    /// Workers admitted so far
    pub fn launched(&self) -> usize {
        self.launched
    }

    /// Workers admitted and not yet departed
    pub fn running(&self) -> usize {
        self.running
    }

    pub fn mailbox(&self) -> Arc<Mailbox> {
        Arc::clone(&self.mailbox)
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn spawner_mut(&mut self) -> &mut S {
        &mut self.spawner
    }

    /// Real time elapsed since the master was created
    pub fn wall_elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}

impl<S: WorkerSpawner> Drop for Master<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Formats a duration as decimal seconds without trailing zeros
fn format_secs(duration: SimDuration) -> String {
    let text = format!("{}.{:09}", duration.as_secs(), duration.subsec_nanos());
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
