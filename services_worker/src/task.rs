//! Worker task loop

use crate::client::ResourceClient;
use crate::policy::{AcquisitionPolicy, Action};
use core_types::Pid;
use kernel_api::{ClockReader, KernelError, SimDuration, SimTime};
use resources::ResourceVector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Result of one [`WorkerTask::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    /// The termination notice was sent
    Terminated,
}

/// Counters reported when a worker finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub pid: Pid,
    pub requests: u64,
    pub releases: u64,
    pub mass_releases: u64,
    /// Holdings at exit; the master reclaims them
    pub held: ResourceVector,
}

/// A worker: decides, talks to the master, and leaves at its target time
pub struct WorkerTask<C: ResourceClient> {
    pid: Pid,
    clock: ClockReader,
    client: C,
    policy: AcquisitionPolicy,
    target: SimTime,
    next_decision: SimTime,
    decision_bound: SimDuration,
    stop: Arc<AtomicBool>,
    idle_poll: Duration,
    requests: u64,
    releases: u64,
    mass_releases: u64,
}

impl<C: ResourceClient> WorkerTask<C> {
    /// Creates a worker whose lifetime starts at the current clock reading
    pub fn new(
        pid: Pid,
        lifetime: SimDuration,
        clock: ClockReader,
        client: C,
        mut policy: AcquisitionPolicy,
        decision_bound: SimDuration,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let start = clock.now();
        let target = start + lifetime;
        let next_decision =
            start + SimDuration::from_nanos(policy.next_delay(decision_bound.as_nanos()));
        tracing::debug!(%pid, %start, %target, "worker starting");
        Self {
            pid,
            clock,
            client,
            policy,
            target,
            next_decision,
            decision_bound,
            stop,
            idle_poll: Duration::from_micros(100),
            requests: 0,
            releases: 0,
            mass_releases: 0,
        }
    }

    /// Sets how long the worker sleeps between clock checks
    pub fn with_idle_poll(mut self, poll: Duration) -> Self {
        self.idle_poll = poll;
        self
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Simulated time at which the worker leaves
    pub fn target(&self) -> SimTime {
        self.target
    }

    pub fn policy(&self) -> &AcquisitionPolicy {
        &self.policy
    }

    /// Checks the clock once and acts on it
    ///
    /// Termination takes priority over a decision due at the same time.
    pub fn step(&mut self) -> Result<WorkerStatus, KernelError> {
        let now = self.clock.now();
        if now >= self.target {
            tracing::debug!(pid = %self.pid, %now, held = %self.policy.held(), "worker terminating");
            self.client.terminate()?;
            return Ok(WorkerStatus::Terminated);
        }

        if now >= self.next_decision {
            if let Some(action) = self.policy.next_action() {
                self.perform(&action)?;
                self.policy.commit(&action);
            }
            let delay = self.policy.next_delay(self.decision_bound.as_nanos());
            self.next_decision = now + SimDuration::from_nanos(delay);
        }
        Ok(WorkerStatus::Running)
    }

    /// Steps until the worker terminates or is stopped
    pub fn run(mut self) -> Result<WorkerExit, KernelError> {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return Err(KernelError::Stopped(self.pid));
            }
            if self.step()? == WorkerStatus::Terminated {
                return Ok(self.exit_report());
            }
            thread::sleep(self.idle_poll);
        }
    }

    fn perform(&mut self, action: &Action) -> Result<(), KernelError> {
        match action {
            Action::Request { amounts } => {
                self.requests += 1;
                self.client.request(amounts)
            }
            Action::Reacquire { released, request } => {
                self.mass_releases += 1;
                self.client.release(released, true)?;
                self.requests += 1;
                self.client.request(request)
            }
            Action::Release { amounts } => {
                self.releases += 1;
                self.client.release(amounts, false)
            }
        }
    }

    fn exit_report(&self) -> WorkerExit {
        WorkerExit {
            pid: self.pid,
            requests: self.requests,
            releases: self.releases,
            mass_releases: self.mass_releases,
            held: self.policy.held().clone(),
        }
    }
}
