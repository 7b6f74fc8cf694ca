//! Thread-backed worker spawner

use crate::client::MailboxClient;
use crate::policy::AcquisitionPolicy;
use crate::task::{WorkerExit, WorkerTask};
use core_types::Pid;
use kernel_api::{IpcNamespace, KernelError, SimDuration, WorkerDescriptor, WorkerSpawner};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Settings shared by every worker a spawner starts
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub classes: usize,
    /// Most instances of one class a worker will hold
    pub per_class_ceiling: u32,
    /// Upper bound of the wait between decisions
    pub decision_bound: SimDuration,
    /// Sleep between clock checks
    pub idle_poll: Duration,
    /// Wake-up interval while blocked on an acknowledgement
    pub ack_poll: Duration,
    /// Base seed; each worker mixes in its pid. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl WorkerSettings {
    pub fn new(classes: usize, per_class_ceiling: u32, decision_bound: SimDuration) -> Self {
        Self {
            classes,
            per_class_ceiling,
            decision_bound,
            idle_poll: Duration::from_micros(100),
            ack_poll: Duration::from_millis(10),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_idle_poll(mut self, poll: Duration) -> Self {
        self.idle_poll = poll;
        self
    }

    fn rng_for(&self, pid: Pid) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ u64::from(pid.as_u32())),
            None => StdRng::from_entropy(),
        }
    }
}

struct WorkerHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<Result<WorkerExit, KernelError>>,
}

/// Runs each worker on its own OS thread
///
/// A worker attaches to the clock and mailbox through the namespace using
/// the keys in its descriptor, and reads its lifetime from the descriptor's
/// positional arguments. Killing a worker raises its stop flag and joins it.
pub struct ThreadSpawner {
    namespace: Arc<IpcNamespace>,
    settings: WorkerSettings,
    next_pid: u32,
    workers: HashMap<Pid, WorkerHandle>,
}

impl ThreadSpawner {
    pub fn new(namespace: Arc<IpcNamespace>, settings: WorkerSettings) -> Self {
        Self {
            namespace,
            settings,
            next_pid: Pid::MASTER.as_u32() + 1,
            workers: HashMap::new(),
        }
    }

    /// Workers started and not yet reaped
    pub fn live(&self) -> usize {
        self.workers.len()
    }

    fn join(pid: Pid, handle: WorkerHandle) {
        match handle.join.join() {
            Ok(Ok(exit)) => tracing::debug!(
                %pid,
                requests = exit.requests,
                releases = exit.releases,
                mass_releases = exit.mass_releases,
                "worker finished"
            ),
            Ok(Err(KernelError::Stopped(_))) => tracing::debug!(%pid, "worker stopped"),
            Ok(Err(err)) => tracing::warn!(%pid, error = %err, "worker failed"),
            Err(_) => tracing::error!(%pid, "worker panicked"),
        }
    }
}

impl WorkerSpawner for ThreadSpawner {
    fn spawn(&mut self, descriptor: WorkerDescriptor) -> Result<Pid, KernelError> {
        let pid = Pid::new(self.next_pid);
        self.next_pid += 1;

        let stop = Arc::new(AtomicBool::new(false));
        let namespace = Arc::clone(&self.namespace);
        let settings = self.settings.clone();
        let worker_stop = Arc::clone(&stop);
        let args = descriptor.args();

        let join = thread::Builder::new()
            .name(format!("worker-{pid}"))
            .spawn(move || worker_main(pid, descriptor, args, namespace, settings, worker_stop))
            .map_err(|err| KernelError::SpawnFailed(err.to_string()))?;

        self.workers.insert(pid, WorkerHandle { stop, join });
        Ok(pid)
    }

    fn kill(&mut self, pid: Pid) {
        if let Some(handle) = self.workers.remove(&pid) {
            handle.stop.store(true, Ordering::Release);
            Self::join(pid, handle);
        }
    }

    fn reap(&mut self) -> Vec<Pid> {
        let finished: Vec<Pid> = self
            .workers
            .iter()
            .filter(|(_, handle)| handle.join.is_finished())
            .map(|(pid, _)| *pid)
            .collect();
        for pid in &finished {
            if let Some(handle) = self.workers.remove(pid) {
                Self::join(*pid, handle);
            }
        }
        finished
    }

    fn kill_all(&mut self) {
        for handle in self.workers.values() {
            handle.stop.store(true, Ordering::Release);
        }
        for (pid, handle) in self.workers.drain() {
            Self::join(pid, handle);
        }
    }
}

impl Drop for ThreadSpawner {
    fn drop(&mut self) {
        self.kill_all();
    }
}

/// Worker entry point
fn worker_main(
    pid: Pid,
    descriptor: WorkerDescriptor,
    args: [String; 2],
    namespace: Arc<IpcNamespace>,
    settings: WorkerSettings,
    stop: Arc<AtomicBool>,
) -> Result<WorkerExit, KernelError> {
    let lifetime = WorkerDescriptor::parse_lifetime(&args[0], &args[1])?;
    let clock = namespace.attach_clock(descriptor.clock_key)?;
    let mailbox = namespace.attach_mailbox(descriptor.channel_key)?;

    let client = MailboxClient::new(
        pid,
        descriptor.master,
        mailbox,
        settings.classes,
        Arc::clone(&stop),
    )
    .with_poll(settings.ack_poll);
    let policy = AcquisitionPolicy::new(
        settings.classes,
        settings.per_class_ceiling,
        settings.rng_for(pid),
    );

    WorkerTask::new(
        pid,
        lifetime,
        clock,
        client,
        policy,
        settings.decision_bound,
        stop,
    )
    .with_idle_poll(settings.idle_poll)
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_api::{ClockWriter, IpcKey};
    use sim_kernel::test_utils::init_test_logging;

    fn settings() -> WorkerSettings {
        WorkerSettings::new(2, 2, SimDuration::from_millis(1)).with_seed(7)
    }

    #[test]
    fn test_spawn_without_namespace_objects_exits_early() {
        init_test_logging();
        let namespace = Arc::new(IpcNamespace::new());
        let mut spawner = ThreadSpawner::new(Arc::clone(&namespace), settings());

        let pid = spawner
            .spawn(WorkerDescriptor::new(Pid::MASTER, SimDuration::from_secs(1)))
            .unwrap();

        let mut reaped = Vec::new();
        while reaped.is_empty() {
            reaped = spawner.reap();
            thread::yield_now();
        }
        assert_eq!(reaped, vec![pid]);
        assert_eq!(spawner.live(), 0);
    }

    #[test]
    fn test_pids_are_unique_and_above_master() {
        let namespace = Arc::new(IpcNamespace::new());
        let mut spawner = ThreadSpawner::new(namespace, settings());
        let a = spawner
            .spawn(WorkerDescriptor::new(Pid::MASTER, SimDuration::ZERO))
            .unwrap();
        let b = spawner
            .spawn(WorkerDescriptor::new(Pid::MASTER, SimDuration::ZERO))
            .unwrap();
        assert!(a > Pid::MASTER);
        assert_ne!(a, b);
        spawner.kill_all();
        assert_eq!(spawner.live(), 0);
    }

    #[test]
    fn test_worker_sends_termination_notice_at_target() {
        init_test_logging();
        let namespace = Arc::new(IpcNamespace::new());
        let mut clock = ClockWriter::new();
        namespace
            .register_clock(IpcKey::clock(), clock.reader())
            .unwrap();
        let mailbox = namespace.create_mailbox(IpcKey::channel()).unwrap();
        let mut spawner = ThreadSpawner::new(
            Arc::clone(&namespace),
            WorkerSettings::new(2, 2, SimDuration::from_secs(10)).with_seed(1),
        );

        let pid = spawner
            .spawn(WorkerDescriptor::new(Pid::MASTER, SimDuration::from_nanos(50)))
            .unwrap();
        // Keep time moving until the worker has attached and seen its target.
        let record = loop {
            clock.tick(SimDuration::from_secs(1));
            if let Some(record) = mailbox
                .recv_timeout(Pid::MASTER, Duration::from_millis(50))
                .unwrap()
            {
                break record;
            }
        };
        assert_eq!(
            record.into_inbound(2).unwrap(),
            ipc::KernelMessage::Terminating { sender: pid }
        );
        spawner.kill_all();
    }

    #[test]
    fn test_kill_stops_blocked_worker() {
        let namespace = Arc::new(IpcNamespace::new());
        let clock = ClockWriter::new();
        namespace
            .register_clock(IpcKey::clock(), clock.reader())
            .unwrap();
        let _mailbox = namespace.create_mailbox(IpcKey::channel()).unwrap();
        let mut spawner = ThreadSpawner::new(Arc::clone(&namespace), settings());

        let pid = spawner
            .spawn(WorkerDescriptor::new(Pid::MASTER, SimDuration::from_secs(5)))
            .unwrap();
        spawner.kill(pid);

        assert_eq!(spawner.live(), 0);
        assert!(spawner.reap().is_empty());
    }
}
