//! Worker spawning seam

use crate::{IpcKey, KernelError, SimDuration};
use core_types::Pid;

/// Descriptor for creating a new worker
///
/// Carries everything a worker needs to start: the master it reports to, the
/// keys of the shared clock and mailbox, and its lifetime budget. The
/// lifetime travels as two positional arguments (whole seconds, nanosecond
/// remainder) so a worker in a separate process image can be started the
/// same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    /// Pid acknowledgements come from and requests go to
    pub master: Pid,
    /// How long the worker lives, measured from its first clock reading
    pub lifetime: SimDuration,
    pub clock_key: IpcKey,
    pub channel_key: IpcKey,
}

impl WorkerDescriptor {
    /// Creates a descriptor using the default namespace keys
    pub fn new(master: Pid, lifetime: SimDuration) -> Self {
        Self {
            master,
            lifetime,
            clock_key: IpcKey::clock(),
            channel_key: IpcKey::channel(),
        }
    }

    /// Positional arguments for the worker entry point
    pub fn args(&self) -> [String; 2] {
        [
            self.lifetime.as_secs().to_string(),
            self.lifetime.subsec_nanos().to_string(),
        ]
    }

    /// Parses the positional lifetime arguments
    pub fn parse_lifetime(seconds: &str, nanoseconds: &str) -> Result<SimDuration, KernelError> {
        let seconds: u64 = seconds
            .trim()
            .parse()
            .map_err(|_| KernelError::SpawnFailed(format!("bad lifetime seconds: {seconds}")))?;
        let nanoseconds: u64 = nanoseconds.trim().parse().map_err(|_| {
            KernelError::SpawnFailed(format!("bad lifetime nanoseconds: {nanoseconds}"))
        })?;
        Ok(SimDuration::from_parts(seconds, nanoseconds))
    }
}

/// Spawns and stops worker units
///
/// This is the master's only dependency on how workers actually run.
/// Implementations may start threads, processes, or nothing at all (tests).
pub trait WorkerSpawner {
    /// Starts a worker and returns its pid
    fn spawn(&mut self, descriptor: WorkerDescriptor) -> Result<Pid, KernelError>;

    /// Forcibly stops a worker; unknown pids are ignored
    fn kill(&mut self, pid: Pid);

    /// Collects workers that have exited on their own, returning their pids
    fn reap(&mut self) -> Vec<Pid>;

    /// Stops every worker still running
    fn kill_all(&mut self);
}
