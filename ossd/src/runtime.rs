//! # Host Runtime
//!
//! Wires the master, the thread spawner, and the IPC namespace together,
//! and owns the single cleanup path for every way a run can end.

use kernel_api::{IpcNamespace, SimDuration};
use services_worker::{ThreadSpawner, WorkerSettings};
use sim_kernel::{ConfigError, KernelConfig, Master, RunOutcome, SchedulerError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Printed when an interrupt or the run alarm forces teardown
pub const TEARDOWN_NOTICE: &str =
    "Received SIGALRM or SIGINT, terminating all child processes...";

/// Host runtime error types
#[derive(Debug, Error)]
pub enum HostRuntimeError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Could not install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Host runtime configuration, as given on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct HostRuntimeConfig {
    pub total_workers: usize,
    pub max_simultaneous: usize,
    /// Lifetime of each worker, in simulated seconds
    pub time_limit_secs: f64,
    /// Minimum simulated time between launches, in seconds
    pub launch_interval_secs: f64,
    pub log_path: Option<PathBuf>,
    pub verbose: bool,
    /// Fixed worker seed; `None` seeds every worker from the OS
    pub seed: Option<u64>,
}

impl Default for HostRuntimeConfig {
    fn default() -> Self {
        Self {
            total_workers: 0,
            max_simultaneous: 1,
            time_limit_secs: 0.0,
            launch_interval_secs: 0.0,
            log_path: None,
            verbose: false,
            seed: None,
        }
    }
}

impl HostRuntimeConfig {
    /// Maps the command-line values onto the kernel's tunables
    pub fn kernel_config(&self) -> KernelConfig {
        let mut config = KernelConfig::new()
            .with_total_workers(self.total_workers)
            .with_max_simultaneous(self.max_simultaneous)
            .with_worker_budget(SimDuration::from_secs_f64(self.time_limit_secs))
            .with_launch_interval(SimDuration::from_secs_f64(self.launch_interval_secs))
            .with_verbose(self.verbose);
        if let Some(path) = &self.log_path {
            config = config.with_log_path(path.clone());
        }
        config
    }
}

/// How the process should exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostExit {
    /// Every worker ran to completion
    Completed,
    /// Interrupt or alarm; shared objects were torn down early
    TornDown,
}

/// Host runtime
pub struct HostRuntime {
    master: Master<ThreadSpawner>,
    interrupt: Arc<AtomicBool>,
}

impl HostRuntime {
    /// Builds the namespace, the spawner, and the master
    ///
    /// Fails without starting anything if the configuration is invalid or
    /// the log file cannot be opened.
    pub fn new(config: HostRuntimeConfig) -> Result<Self, HostRuntimeError> {
        let kernel_config = config.kernel_config();
        kernel_config.validate()?;

        let namespace = Arc::new(IpcNamespace::new());
        let mut settings = WorkerSettings::new(
            kernel_config.classes(),
            kernel_config.per_class_ceiling,
            kernel_config.decision_bound,
        );
        if let Some(seed) = config.seed {
            settings = settings.with_seed(seed);
        }
        let spawner = ThreadSpawner::new(Arc::clone(&namespace), settings);
        let master = Master::new(kernel_config, namespace, spawner)?;

        Ok(Self {
            master,
            interrupt: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that stops the run when raised
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Raises the interrupt flag on Ctrl-C
    ///
    /// Can only succeed once per process.
    pub fn install_interrupt_handler(&self) -> Result<(), HostRuntimeError> {
        let interrupt = self.interrupt_flag();
        ctrlc::set_handler(move || interrupt.store(true, Ordering::SeqCst))?;
        Ok(())
    }

    pub fn master(&self) -> &Master<ThreadSpawner> {
        &self.master
    }

    /// Runs to completion or teardown
    ///
    /// Cleanup runs on every path, including errors.
    pub fn run(&mut self) -> Result<HostExit, HostRuntimeError> {
        self.master.announce();
        let outcome = self.master.run(&self.interrupt);
        self.master.shutdown();

        match outcome? {
            RunOutcome::Completed(summary) => {
                tracing::info!(
                    requests = summary.stats.total_requests,
                    immediate = summary.stats.immediate_grants,
                    "run completed"
                );
                Ok(HostExit::Completed)
            }
            RunOutcome::Interrupted | RunOutcome::AlarmExpired => {
                println!("{TEARDOWN_NOTICE}");
                Ok(HostExit::TornDown)
            }
        }
    }
}

/// Installs the process-wide tracing subscriber
///
/// Diagnostics go to stderr so they never mix with the kernel log on stdout.
pub fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> HostRuntimeConfig {
        HostRuntimeConfig {
            total_workers: 2,
            max_simultaneous: 2,
            time_limit_secs: 0.001,
            launch_interval_secs: 0.0,
            seed: Some(5),
            ..HostRuntimeConfig::default()
        }
    }

    #[test]
    fn test_kernel_config_mapping() {
        let kernel = HostRuntimeConfig {
            time_limit_secs: 2.5,
            launch_interval_secs: 0.25,
            verbose: true,
            log_path: Some(PathBuf::from("run.log")),
            ..config()
        }
        .kernel_config();

        assert_eq!(kernel.total_workers, 2);
        assert_eq!(kernel.max_simultaneous, 2);
        assert_eq!(kernel.worker_budget, SimDuration::from_parts(2, 500_000_000));
        assert_eq!(kernel.launch_interval, SimDuration::from_millis(250));
        assert!(kernel.verbose);
        assert_eq!(kernel.log_path, Some(PathBuf::from("run.log")));
    }

    #[test]
    fn test_zero_simultaneous_fails_before_start() {
        let err = HostRuntime::new(HostRuntimeConfig {
            max_simultaneous: 0,
            ..config()
        })
        .err()
        .unwrap();
        assert!(matches!(
            err,
            HostRuntimeError::Config(ConfigError::NoSimultaneousWorkers)
        ));
    }

    #[test]
    fn test_unwritable_log_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = HostRuntime::new(HostRuntimeConfig {
            log_path: Some(dir.path().join("missing").join("oss.log")),
            ..config()
        })
        .err()
        .unwrap();
        assert!(matches!(
            err,
            HostRuntimeError::Scheduler(SchedulerError::LogFile { .. })
        ));
    }

    #[test]
    fn test_zero_workers_completes() {
        let mut runtime = HostRuntime::new(HostRuntimeConfig {
            total_workers: 0,
            ..config()
        })
        .unwrap();
        assert_eq!(runtime.run().unwrap(), HostExit::Completed);
        assert_eq!(runtime.master().stats().total_requests, 0);
    }

    #[test]
    fn test_short_run_completes_and_writes_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("oss.log");
        let mut runtime = HostRuntime::new(HostRuntimeConfig {
            log_path: Some(path.clone()),
            ..config()
        })
        .unwrap();

        assert_eq!(runtime.run().unwrap(), HostExit::Completed);
        assert_eq!(runtime.master().launched(), 2);
        assert_eq!(runtime.master().running(), 0);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("OSS starting"));
        assert!(contents.contains("ENDING REPORT"));
    }

    #[test]
    fn test_raised_interrupt_tears_down() {
        let mut runtime = HostRuntime::new(config()).unwrap();
        runtime.interrupt_flag().store(true, Ordering::SeqCst);
        assert_eq!(runtime.run().unwrap(), HostExit::TornDown);
        assert!(runtime.master().mailbox().is_closed());
    }
}
