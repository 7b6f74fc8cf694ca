//! Resilience Test Utilities
//!
//! This crate provides shared utilities for scenario and end-to-end tests.
//!
//! ## Test Philosophy
//!
//! - **Conservation under churn**: every instance is either available or held
//!   by exactly one live worker, whatever order messages arrive in
//! - **Deterministic traffic**: scripted workers drive the master tick by tick
//! - **Clean departures**: a worker that leaves, by notice or otherwise,
//!   gives back everything it held

use core_types::Pid;
use kernel_api::{IpcNamespace, SimDuration};
use resources::ResourceVector;
use sim_kernel::test_utils::{quiet_master, RecordingSpawner, ScriptedWorker};
use sim_kernel::{KernelConfig, Master, StepOutcome};
use std::sync::Arc;

/// Configuration for scripted scenarios
///
/// Admissions happen one per tick with no launch spacing, and workers never
/// reach their budget on their own.
pub fn scenario_config(totals: impl Into<ResourceVector>, workers: usize) -> KernelConfig {
    KernelConfig::new()
        .with_total_workers(workers)
        .with_max_simultaneous(workers)
        .with_table_capacity(workers.max(1))
        .with_resource_totals(totals)
        .with_worker_budget(SimDuration::from_secs(100))
        .with_launch_interval(SimDuration::ZERO)
}

/// Builds a quiet master and steps it until `workers` are admitted
///
/// Returns the master together with one scripted worker per admission, in
/// admission order.
pub fn admitted_master(config: KernelConfig) -> (Master<RecordingSpawner>, Vec<ScriptedWorker>) {
    let workers = config.total_workers.min(config.table_capacity);
    let mut master = quiet_master(config, Arc::new(IpcNamespace::new()));
    while master.launched() < workers {
        if let Err(err) = master.step() {
            panic!("admission step failed: {err}");
        }
    }
    let classes = master.ledger().classes();
    let scripted = master
        .spawner()
        .spawned_pids()
        .into_iter()
        .map(|pid| ScriptedWorker::new(pid, master.mailbox(), classes))
        .collect();
    (master, scripted)
}

/// Steps until `done` holds, failing after `limit` ticks
pub fn step_until<F>(master: &mut Master<RecordingSpawner>, limit: usize, mut done: F) -> StepOutcome
where
    F: FnMut(&Master<RecordingSpawner>) -> bool,
{
    for _ in 0..limit {
        let outcome = match master.step() {
            Ok(outcome) => outcome,
            Err(err) => panic!("step failed: {err}"),
        };
        if done(master) {
            return outcome;
        }
    }
    panic!("condition not reached within {limit} ticks");
}

/// Row of the ledger held by `pid`, if it has a slot
pub fn holdings(master: &Master<RecordingSpawner>, pid: Pid) -> Option<ResourceVector> {
    let slot = master.process_table().find_by_id(pid)?;
    master.ledger().allocation(slot).ok().cloned()
}
