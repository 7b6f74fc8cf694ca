//! Kernel configuration
//!
//! Every tunable of a run lives here, with defaults matching the stock
//! system: ten classes of five instances, an 18-row process table, and a
//! 10 000 ns tick.

use crate::resource_audit::DEFAULT_AUDIT_CAPACITY;
use core_types::{INSTANCES_PER_CLASS, PROCESS_TABLE_CAPACITY, RESOURCE_CLASSES};
use kernel_api::SimDuration;
use resources::ResourceVector;
use services_logger::DEFAULT_MAX_LOG_LINES;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from [`KernelConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max simultaneous workers must be positive")]
    NoSimultaneousWorkers,

    #[error("process table capacity must be positive")]
    EmptyProcessTable,

    #[error("at least one resource class is required")]
    NoResourceClasses,

    #[error("per-class ceiling {ceiling} exceeds the {total} instances of R{class}")]
    CeilingExceedsTotal { class: usize, ceiling: u32, total: u32 },

    #[error("per-class ceiling must be positive")]
    ZeroCeiling,

    #[error("worker decision bound must be positive")]
    ZeroDecisionBound,

    #[error("report interval must be positive")]
    ZeroReportInterval,
}

/// Configuration for one kernel run
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Workers to launch over the whole run
    pub total_workers: usize,
    /// Workers allowed to run at once
    pub max_simultaneous: usize,
    /// Simulated lifetime handed to each worker
    pub worker_budget: SimDuration,
    /// Minimum simulated time between two admissions
    pub launch_interval: SimDuration,
    /// Clock advance per master iteration
    pub tick_quantum: SimDuration,
    pub table_capacity: usize,
    /// Instances of each resource class
    pub resource_totals: ResourceVector,
    /// Most instances of one class a single worker will hold
    pub per_class_ceiling: u32,
    /// Upper bound of a worker's wait between decisions
    pub decision_bound: SimDuration,
    /// Real time after which no more workers are admitted
    pub admission_wall_limit: Duration,
    /// Real time after which the whole run is torn down
    pub run_alarm: Duration,
    /// Simulated time between process table and allocation dumps
    pub report_interval: SimDuration,
    pub max_log_lines: usize,
    /// Resource audit entries retained before the oldest are dropped
    pub audit_capacity: usize,
    pub verbose: bool,
    pub log_path: Option<PathBuf>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            total_workers: 0,
            max_simultaneous: 1,
            worker_budget: SimDuration::ZERO,
            launch_interval: SimDuration::ZERO,
            tick_quantum: SimDuration::from_nanos(10_000),
            table_capacity: PROCESS_TABLE_CAPACITY,
            resource_totals: ResourceVector::uniform(RESOURCE_CLASSES, INSTANCES_PER_CLASS),
            per_class_ceiling: INSTANCES_PER_CLASS,
            decision_bound: SimDuration::from_millis(250),
            admission_wall_limit: Duration::from_secs(5),
            run_alarm: Duration::from_secs(60),
            report_interval: SimDuration::from_millis(500),
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            verbose: false,
            log_path: None,
        }
    }
}

impl KernelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_total_workers(mut self, total: usize) -> Self {
        self.total_workers = total;
        self
    }

    pub fn with_max_simultaneous(mut self, max: usize) -> Self {
        self.max_simultaneous = max;
        self
    }

    pub fn with_worker_budget(mut self, budget: SimDuration) -> Self {
        self.worker_budget = budget;
        self
    }

    pub fn with_launch_interval(mut self, interval: SimDuration) -> Self {
        self.launch_interval = interval;
        self
    }

    pub fn with_tick_quantum(mut self, quantum: SimDuration) -> Self {
        self.tick_quantum = quantum;
        self
    }

    pub fn with_table_capacity(mut self, capacity: usize) -> Self {
        self.table_capacity = capacity;
        self
    }

    /// Sets the resource totals; the per-class ceiling is lowered to fit
    pub fn with_resource_totals(mut self, totals: impl Into<ResourceVector>) -> Self {
        self.resource_totals = totals.into();
        if let Some(smallest) = self.resource_totals.iter().min() {
            self.per_class_ceiling = self.per_class_ceiling.min(smallest);
        }
        self
    }

    pub fn with_per_class_ceiling(mut self, ceiling: u32) -> Self {
        self.per_class_ceiling = ceiling;
        self
    }

    pub fn with_decision_bound(mut self, bound: SimDuration) -> Self {
        self.decision_bound = bound;
        self
    }

    pub fn with_admission_wall_limit(mut self, limit: Duration) -> Self {
        self.admission_wall_limit = limit;
        self
    }

    pub fn with_run_alarm(mut self, alarm: Duration) -> Self {
        self.run_alarm = alarm;
        self
    }

    pub fn with_report_interval(mut self, interval: SimDuration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn with_max_log_lines(mut self, lines: usize) -> Self {
        self.max_log_lines = lines;
        self
    }

    pub fn with_audit_capacity(mut self, capacity: usize) -> Self {
        self.audit_capacity = capacity;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Number of resource classes
    pub fn classes(&self) -> usize {
        self.resource_totals.classes()
    }

    /// Checks the configuration is runnable
    ///
    /// A zero tick quantum is accepted; the clock clamps it to 1 ns.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_simultaneous == 0 {
            return Err(ConfigError::NoSimultaneousWorkers);
        }
        if self.table_capacity == 0 {
            return Err(ConfigError::EmptyProcessTable);
        }
        if self.classes() == 0 {
            return Err(ConfigError::NoResourceClasses);
        }
        if self.per_class_ceiling == 0 {
            return Err(ConfigError::ZeroCeiling);
        }
        if let Some((class, total)) = self
            .resource_totals
            .iter()
            .enumerate()
            .find(|(_, total)| *total < self.per_class_ceiling)
        {
            return Err(ConfigError::CeilingExceedsTotal {
                class,
                ceiling: self.per_class_ceiling,
                total,
            });
        }
        if self.decision_bound.is_zero() {
            return Err(ConfigError::ZeroDecisionBound);
        }
        if self.report_interval.is_zero() {
            return Err(ConfigError::ZeroReportInterval);
        }
        Ok(())
    }
}
