//! Run counters and the ending report

use resources::ResourceVector;
use std::fmt;

/// Counters accumulated over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Request messages received, granted or not
    pub total_requests: u64,
    /// Sum of every instance asked for
    pub resources_requested: u64,
    pub immediate_grants: u64,
    pub queued_grants: u64,
    pub queued_requests: u64,
    pub releases: u64,
    pub mass_releases: u64,
    pub terminations: u64,
    /// Workers that exited without a termination notice
    pub abnormal_exits: u64,
    pub admissions: u64,
    pub admission_kills: u64,
    pub dropped_messages: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts an incoming request
    pub fn record_request(&mut self, amounts: &ResourceVector) {
        self.total_requests += 1;
        self.resources_requested += amounts.total();
    }

    /// Counts an incoming release
    pub fn record_release(&mut self, mass: bool) {
        self.releases += 1;
        if mass {
            self.mass_releases += 1;
        }
    }

    /// Share of requests granted on arrival, in percent
    ///
    /// Zero when no request was made.
    pub fn percent_immediate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.immediate_grants as f64 * 100.0 / self.total_requests as f64
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary { stats: *self }
    }
}

/// Ending report of a completed run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub stats: RunStats,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.stats;
        writeln!(f, "ENDING REPORT")?;
        writeln!(f, "Total resources requested: {}", stats.resources_requested)?;
        writeln!(f, "Total requests: {}", stats.total_requests)?;
        writeln!(f, "Granted immediately: {}", stats.immediate_grants)?;
        writeln!(f, "Granted after queueing: {}", stats.queued_grants)?;
        writeln!(f, "Times mass release was done: {}", stats.mass_releases)?;
        writeln!(
            f,
            "Percentage of requests granted immediately: {:.2}%",
            stats.percent_immediate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_with_no_requests_is_zero() {
        assert_eq!(RunStats::new().percent_immediate(), 0.0);
    }

    #[test]
    fn test_record_request_sums_instances() {
        let mut stats = RunStats::new();
        stats.record_request(&[2, 0, 3].into());
        stats.record_request(&[0, 1, 0].into());
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.resources_requested, 6);
    }

    #[test]
    fn test_mass_releases_counted_separately() {
        let mut stats = RunStats::new();
        stats.record_release(false);
        stats.record_release(true);
        assert_eq!(stats.releases, 2);
        assert_eq!(stats.mass_releases, 1);
    }

    #[test]
    fn test_summary_report() {
        let mut stats = RunStats::new();
        stats.record_request(&[1, 1].into());
        stats.record_request(&[2, 0].into());
        stats.record_request(&[0, 1].into());
        stats.record_request(&[0, 1].into());
        stats.immediate_grants = 3;
        stats.queued_grants = 1;
        stats.mass_releases = 2;

        let text = stats.summary().to_string();
        assert!(text.starts_with("ENDING REPORT\n"));
        assert!(text.contains("Total resources requested: 6\n"));
        assert!(text.contains("Total requests: 4\n"));
        assert!(text.contains("Granted after queueing: 1\n"));
        assert!(text.contains("Times mass release was done: 2\n"));
        assert!(text.contains("granted immediately: 75.00%"));
    }
}
